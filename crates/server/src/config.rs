use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

const SETTINGS_FILE: &str = "server.toml";
const ENV_PREFIX: &str = "APP";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_bind: String,
    /// Secret mixed into every one-time token.
    pub token_secret: String,
    /// Session the tokens are scoped to. Issued by the host's auth layer.
    pub session_id: String,
    /// Capabilities held by the session served by this process.
    pub granted_capabilities: Vec<String>,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            token_secret: "dev-token-secret".into(),
            session_id: "dev-session".into(),
            granted_capabilities: vec!["manage_options".into()],
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Loads `server.toml` from the working directory (optional), then applies
/// `APP__*` environment overrides such as `APP__SERVER_BIND`.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<Settings> {
    let raw = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("granted_capabilities")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read settings from '{}'", path.display()))?;

    let settings: Settings = raw
        .try_deserialize()
        .context("failed to deserialize server settings")?;
    if settings.token_secret.trim().is_empty() {
        anyhow::bail!("token_secret must not be empty");
    }
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
