use async_trait::async_trait;
use reqwest::Client;
use shared::protocol::{ClientBootstrap, RequestEnvelope, ResponseEnvelope};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// Carries request envelopes to the remote action endpoint.
///
/// Failures here are transport failures only; business and security
/// rejections arrive as `ok = false` envelopes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError>;
    async fn fetch_bootstrap(&self) -> Result<ClientBootstrap, TransportError>;
}

pub struct HttpTransport {
    http: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(server_url: &str) -> Result<Self, TransportError> {
        let mut base = Url::parse(server_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// Plain-text GET, used to pull host pages such as the list display.
    pub async fn get_text(&self, path: &str) -> Result<String, TransportError> {
        Ok(self
            .http
            .get(self.endpoint(path)?)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError> {
        Ok(self
            .http
            .post(self.endpoint("actions")?)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn fetch_bootstrap(&self) -> Result<ClientBootstrap, TransportError> {
        Ok(self
            .http
            .get(self.endpoint("bootstrap")?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
