use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    form, ActionOutcome, Document, HttpTransport, PanelManager, TableSync, TableSyncConfig,
    Timings, Transport, TriggerCommand,
};
use shared::{
    domain::PanelId,
    protocol::{Payload, RequestEnvelope},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the client bootstrap bundle.
    Bootstrap,
    /// Send one raw action envelope and print the response.
    Action {
        #[arg(long)]
        action: String,
        #[arg(long)]
        token: String,
        /// JSON object merged into the request.
        #[arg(long)]
        payload: Option<String>,
    },
    /// Open a panel in a headless page and print the resulting document.
    Open {
        #[arg(long)]
        panel: String,
        #[arg(long)]
        payload: Option<String>,
        /// Page fragment the panel opens over.
        #[arg(long, default_value = "list")]
        page: String,
        #[arg(long, default_value = "items-table")]
        table_id: String,
        /// Form field to fill before submitting, as NAME=VALUE.
        #[arg(long = "set", value_name = "NAME=VALUE")]
        fields: Vec<String>,
        #[arg(long)]
        submit: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let transport = HttpTransport::new(&cli.server_url)
        .with_context(|| format!("invalid server url {}", cli.server_url))?;

    match cli.command {
        Command::Bootstrap => {
            let bootstrap = transport.fetch_bootstrap().await?;
            println!("{}", serde_json::to_string_pretty(&bootstrap)?);
        }
        Command::Action {
            action,
            token,
            payload,
        } => {
            let request = RequestEnvelope::new(action, token, parse_payload(payload.as_deref())?);
            let response = transport.send(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Open {
            panel,
            payload,
            page,
            table_id,
            fields,
            submit,
        } => {
            let mut command = TriggerCommand::load(panel.as_str());
            command.payload = parse_payload(payload.as_deref())?;
            let html = open_panel(transport, command, &page, table_id, &fields, submit).await?;
            println!("{html}");
        }
    }

    Ok(())
}

async fn open_panel(
    transport: HttpTransport,
    command: TriggerCommand,
    page: &str,
    table_id: String,
    fields: &[String],
    submit: bool,
) -> Result<String> {
    let markup = transport
        .get_text(page)
        .await
        .with_context(|| format!("failed to fetch page '{page}'"))?;
    let document = Document::parse(&markup).shared();
    let timings = Timings::default();

    let panel_id = command.panel_id.clone();
    let manager = PanelManager::new(Arc::new(transport), Arc::clone(&document), timings);
    let panels = manager.fetch_bootstrap().await?;
    info!(panels, "bootstrap loaded");

    let sync = TableSync::new(Arc::clone(&document), TableSyncConfig::new(table_id), timings);
    let sync_task = sync.spawn(manager.subscribe());

    match manager.load(command).await? {
        ActionOutcome::Opened => {}
        ActionOutcome::Failed(message) => bail!("panel failed to load: {message}"),
        other => bail!("panel did not open: {other:?}"),
    }

    if !fields.is_empty() {
        fill_fields(&manager, &panel_id, fields).await?;
    }
    if submit {
        let outcome = manager.submit(&panel_id).await?;
        info!(?outcome, "submit finished");
        if let ActionOutcome::Failed(message) = outcome {
            eprintln!("save rejected: {message}");
        }
        tokio::time::sleep(timings.close_transition).await;
    }

    sync_task.abort();
    let html = document.lock().await.to_html();
    Ok(html)
}

async fn fill_fields(manager: &PanelManager, panel_id: &PanelId, fields: &[String]) -> Result<()> {
    let root = manager
        .panel_node(panel_id)
        .await
        .ok_or_else(|| anyhow!("panel '{panel_id}' is not mounted"))?;
    let document = manager.document();
    let mut doc = document.lock().await;
    for field in fields {
        let (name, value) = field
            .split_once('=')
            .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{field}'"))?;
        if !form::set_field(&mut doc, root, name, value) {
            bail!("panel '{panel_id}' has no field named '{name}'");
        }
    }
    Ok(())
}

fn parse_payload(raw: Option<&str>) -> Result<Payload> {
    let Some(raw) = raw else {
        return Ok(Payload::new());
    };
    match serde_json::from_str(raw).context("payload is not valid JSON")? {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("payload must be a JSON object"),
    }
}
