use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use server_api::{Caller, Dispatcher, PanelRegistry, TokenIssuer};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{ClientBootstrap, RequestEnvelope, ResponseEnvelope},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod demo;

use app_state::AppState;
use config::{load_settings, Settings};
use demo::ItemStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let state = build_state(&settings, Arc::new(ItemStore::seeded()));
    info!(
        panels = state.dispatcher.registry().len(),
        "panel registry ready"
    );
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Registration happens here, before any request is served; afterwards the
/// registry is only read.
fn build_state(settings: &Settings, items: Arc<ItemStore>) -> AppState {
    let mut registry = PanelRegistry::new();
    demo::register_panels(&mut registry, Arc::clone(&items));

    AppState {
        dispatcher: Dispatcher::new(
            Arc::new(registry),
            TokenIssuer::new(&settings.token_secret, &settings.session_id),
        ),
        caller: Caller::new(settings.granted_capabilities.iter().cloned()),
        items,
    }
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/bootstrap", get(bootstrap))
        .route("/list", get(list))
        .route("/actions", post(actions))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn bootstrap(State(state): State<Arc<AppState>>) -> Json<ClientBootstrap> {
    Json(state.dispatcher.bootstrap())
}

async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let items = state.items.list().await;
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        demo::list_table(&items).into_string(),
    )
}

/// Always answers 200: failures travel inside the envelope.
async fn actions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<ResponseEnvelope>) {
    let request: RequestEnvelope = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!(%error, "malformed action request");
            return (
                StatusCode::OK,
                Json(ResponseEnvelope::failure(ApiError::new(
                    ErrorCode::Validation,
                    format!("malformed request: {error}"),
                ))),
            );
        }
    };

    let response = state.dispatcher.dispatch(&request, &state.caller).await;
    (StatusCode::OK, Json(response))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
