use std::sync::Arc;

use panel::Markup;
use shared::{
    domain::ActionKind,
    error::{ApiError, ApiException, DomainError, ErrorCode},
    protocol::{ClientBootstrap, DeleteData, LoadData, RequestEnvelope, ResponseEnvelope, SaveData},
};
use tracing::{info, warn};

use crate::{
    registry::{PanelRegistry, RegisteredPanel},
    security::{Caller, TokenIssuer},
};

pub const SAVED_MESSAGE: &str = "Saved successfully";
pub const DELETED_MESSAGE: &str = "Deleted successfully";

/// Routes remote actions to registered panels.
///
/// Every outcome, including authentication and authorization failures, comes
/// back as a [`ResponseEnvelope`]; nothing here returns `Err` to the caller.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<PanelRegistry>,
    tokens: TokenIssuer,
}

impl Dispatcher {
    pub fn new(registry: Arc<PanelRegistry>, tokens: TokenIssuer) -> Self {
        Self { registry, tokens }
    }

    pub fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn bootstrap(&self) -> ClientBootstrap {
        self.registry.bootstrap(&self.tokens)
    }

    pub async fn dispatch(&self, request: &RequestEnvelope, caller: &Caller) -> ResponseEnvelope {
        match self.handle(request, caller).await {
            Ok(response) => {
                info!(action = %request.action, "action succeeded");
                response
            }
            Err(error) => {
                warn!(action = %request.action, code = ?error.code, message = %error.message, "action failed");
                ResponseEnvelope::failure(ApiError::from(error))
            }
        }
    }

    async fn handle(
        &self,
        request: &RequestEnvelope,
        caller: &Caller,
    ) -> Result<ResponseEnvelope, ApiException> {
        let (registered, kind) = self
            .registry
            .resolve_action(&request.action)
            .ok_or_else(|| ApiException::new(ErrorCode::NotFound, "Unknown action"))?;
        let panel = &registered.panel;

        let prefix = panel.action_prefix().unwrap_or_default();
        if !self.tokens.verify(prefix, &request.token) {
            return Err(ApiError::unauthorized().into());
        }
        if !caller.can(panel.required_capability()) {
            return Err(ApiError::forbidden().into());
        }

        info!(panel = %panel.id(), action = kind.suffix(), "dispatching panel action");
        match kind {
            ActionKind::Load => self.load(registered, request).await,
            ActionKind::Save => save(registered, request).await,
            ActionKind::Delete => delete(registered, request).await,
        }
    }

    async fn load(
        &self,
        registered: &RegisteredPanel,
        request: &RequestEnvelope,
    ) -> Result<ResponseEnvelope, ApiException> {
        // Each load works on its own copy, so concurrent loads never share
        // tabs or content.
        let mut panel = registered.panel.clone();
        panel.clear();
        registered.handler.on_load(&mut panel, request).await?;

        let client_config = self
            .registry
            .client_config(panel.id().as_str(), &self.tokens)
            .ok_or_else(|| ApiException::new(ErrorCode::Internal, "panel has no action prefix"))?;
        Ok(ResponseEnvelope::success(&LoadData {
            markup: panel.render().into_string(),
            client_config,
        }))
    }
}

async fn save(
    registered: &RegisteredPanel,
    request: &RequestEnvelope,
) -> Result<ResponseEnvelope, ApiException> {
    let id = registered.handler.on_save(&request.payload).await?;
    let row_markup = registered
        .handler
        .row_markup(id)
        .await
        .filter(|markup| !markup.is_empty())
        .map(Markup::into_string);
    Ok(ResponseEnvelope::success(&SaveData {
        id,
        message: SAVED_MESSAGE.to_string(),
        row_markup,
    }))
}

async fn delete(
    registered: &RegisteredPanel,
    request: &RequestEnvelope,
) -> Result<ResponseEnvelope, ApiException> {
    let id = request
        .item_id()
        .ok_or_else(|| DomainError::new("Invalid ID"))?;
    registered.handler.on_delete(id).await?;
    Ok(ResponseEnvelope::success(&DeleteData {
        id,
        message: DELETED_MESSAGE.to_string(),
    }))
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
