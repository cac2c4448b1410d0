use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{ItemId, PanelId},
    error::{ApiError, ErrorCode},
};

/// Free-form request fields. Flattened into the request object on the wire.
pub type Payload = serde_json::Map<String, Value>;

/// Payload keys that would collide with the envelope's own fields.
pub const RESERVED_FIELDS: [&str; 2] = ["action", "token"];

/// Client configuration for every registered panel, delivered once per page.
pub type ClientBootstrap = BTreeMap<PanelId, PanelClientConfig>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub action: String,
    #[serde(default)]
    pub token: String,
    #[serde(flatten)]
    pub payload: Payload,
}

impl RequestEnvelope {
    /// Reserved keys are dropped from `payload`; the flattened wire object
    /// would otherwise carry them twice and fail to decode.
    pub fn new(action: impl Into<String>, token: impl Into<String>, mut payload: Payload) -> Self {
        for key in RESERVED_FIELDS {
            payload.remove(key);
        }
        Self {
            action: action.into(),
            token: token.into(),
            payload,
        }
    }

    /// Positive integer `id` field, accepting JSON numbers and numeric strings.
    pub fn item_id(&self) -> Option<ItemId> {
        match self.payload.get("id")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .filter(|id| *id > 0)
        .map(ItemId)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ResponseEnvelope {
    pub fn success<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                ok: true,
                data: Some(data),
                error: None,
                code: None,
            },
            Err(e) => Self::failure(ApiError::new(
                ErrorCode::Internal,
                format!("failed to encode response: {e}"),
            )),
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.message),
            code: Some(error.code),
        }
    }

    pub fn into_result(self) -> Result<Value, ApiError> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        Err(ApiError::new(
            self.code.unwrap_or(ErrorCode::Internal),
            self.error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let data = self.into_result()?;
        serde_json::from_value(data).map_err(|e| {
            ApiError::new(ErrorCode::Internal, format!("malformed response data: {e}"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadData {
    pub markup: String,
    pub client_config: PanelClientConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveData {
    pub id: ItemId,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_markup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteData {
    pub id: ItemId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AjaxConfig {
    pub load_action: String,
    pub save_action: String,
    pub delete_action: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    pub close_on_save: bool,
    pub close_on_escape: bool,
    pub close_on_overlay: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            close_on_save: true,
            close_on_escape: true,
            close_on_overlay: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelClientConfig {
    pub ajax: AjaxConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
