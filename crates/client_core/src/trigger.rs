use serde_json::Value;
use shared::{
    contract::{ATTR_ACTION, ATTR_ROW_ID, ATTR_TRIGGER, ROW_ID_FIELD},
    domain::{ItemId, PanelId},
    protocol::{Payload, RESERVED_FIELDS},
};
use tracing::warn;

use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerAction {
    #[default]
    Load,
    Delete,
}

impl TriggerAction {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "load" => Self::Load,
            "delete" => Self::Delete,
            other => {
                warn!(action = other, "unsupported trigger action; loading instead");
                Self::Load
            }
        }
    }
}

/// Typed form of a trigger element's declarative attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerCommand {
    pub panel_id: PanelId,
    pub action: TriggerAction,
    pub payload: Payload,
}

impl TriggerCommand {
    pub fn load(panel_id: impl Into<PanelId>) -> Self {
        Self {
            panel_id: panel_id.into(),
            action: TriggerAction::Load,
            payload: Payload::new(),
        }
    }

    pub fn delete(panel_id: impl Into<PanelId>, item_id: ItemId) -> Self {
        Self::load(panel_id)
            .with_action(TriggerAction::Delete)
            .with_field("id", item_id.0)
    }

    pub fn with_action(mut self, action: TriggerAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Reads the nearest trigger element at or above `node`.
    ///
    /// Other `data-*` attributes become payload fields (`data-item-type` is
    /// sent as `item_type`); an enclosing row's id is added as `row_id`.
    pub fn from_element(doc: &Document, node: NodeId) -> Option<Self> {
        let trigger = doc.closest(node, |el| el.has_attr(ATTR_TRIGGER))?;
        let element = doc.element(trigger)?;
        let panel_id = element.attr(ATTR_TRIGGER)?.trim();
        if panel_id.is_empty() {
            return None;
        }

        let mut payload = Payload::new();
        for (name, value) in element.attrs() {
            if name == ATTR_TRIGGER || name == ATTR_ACTION {
                continue;
            }
            if let Some(key) = name.strip_prefix("data-") {
                let key = key.replace('-', "_");
                if RESERVED_FIELDS.contains(&key.as_str()) {
                    warn!(panel = panel_id, attr = name, "reserved trigger attribute ignored");
                    continue;
                }
                payload.insert(key, Value::String(value.to_string()));
            }
        }

        if !payload.contains_key(ROW_ID_FIELD) {
            let row_id = doc
                .closest(trigger, |el| el.tag() == "tr" && el.has_attr(ATTR_ROW_ID))
                .and_then(|row| doc.attr(row, ATTR_ROW_ID));
            if let Some(row_id) = row_id {
                payload.insert(ROW_ID_FIELD.to_string(), Value::String(row_id.to_string()));
            }
        }

        Some(Self {
            panel_id: PanelId::new(panel_id),
            action: element.attr(ATTR_ACTION).map(TriggerAction::parse).unwrap_or_default(),
            payload,
        })
    }

    /// Positive item id from `id`, falling back to `row_id`.
    pub fn item_id(&self) -> Option<ItemId> {
        ["id", ROW_ID_FIELD]
            .into_iter()
            .filter_map(|key| match self.payload.get(key)? {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .find(|id| *id > 0)
            .map(ItemId)
    }
}

#[cfg(test)]
#[path = "tests/trigger_tests.rs"]
mod tests;
