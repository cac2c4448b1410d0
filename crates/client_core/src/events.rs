use serde::{Deserialize, Serialize};
use shared::domain::{ItemId, PanelId};

/// Domain events published by the panel manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum PanelEvent {
    Opened {
        panel_id: PanelId,
    },
    Closed {
        panel_id: PanelId,
    },
    TabChanged {
        panel_id: PanelId,
        tab_id: String,
    },
    Saved {
        panel_id: PanelId,
        item_id: ItemId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        row_markup: Option<String>,
        message: String,
    },
    Deleted {
        panel_id: PanelId,
        item_id: ItemId,
    },
}

impl PanelEvent {
    pub fn panel_id(&self) -> &PanelId {
        match self {
            Self::Opened { panel_id }
            | Self::Closed { panel_id }
            | Self::TabChanged { panel_id, .. }
            | Self::Saved { panel_id, .. }
            | Self::Deleted { panel_id, .. } => panel_id,
        }
    }
}

#[cfg(test)]
#[path = "tests/events_tests.rs"]
mod tests;
