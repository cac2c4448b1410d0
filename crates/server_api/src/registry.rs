use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use panel::Panel;
use shared::{
    domain::{ActionKind, PanelId},
    protocol::{AjaxConfig, ClientBootstrap, PanelClientConfig},
};
use tracing::{debug, warn};

use crate::{handler::PanelHandler, security::TokenIssuer};

#[derive(Clone)]
pub struct RegisteredPanel {
    pub panel: Panel,
    pub handler: Arc<dyn PanelHandler>,
}

impl fmt::Debug for RegisteredPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredPanel")
            .field("panel", self.panel.id())
            .finish_non_exhaustive()
    }
}

/// Panels known to the current process, keyed by panel id.
///
/// Filled during setup through `&mut self`, then shared read-only.
#[derive(Default, Debug)]
pub struct PanelRegistry {
    panels: BTreeMap<PanelId, RegisteredPanel>,
    actions: HashMap<String, (PanelId, ActionKind)>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a panel. An existing registration under the same id is
    /// replaced along with the actions derived from its prefix.
    pub fn register(
        &mut self,
        panel: Panel,
        handler: Arc<dyn PanelHandler>,
    ) -> Option<RegisteredPanel> {
        let id = panel.id().clone();
        let previous = self.panels.remove(&id);
        if previous.is_some() {
            self.actions.retain(|_, (owner, _)| *owner != id);
            debug!(panel = %id, "panel re-registered; previous registration replaced");
        }

        if let Some(prefix) = panel.action_prefix() {
            let load = ActionKind::Load.action_name(prefix);
            if let Some((owner, _)) = self.actions.get(&load).cloned() {
                // The superseded panel keeps its id but loses every action,
                // which also takes it out of the bootstrap bundle.
                warn!(prefix, previous = %owner, panel = %id, "action prefix taken over");
                self.actions.retain(|_, (existing, _)| *existing != owner);
            }
            for kind in ActionKind::ALL {
                self.actions.insert(kind.action_name(prefix), (id.clone(), kind));
            }
        }

        self.panels.insert(id, RegisteredPanel { panel, handler });
        previous
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredPanel> {
        self.panels.get(id)
    }

    /// Maps a remote action name back to its panel and action kind.
    pub fn resolve_action(&self, action: &str) -> Option<(&RegisteredPanel, ActionKind)> {
        let (id, kind) = self.actions.get(action)?;
        let registered = self.get(id.as_str())?;
        Some((registered, *kind))
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Client configuration for one panel. `None` when the id is unknown,
    /// the panel has no action prefix, or another panel took its prefix over.
    pub fn client_config(&self, id: &str, tokens: &TokenIssuer) -> Option<PanelClientConfig> {
        let registered = self.get(id)?;
        let config = config_for(&registered.panel, tokens)?;
        let owner = self.actions.get(&config.ajax.load_action).map(|(owner, _)| owner);
        (owner == Some(registered.panel.id())).then_some(config)
    }

    /// The per-page bundle of action names and tokens, keyed by panel id.
    pub fn bootstrap(&self, tokens: &TokenIssuer) -> ClientBootstrap {
        self.panels
            .keys()
            .filter_map(|id| Some((id.clone(), self.client_config(id.as_str(), tokens)?)))
            .collect()
    }
}

fn config_for(panel: &Panel, tokens: &TokenIssuer) -> Option<PanelClientConfig> {
    let prefix = panel.action_prefix()?;
    Some(PanelClientConfig {
        ajax: AjaxConfig {
            load_action: ActionKind::Load.action_name(prefix),
            save_action: ActionKind::Save.action_name(prefix),
            delete_action: ActionKind::Delete.action_name(prefix),
            token: tokens.issue(prefix),
        },
        ui: panel.ui(),
    })
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
