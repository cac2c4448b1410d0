use std::collections::{BTreeSet, HashMap};

use shared::{
    domain::{PanelId, PanelWidth},
    protocol::UiConfig,
};
use tracing::warn;

use crate::{content::ContentEntry, markup::Markup};

/// Content key used when the panel has no tabs.
pub const DEFAULT_CONTENT_KEY: &str = "default";
pub const DEFAULT_CAPABILITY: &str = "manage_options";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabOptions {
    pub disabled: bool,
    pub icon: Option<String>,
    pub badge: Option<String>,
}

impl TabOptions {
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: String,
    pub label: String,
    pub options: TabOptions,
}

/// Server-side model of one flyout.
///
/// Fixed configuration (width, classes, action prefix, capability, UI flags)
/// is set with the `with_*` builders. Per-request state (tabs, content,
/// footer) enters only through the mutators and is wiped by [`Panel::clear`].
#[derive(Debug, Clone)]
pub struct Panel {
    pub(crate) id: PanelId,
    pub(crate) title: String,
    pub(crate) width: PanelWidth,
    pub(crate) classes: BTreeSet<String>,
    pub(crate) tabs: Vec<Tab>,
    pub(crate) active_tab: Option<String>,
    pub(crate) content: HashMap<String, Vec<ContentEntry>>,
    pub(crate) footer: Option<Markup>,
    pub(crate) action_prefix: Option<String>,
    pub(crate) required_capability: String,
    pub(crate) declared_form: bool,
    pub(crate) has_form_fields: bool,
    pub(crate) tabs_enabled: bool,
    pub(crate) ui: UiConfig,
}

impl Panel {
    pub fn new(id: impl Into<PanelId>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            width: PanelWidth::default(),
            classes: BTreeSet::new(),
            tabs: Vec::new(),
            active_tab: None,
            content: HashMap::new(),
            footer: None,
            action_prefix: None,
            required_capability: DEFAULT_CAPABILITY.to_string(),
            declared_form: false,
            has_form_fields: false,
            tabs_enabled: true,
            ui: UiConfig::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_width(mut self, width: PanelWidth) -> Self {
        self.width = width;
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        if !class.trim().is_empty() {
            self.classes.insert(class.trim().to_string());
        }
        self
    }

    pub fn with_action_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.action_prefix = (!prefix.trim().is_empty()).then(|| prefix.trim().to_string());
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capability = capability.into();
        self
    }

    /// Declares up front that the body is a submittable form.
    pub fn as_form(mut self) -> Self {
        self.declared_form = true;
        self
    }

    pub fn with_tabs_enabled(mut self, enabled: bool) -> Self {
        self.tabs_enabled = enabled;
        self
    }

    pub fn with_ui(mut self, ui: UiConfig) -> Self {
        self.ui = ui;
        self
    }

    pub fn id(&self) -> &PanelId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn width(&self) -> PanelWidth {
        self.width
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab(&self) -> Option<&str> {
        self.active_tab.as_deref()
    }

    pub fn footer(&self) -> Option<&Markup> {
        self.footer.as_ref()
    }

    pub fn action_prefix(&self) -> Option<&str> {
        self.action_prefix.as_deref()
    }

    pub fn required_capability(&self) -> &str {
        &self.required_capability
    }

    pub fn tabs_enabled(&self) -> bool {
        self.tabs_enabled
    }

    pub fn ui(&self) -> UiConfig {
        self.ui
    }

    pub fn is_form(&self) -> bool {
        self.declared_form || self.has_form_fields
    }

    /// Number of content entries stored under `key`.
    pub fn content_len(&self, key: &str) -> usize {
        self.content.get(key).map_or(0, Vec::len)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Adds a tab, or updates label and options of an existing one in place.
    ///
    /// The first tab becomes active; later tabs only when `make_active` is set.
    pub fn add_tab(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        make_active: bool,
        options: TabOptions,
    ) {
        let id = id.into();
        let label = label.into();
        match self.tabs.iter_mut().find(|tab| tab.id == id) {
            Some(existing) => {
                existing.label = label;
                existing.options = options;
            }
            None => {
                if self.tabs.is_empty() && self.content.remove(DEFAULT_CONTENT_KEY).is_some() {
                    warn!(panel = %self.id, tab = %id, "first tab hides earlier default content; dropped");
                }
                self.tabs.push(Tab {
                    id: id.clone(),
                    label,
                    options,
                });
            }
        }
        if make_active || self.active_tab.is_none() {
            self.active_tab = Some(id);
        }
    }

    /// Appends an entry to a tab's content, or to the default block when
    /// `tab_id` is [`DEFAULT_CONTENT_KEY`]. The default block only exists
    /// while the panel has no tabs.
    pub fn add_content(&mut self, tab_id: &str, entry: impl Into<ContentEntry>) {
        if tab_id == DEFAULT_CONTENT_KEY {
            if !self.tabs.is_empty() {
                warn!(panel = %self.id, "default content added to a tabbed panel; ignoring");
                return;
            }
        } else if !self.tabs.iter().any(|tab| tab.id == tab_id) {
            warn!(panel = %self.id, tab = tab_id, "content added to unknown tab; ignoring");
            return;
        }
        let entry = entry.into();
        if entry.is_form_fields() {
            self.has_form_fields = true;
        }
        self.content
            .entry(tab_id.to_string())
            .or_default()
            .push(entry);
    }

    pub fn add_default_content(&mut self, entry: impl Into<ContentEntry>) {
        self.add_content(DEFAULT_CONTENT_KEY, entry);
    }

    pub fn set_footer(&mut self, footer: impl Into<Markup>) {
        let footer = footer.into();
        self.footer = (!footer.is_empty()).then_some(footer);
    }

    /// Drops everything a load callback may have added. The form flag
    /// declared with [`Panel::as_form`] survives.
    pub fn clear(&mut self) {
        self.tabs.clear();
        self.active_tab = None;
        self.content.clear();
        self.footer = None;
        self.has_form_fields = false;
    }
}

#[cfg(test)]
#[path = "tests/model_tests.rs"]
mod tests;
