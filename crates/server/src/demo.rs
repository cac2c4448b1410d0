//! In-memory item catalogue used as the host application of the binary.

use std::{collections::BTreeMap, fmt::Write as _, sync::Arc};

use async_trait::async_trait;
use panel::{escape, ContentEntry, FooterActions, Markup, Panel, TabOptions};
use serde_json::Value;
use server_api::{PanelHandler, PanelRegistry};
use shared::{
    contract::{ATTR_ACTION, ATTR_ROW_ID, ATTR_TRIGGER, CLASS_EMPTY_ROW, ROW_ID_FIELD},
    domain::{ItemId, PanelWidth},
    error::DomainError,
    protocol::{Payload, RequestEnvelope},
};
use tokio::sync::Mutex;
use tracing::info;

pub(crate) const EDITOR_PANEL: &str = "item-editor";
pub(crate) const DETAILS_PANEL: &str = "item-details";
pub(crate) const LIST_TABLE_ID: &str = "items-table";
const STATUSES: [&str; 3] = ["draft", "published", "archived"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Item {
    pub(crate) id: ItemId,
    pub(crate) title: String,
    pub(crate) status: String,
    pub(crate) notes: String,
}

#[derive(Default)]
pub(crate) struct ItemStore {
    inner: Mutex<ItemStoreState>,
}

#[derive(Default)]
struct ItemStoreState {
    next_id: u64,
    items: BTreeMap<ItemId, Item>,
}

impl ItemStore {
    pub(crate) fn seeded() -> Self {
        let mut state = ItemStoreState::default();
        for (title, status) in [("Welcome post", "published"), ("Roadmap", "draft")] {
            state.next_id += 1;
            let id = ItemId(state.next_id);
            state.items.insert(
                id,
                Item {
                    id,
                    title: title.into(),
                    status: status.into(),
                    notes: String::new(),
                },
            );
        }
        Self {
            inner: Mutex::new(state),
        }
    }

    pub(crate) async fn get(&self, id: ItemId) -> Option<Item> {
        self.inner.lock().await.items.get(&id).cloned()
    }

    pub(crate) async fn list(&self) -> Vec<Item> {
        self.inner.lock().await.items.values().cloned().collect()
    }

    async fn upsert(
        &self,
        id: Option<ItemId>,
        title: String,
        status: String,
        notes: String,
    ) -> Result<ItemId, DomainError> {
        let mut guard = self.inner.lock().await;
        let id = match id {
            Some(id) if guard.items.contains_key(&id) => id,
            Some(_) => return Err(DomainError::new("Item not found")),
            None => {
                guard.next_id += 1;
                ItemId(guard.next_id)
            }
        };
        guard.items.insert(
            id,
            Item {
                id,
                title,
                status,
                notes,
            },
        );
        Ok(id)
    }

    async fn remove(&self, id: ItemId) -> Result<(), DomainError> {
        self.inner
            .lock()
            .await
            .items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::new("Item not found"))
    }
}

pub(crate) fn register_panels(registry: &mut PanelRegistry, items: Arc<ItemStore>) {
    registry.register(
        Panel::new(EDITOR_PANEL)
            .with_title("Edit item")
            .with_width(PanelWidth::Medium)
            .with_action_prefix("items")
            .as_form(),
        Arc::new(ItemEditor {
            items: Arc::clone(&items),
        }),
    );
    registry.register(
        Panel::new(DETAILS_PANEL)
            .with_title("Item details")
            .with_width(PanelWidth::Small)
            .with_class("flyout-readonly")
            .with_action_prefix("item_details"),
        Arc::new(ItemDetails { items }),
    );
}

struct ItemEditor {
    items: Arc<ItemStore>,
}

#[async_trait]
impl PanelHandler for ItemEditor {
    async fn on_load(&self, panel: &mut Panel, request: &RequestEnvelope) -> Result<(), DomainError> {
        let item = match requested_id(request) {
            Some(id) => Some(
                self.items
                    .get(id)
                    .await
                    .ok_or_else(|| DomainError::new("Item not found"))?,
            ),
            None => None,
        };

        panel.set_title(match &item {
            Some(item) => format!("Edit: {}", item.title),
            None => "New item".to_string(),
        });
        panel.add_tab("general", "General", false, TabOptions::default());
        panel.add_tab("notes", "Notes", false, TabOptions::default());

        let (id, title, status, notes) = match &item {
            Some(item) => (item.id.0, item.title.as_str(), item.status.as_str(), item.notes.as_str()),
            None => (0, "", STATUSES[0], ""),
        };
        panel.add_content(
            "general",
            ContentEntry::fields(general_fields(id, title, status)),
        );
        panel.add_content(
            "notes",
            ContentEntry::fields(format!(
                r#"<label>Notes <textarea name="notes" rows="6">{}</textarea></label>"#,
                escape(notes)
            )),
        );
        panel.set_footer(FooterActions::new().with_delete(id, "Delete"));
        Ok(())
    }

    async fn on_save(&self, data: &Payload) -> Result<ItemId, DomainError> {
        let title = field(data, "title");
        if title.is_empty() {
            return Err(DomainError::new("Title is required"));
        }
        let status = field(data, "status");
        if !STATUSES.contains(&status.as_str()) {
            return Err(DomainError::new(format!("Unknown status '{status}'")));
        }
        let id = field(data, "id").parse::<u64>().ok().filter(|id| *id > 0).map(ItemId);

        let saved = self.items.upsert(id, title, status, field(data, "notes")).await?;
        info!(item = %saved, "item saved");
        Ok(saved)
    }

    async fn on_delete(&self, id: ItemId) -> Result<(), DomainError> {
        self.items.remove(id).await?;
        info!(item = %id, "item deleted");
        Ok(())
    }

    async fn row_markup(&self, id: ItemId) -> Option<Markup> {
        self.items.get(id).await.map(|item| row(&item))
    }
}

struct ItemDetails {
    items: Arc<ItemStore>,
}

#[async_trait]
impl PanelHandler for ItemDetails {
    async fn on_load(&self, panel: &mut Panel, request: &RequestEnvelope) -> Result<(), DomainError> {
        let id = requested_id(request).ok_or_else(|| DomainError::new("Missing item id"))?;
        let item = self
            .items
            .get(id)
            .await
            .ok_or_else(|| DomainError::new("Item not found"))?;

        panel.set_title(item.title.clone());
        panel.add_default_content(format!(
            r#"<dl class="flyout-info-grid"><dt>ID</dt><dd>{}</dd><dt>Status</dt><dd>{}</dd></dl>"#,
            item.id,
            escape(&item.status)
        ));
        if !item.notes.is_empty() {
            panel.add_default_content(format!("<p>{}</p>", escape(&item.notes)));
        }
        Ok(())
    }
}

fn requested_id(request: &RequestEnvelope) -> Option<ItemId> {
    request.item_id().or_else(|| {
        match request.payload.get(ROW_ID_FIELD)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .filter(|id| *id > 0)
        .map(ItemId)
    })
}

fn field(data: &Payload, name: &str) -> String {
    match data.get(name) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn general_fields(id: u64, title: &str, status: &str) -> String {
    let mut out = String::new();
    if id > 0 {
        let _ = write!(out, r#"<input type="hidden" name="id" value="{id}">"#);
    }
    let _ = write!(
        out,
        r#"<label>Title <input type="text" name="title" value="{}" required></label>"#,
        escape(title)
    );
    out.push_str(r#"<label>Status <select name="status">"#);
    for option in STATUSES {
        let selected = if option == status { " selected" } else { "" };
        let _ = write!(out, r#"<option value="{option}"{selected}>{option}</option>"#);
    }
    out.push_str("</select></label>");
    out
}

pub(crate) fn row(item: &Item) -> Markup {
    Markup::new(format!(
        r#"<tr {ATTR_ROW_ID}="{id}"><td>{id}</td><td>{title}</td><td>{status}</td><td><button type="button" {ATTR_TRIGGER}="{EDITOR_PANEL}">Edit</button> <button type="button" {ATTR_TRIGGER}="{EDITOR_PANEL}" {ATTR_ACTION}="delete">Delete</button></td></tr>"#,
        id = item.id,
        title = escape(&item.title),
        status = escape(&item.status),
    ))
}

/// The list display the client keeps in sync.
pub(crate) fn list_table(items: &[Item]) -> Markup {
    let mut out = format!(
        r#"<table id="{LIST_TABLE_ID}"><thead><tr><th>ID</th><th>Title</th><th>Status</th><th>Actions</th></tr></thead><tbody>"#
    );
    if items.is_empty() {
        let _ = write!(
            out,
            r#"<tr class="{CLASS_EMPTY_ROW}"><td colspan="4">No items found.</td></tr>"#
        );
    }
    for item in items {
        out.push_str(row(item).as_str());
    }
    out.push_str("</tbody></table>");
    let _ = write!(out, r#"<button type="button" {ATTR_TRIGGER}="{EDITOR_PANEL}">Add item</button>"#);
    Markup::new(out)
}
