//! Keeps a list table in step with saved and deleted items.

use std::sync::Arc;

use shared::{
    contract::{
        ATTR_ROW_ID, CLASS_EMPTY_ROW, CLASS_ROW_DELETING, CLASS_ROW_FADING, CLASS_ROW_HIGHLIGHT,
    },
    domain::ItemId,
};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, warn};

use crate::{
    dom::{Document, NodeId, SharedDocument},
    events::PanelEvent,
    timings::Timings,
};

pub const DEFAULT_EMPTY_MESSAGE: &str = "No items found.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSyncConfig {
    /// `id` attribute of the table element.
    pub table_id: String,
    pub empty_message: String,
}

impl TableSyncConfig {
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
        }
    }

    pub fn with_empty_message(mut self, message: impl Into<String>) -> Self {
        self.empty_message = message.into();
        self
    }
}

pub struct TableSync {
    document: SharedDocument,
    config: TableSyncConfig,
    timings: Timings,
}

impl TableSync {
    pub fn new(document: SharedDocument, config: TableSyncConfig, timings: Timings) -> Arc<Self> {
        Arc::new(Self {
            document,
            config,
            timings,
        })
    }

    pub fn config(&self) -> &TableSyncConfig {
        &self.config
    }

    /// Applies events from `events` until the sender side goes away.
    pub fn spawn(self: &Arc<Self>, mut events: broadcast::Receiver<PanelEvent>) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => sync.apply(&event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, table = %sync.config.table_id, "table sync fell behind panel events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(table = %sync.config.table_id, "table sync stopped");
        })
    }

    pub async fn apply(self: &Arc<Self>, event: &PanelEvent) {
        match event {
            PanelEvent::Saved {
                item_id,
                row_markup,
                ..
            } => self.on_saved(*item_id, row_markup.as_deref()).await,
            PanelEvent::Deleted { item_id, .. } => self.on_deleted(*item_id).await,
            _ => {}
        }
    }

    async fn on_saved(self: &Arc<Self>, item_id: ItemId, row_markup: Option<&str>) {
        let Some(markup) = row_markup.filter(|markup| !markup.trim().is_empty()) else {
            debug!(item = %item_id, "saved event carries no row markup");
            return;
        };

        let fragment = Document::parse(markup);
        if fragment
            .element_children(fragment.body())
            .into_iter()
            .all(|node| fragment.tag(node) != Some("tr"))
        {
            warn!(item = %item_id, "row markup did not contain a table row");
            return;
        }

        let mut doc = self.document.lock().await;
        let Some(rows) = self.row_container(&doc) else {
            warn!(table = %self.config.table_id, "table not found in document");
            return;
        };
        let inserted = match find_row(&doc, rows, item_id) {
            Some(existing) => doc.replace_with_html(existing, markup),
            None => {
                for placeholder in doc.find_all(rows, |el| el.has_class(CLASS_EMPTY_ROW)) {
                    doc.remove(placeholder);
                }
                doc.prepend_html(rows, markup)
            }
        };
        let Some(row) = inserted.into_iter().find(|node| doc.tag(*node) == Some("tr")) else {
            warn!(item = %item_id, "row markup did not contain a table row");
            return;
        };
        doc.add_class(row, CLASS_ROW_HIGHLIGHT);
        drop(doc);

        let sync = Arc::clone(self);
        tokio::spawn(async move {
            sleep(sync.timings.row_highlight).await;
            sync.document
                .lock()
                .await
                .remove_class(row, CLASS_ROW_HIGHLIGHT);
        });
    }

    async fn on_deleted(self: &Arc<Self>, item_id: ItemId) {
        let row = {
            let mut doc = self.document.lock().await;
            let Some(row) = self
                .row_container(&doc)
                .and_then(|rows| find_row(&doc, rows, item_id))
            else {
                debug!(item = %item_id, "deleted item has no row in the table");
                return;
            };
            doc.add_class(row, CLASS_ROW_DELETING);
            row
        };

        let sync = Arc::clone(self);
        tokio::spawn(async move {
            sleep(sync.timings.row_delete_delay).await;
            {
                let mut doc = sync.document.lock().await;
                if !doc.contains(row) {
                    return;
                }
                doc.add_class(row, CLASS_ROW_FADING);
            }
            sleep(sync.timings.row_fade).await;
            let mut doc = sync.document.lock().await;
            sync.remove_row(&mut doc, row);
        });
    }

    fn remove_row(&self, doc: &mut Document, row: NodeId) {
        let Some(table) = doc.element_by_id(&self.config.table_id) else {
            doc.remove(row);
            return;
        };
        let columns = column_count(doc, table);
        doc.remove(row);

        let Some(rows) = self.row_container(doc) else {
            return;
        };
        let has_rows = doc
            .find(rows, |el| el.tag() == "tr" && el.has_attr(ATTR_ROW_ID))
            .is_some();
        let has_placeholder = doc.find(rows, |el| el.has_class(CLASS_EMPTY_ROW)).is_some();
        if !has_rows && !has_placeholder {
            debug!(table = %self.config.table_id, "table is empty; inserting placeholder row");
            doc.append_html(
                rows,
                &format!(
                    r#"<tr class="{CLASS_EMPTY_ROW}"><td colspan="{columns}">{}</td></tr>"#,
                    v_htmlescape::escape(&self.config.empty_message)
                ),
            );
        }
    }

    /// The table's `tbody`, or the table itself when it has none.
    fn row_container(&self, doc: &Document) -> Option<NodeId> {
        let table = doc.element_by_id(&self.config.table_id)?;
        Some(doc.find(table, |el| el.tag() == "tbody").unwrap_or(table))
    }
}

fn find_row(doc: &Document, rows: NodeId, item_id: ItemId) -> Option<NodeId> {
    let id = item_id.to_string();
    doc.find(rows, |el| el.tag() == "tr" && el.attr(ATTR_ROW_ID) == Some(id.as_str()))
}

/// Columns spanned by the header row, or by the first data row when the
/// table has no header.
fn column_count(doc: &Document, table: NodeId) -> usize {
    let header = doc
        .find(table, |el| el.tag() == "thead")
        .and_then(|thead| doc.find(thead, |el| el.tag() == "tr"));
    let row = header.or_else(|| {
        doc.find(table, |el| el.tag() == "tr" && !el.has_class(CLASS_EMPTY_ROW))
    });
    row.map(|row| {
        doc.element_children(row)
            .into_iter()
            .filter(|cell| matches!(doc.tag(*cell), Some("th" | "td")))
            .map(|cell| {
                doc.attr(cell, "colspan")
                    .and_then(|span| span.trim().parse::<usize>().ok())
                    .filter(|span| *span > 0)
                    .unwrap_or(1)
            })
            .sum()
    })
    .filter(|columns| *columns > 0)
    .unwrap_or(1)
}

#[cfg(test)]
#[path = "tests/table_sync_tests.rs"]
mod tests;
