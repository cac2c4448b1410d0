//! Fixtures shared by the client tests: scripted and in-process transports
//! plus a small host with a form panel and a read-only panel.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use panel::{ContentEntry, FooterActions, Markup, Panel, TabOptions};
use serde_json::Value;
use server_api::{Caller, Dispatcher, PanelHandler, PanelRegistry, TokenIssuer};
use shared::{
    domain::ItemId,
    error::DomainError,
    protocol::{ClientBootstrap, Payload, RequestEnvelope, ResponseEnvelope, UiConfig},
};
use tokio::sync::oneshot;

use crate::{
    dom::{Document, Element, NodeId},
    manager::PanelManager,
    timings::Timings,
    transport::{Transport, TransportError},
};

pub(crate) const EDITOR: &str = "note-editor";
pub(crate) const VIEWER: &str = "note-viewer";
pub(crate) const PINNED: &str = "note-pinned";
pub(crate) const TABLE_ID: &str = "notes-table";

pub(crate) enum Reply {
    Respond(ResponseEnvelope),
    Fail(String),
    Hold(oneshot::Receiver<ResponseEnvelope>),
}

/// Answers requests from a queue and records every request it sees.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RequestEnvelope>>,
    bootstrap: Mutex<ClientBootstrap>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, response: ResponseEnvelope) {
        self.push(Reply::Respond(response));
    }

    pub(crate) fn fail(&self, message: &str) {
        self.push(Reply::Fail(message.to_string()));
    }

    /// Queues a reply that only arrives once the returned sender fires.
    pub(crate) fn hold(&self) -> oneshot::Sender<ResponseEnvelope> {
        let (tx, rx) = oneshot::channel();
        self.push(Reply::Hold(rx));
        tx
    }

    pub(crate) fn set_bootstrap(&self, bootstrap: ClientBootstrap) {
        *self.bootstrap.lock().expect("bootstrap lock") = bootstrap;
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub(crate) fn requests(&self) -> Vec<RequestEnvelope> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn push(&self, reply: Reply) {
        self.replies.lock().expect("replies lock").push_back(reply);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let reply = self.replies.lock().expect("replies lock").pop_front();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(TransportError::Other(message)),
            Some(Reply::Hold(rx)) => rx
                .await
                .map_err(|_| TransportError::Other("held reply dropped".into())),
            None => Err(TransportError::Other("no scripted reply".into())),
        }
    }

    async fn fetch_bootstrap(&self) -> Result<ClientBootstrap, TransportError> {
        Ok(self.bootstrap.lock().expect("bootstrap lock").clone())
    }
}

/// Calls the real dispatcher without a network hop.
pub(crate) struct InProcessTransport {
    dispatcher: Dispatcher,
    caller: Caller,
    calls: AtomicUsize,
}

impl InProcessTransport {
    pub(crate) fn new(dispatcher: Dispatcher) -> Arc<Self> {
        Arc::new(Self {
            dispatcher,
            caller: Caller::new(["manage_options"]),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.dispatcher.dispatch(request, &self.caller).await)
    }

    async fn fetch_bootstrap(&self) -> Result<ClientBootstrap, TransportError> {
        Ok(self.dispatcher.bootstrap())
    }
}

#[derive(Default)]
pub(crate) struct NotesHandler {
    pub(crate) saves: Mutex<Vec<Payload>>,
}

#[async_trait]
impl PanelHandler for NotesHandler {
    async fn on_load(&self, panel: &mut Panel, request: &RequestEnvelope) -> Result<(), DomainError> {
        let id = request.item_id().map_or(0, |id| id.0);
        panel.add_tab("general", "General", false, TabOptions::default());
        panel.add_tab("advanced", "Advanced", false, TabOptions::default());
        panel.add_tab("locked", "Locked", false, TabOptions::disabled());
        let hidden = if id > 0 {
            format!(r#"<input type="hidden" name="id" value="{id}">"#)
        } else {
            String::new()
        };
        panel.add_content(
            "general",
            ContentEntry::fields(format!(
                r#"{hidden}<label>Title <input type="text" name="title" value="" required></label>"#
            )),
        );
        panel.add_content(
            "advanced",
            ContentEntry::fields(r#"<textarea name="body"></textarea>"#),
        );
        panel.set_footer(FooterActions::new().with_delete(id, "Delete"));
        Ok(())
    }

    async fn on_save(&self, data: &Payload) -> Result<ItemId, DomainError> {
        self.saves.lock().expect("saves lock").push(data.clone());
        if data.get("title").and_then(Value::as_str) == Some("reject") {
            return Err(DomainError::new("Title is reserved"));
        }
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| id.parse().ok())
            .unwrap_or(42);
        Ok(ItemId(id))
    }

    async fn on_delete(&self, id: ItemId) -> Result<(), DomainError> {
        if id == ItemId(404) {
            return Err(DomainError::new("Item not found"));
        }
        Ok(())
    }

    async fn row_markup(&self, id: ItemId) -> Option<Markup> {
        Some(Markup::new(format!(
            r#"<tr data-id="{id}"><td>{id}</td><td colspan="2">Saved note</td></tr>"#
        )))
    }
}

struct ViewerHandler;

#[async_trait]
impl PanelHandler for ViewerHandler {
    async fn on_load(&self, panel: &mut Panel, _request: &RequestEnvelope) -> Result<(), DomainError> {
        panel.add_default_content("<p>Read only</p>");
        Ok(())
    }
}

pub(crate) fn dispatcher(notes: Arc<NotesHandler>) -> Dispatcher {
    let mut registry = PanelRegistry::new();
    registry.register(
        Panel::new(EDITOR)
            .with_title("Edit note")
            .with_action_prefix("notes")
            .as_form(),
        notes.clone(),
    );
    registry.register(
        Panel::new(VIEWER)
            .with_title("Note")
            .with_action_prefix("note_viewer"),
        Arc::new(ViewerHandler),
    );
    registry.register(
        Panel::new(PINNED)
            .with_title("Pinned note")
            .with_action_prefix("pinned")
            .with_ui(UiConfig {
                close_on_save: false,
                close_on_escape: false,
                close_on_overlay: false,
            })
            .as_form(),
        notes,
    );
    Dispatcher::new(Arc::new(registry), TokenIssuer::new("test-secret", "test-session"))
}

pub(crate) fn page() -> Document {
    Document::parse(&format!(
        concat!(
            r#"<table id="{}"><thead><tr><th>ID</th><th colspan="2">Title</th></tr></thead><tbody>"#,
            r#"<tr data-id="1"><td>1</td><td>First</td><td>"#,
            r#"<button type="button" data-flyout-trigger="note-editor" data-id="1">Edit</button>"#,
            r#"<button type="button" data-flyout-trigger="note-editor" data-flyout-action="delete">Delete</button>"#,
            r#"</td></tr></tbody></table>"#,
            r#"<button type="button" id="add-note" data-flyout-trigger="note-editor">Add</button>"#,
        ),
        TABLE_ID
    ))
}

pub(crate) struct Harness {
    pub(crate) manager: Arc<PanelManager>,
    pub(crate) transport: Arc<InProcessTransport>,
    pub(crate) notes: Arc<NotesHandler>,
}

/// Manager wired to the in-process dispatcher over [`page`].
pub(crate) async fn harness() -> Harness {
    let notes = Arc::new(NotesHandler::default());
    let transport = InProcessTransport::new(dispatcher(notes.clone()));
    let manager = PanelManager::new(transport.clone(), page().shared(), Timings::default());
    manager.fetch_bootstrap().await.expect("bootstrap");
    Harness {
        manager,
        transport,
        notes,
    }
}

pub(crate) fn count(doc: &Document, pred: impl Fn(&Element) -> bool) -> usize {
    doc.find_all(doc.body(), pred).len()
}

pub(crate) fn first(doc: &Document, pred: impl Fn(&Element) -> bool) -> NodeId {
    doc.find(doc.body(), pred).expect("matching element")
}
