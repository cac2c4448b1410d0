//! Client-side panel lifecycle: load, open, tab switching, submit, delete
//! and close, driven against the shared document.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use serde_json::Value;
use shared::{
    contract::{
        ATTR_CANCEL, ATTR_CLOSE, ATTR_DELETE, ATTR_NOTICE, ATTR_PANEL_ID, ATTR_ROW_ID,
        ATTR_SUBMIT, ATTR_TAB, ATTR_TAB_CONTENT, CLASS_ACTIVE, CLASS_BODY, CLASS_DISABLED,
        CLASS_FIELD_INVALID, CLASS_NOTICE, CLASS_NOTICES, CLASS_OVERLAY,
    },
    domain::{ActionKind, ItemId, PanelId},
    protocol::{
        AjaxConfig, ClientBootstrap, DeleteData, LoadData, Payload, PanelClientConfig,
        RequestEnvelope, ResponseEnvelope, SaveData, UiConfig,
    },
};
use tokio::{
    sync::{broadcast, oneshot, Mutex, MutexGuard},
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    dom::{Document, NodeId, SharedDocument},
    error::ClientError,
    events::PanelEvent,
    form,
    timings::Timings,
    transport::{Transport, TransportError},
    trigger::{TriggerAction, TriggerCommand},
};

pub const REQUIRED_FIELDS_MESSAGE: &str = "Please fill in all required fields.";
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPhase {
    Closed,
    Loading,
    Opening,
    Open,
    Submitting,
    Closing,
}

/// What a manager operation did to the document.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Opened,
    Saved(SaveData),
    Deleted(DeleteData),
    /// Required fields were empty. Nothing was sent.
    Invalid,
    /// The server answered `ok = false`; the message is already on screen.
    Failed(String),
    /// Superseded or closed before the response arrived. Nothing was applied.
    Cancelled,
    Closing,
    TabChanged(String),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

impl NoticeKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
struct ClientInstance {
    panel_id: PanelId,
    node: NodeId,
    phase: PanelPhase,
    active_tab: Option<String>,
    payload: Payload,
    ajax: AjaxConfig,
    ui: UiConfig,
    /// Monotonic per mount. Doubles as stacking order.
    epoch: u64,
}

struct Inflight {
    seq: u64,
    kind: ActionKind,
    cancel: oneshot::Sender<()>,
}

#[derive(Default)]
struct ManagerState {
    configs: ClientBootstrap,
    instances: HashMap<PanelId, ClientInstance>,
    inflight: HashMap<PanelId, Inflight>,
    overlay: Option<NodeId>,
    next_seq: u64,
}

impl ManagerState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

enum Settled<'a> {
    Cancelled,
    Done(
        MutexGuard<'a, ManagerState>,
        Result<ResponseEnvelope, TransportError>,
    ),
}

enum ClickTarget {
    Close(PanelId),
    Tab(PanelId, String),
    Submit(PanelId),
    DeleteInPanel(PanelId, Option<ItemId>),
    Trigger(TriggerCommand),
    Overlay,
    Nothing,
}

/// Owns every open panel instance and the shared overlay.
///
/// Lock order is manager state, then document. Neither lock is held while
/// a request is on the wire.
pub struct PanelManager {
    transport: Arc<dyn Transport>,
    document: SharedDocument,
    timings: Timings,
    inner: Mutex<ManagerState>,
    events: broadcast::Sender<PanelEvent>,
}

impl PanelManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        document: SharedDocument,
        timings: Timings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            transport,
            document,
            timings,
            inner: Mutex::new(ManagerState::default()),
            events,
        })
    }

    /// Replaces the per-panel client configuration.
    pub async fn bootstrap(&self, configs: ClientBootstrap) {
        info!(panels = configs.len(), "client bootstrap installed");
        self.inner.lock().await.configs = configs;
    }

    pub async fn register(&self, panel_id: impl Into<PanelId>, config: PanelClientConfig) {
        self.inner
            .lock()
            .await
            .configs
            .insert(panel_id.into(), config);
    }

    pub async fn fetch_bootstrap(&self) -> Result<usize, ClientError> {
        let configs = self.transport.fetch_bootstrap().await?;
        let count = configs.len();
        self.bootstrap(configs).await;
        Ok(count)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    pub fn document(&self) -> SharedDocument {
        Arc::clone(&self.document)
    }

    pub async fn phase(&self, panel_id: &PanelId) -> PanelPhase {
        let state = self.inner.lock().await;
        match state.instances.get(panel_id) {
            Some(instance) => instance.phase,
            None if state
                .inflight
                .get(panel_id)
                .is_some_and(|request| request.kind == ActionKind::Load) =>
            {
                PanelPhase::Loading
            }
            None => PanelPhase::Closed,
        }
    }

    /// Number of tracked instances, closing ones included.
    pub async fn open_count(&self) -> usize {
        self.inner.lock().await.instances.len()
    }

    pub async fn active_tab(&self, panel_id: &PanelId) -> Option<String> {
        self.inner
            .lock()
            .await
            .instances
            .get(panel_id)
            .and_then(|instance| instance.active_tab.clone())
    }

    /// Payload the panel was loaded with.
    pub async fn load_payload(&self, panel_id: &PanelId) -> Option<Payload> {
        self.inner
            .lock()
            .await
            .instances
            .get(panel_id)
            .map(|instance| instance.payload.clone())
    }

    pub async fn panel_node(&self, panel_id: &PanelId) -> Option<NodeId> {
        self.inner
            .lock()
            .await
            .instances
            .get(panel_id)
            .map(|instance| instance.node)
    }

    /// Routes a click on `node` the way the page's delegated handlers would.
    pub async fn click(self: &Arc<Self>, node: NodeId) -> Result<ActionOutcome, ClientError> {
        let target = {
            let doc = self.document.lock().await;
            classify_click(&doc, node)
        };
        match target {
            ClickTarget::Close(panel_id) => {
                self.close(&panel_id).await?;
                Ok(ActionOutcome::Closing)
            }
            ClickTarget::Tab(panel_id, tab_id) => self.switch_tab(&panel_id, &tab_id).await,
            ClickTarget::Submit(panel_id) => self.submit(&panel_id).await,
            ClickTarget::DeleteInPanel(panel_id, item_id) => {
                let item_id = item_id.ok_or_else(|| ClientError::MissingItemId(panel_id.clone()))?;
                let source = self
                    .inner
                    .lock()
                    .await
                    .instances
                    .get(&panel_id)
                    .map(|instance| instance.epoch);
                self.delete_item(&panel_id, item_id, source).await
            }
            ClickTarget::Trigger(command) => self.trigger(command).await,
            ClickTarget::Overlay => {
                let closed = self.click_overlay().await;
                Ok(if closed.is_empty() {
                    ActionOutcome::Ignored
                } else {
                    ActionOutcome::Closing
                })
            }
            ClickTarget::Nothing => Ok(ActionOutcome::Ignored),
        }
    }

    pub async fn trigger(
        self: &Arc<Self>,
        command: TriggerCommand,
    ) -> Result<ActionOutcome, ClientError> {
        match command.action {
            TriggerAction::Load => self.load(command).await,
            TriggerAction::Delete => {
                let item_id = command
                    .item_id()
                    .ok_or_else(|| ClientError::MissingItemId(command.panel_id.clone()))?;
                self.delete(&command.panel_id, item_id).await
            }
        }
    }

    /// Fetches the panel markup and mounts it. Any request still outstanding
    /// for the same panel id is cancelled first.
    pub async fn load(
        self: &Arc<Self>,
        command: TriggerCommand,
    ) -> Result<ActionOutcome, ClientError> {
        let panel_id = command.panel_id;
        let config = self.config(&panel_id).await?;
        let request = RequestEnvelope::new(
            config.ajax.load_action.clone(),
            config.ajax.token.clone(),
            command.payload.clone(),
        );

        let (mut guard, result) = match self.request(&panel_id, ActionKind::Load, request).await {
            Settled::Cancelled => return Ok(ActionOutcome::Cancelled),
            Settled::Done(guard, result) => (guard, result),
        };
        let state = &mut *guard;
        let mut doc = self.document.lock().await;

        let data = match result {
            Err(err) => {
                warn!(panel = %panel_id, error = %err, "panel load failed");
                self.notify(&mut doc, None, NoticeKind::Error, &format!("Network error: {err}"));
                return Err(err.into());
            }
            Ok(response) => match response.decode::<LoadData>() {
                Ok(data) => data,
                Err(err) => {
                    warn!(panel = %panel_id, code = ?err.code, "server rejected panel load");
                    self.notify(&mut doc, None, NoticeKind::Error, &err.message);
                    return Ok(ActionOutcome::Failed(err.message));
                }
            },
        };

        let Some(node) = mount(&mut doc, &panel_id, &data.markup) else {
            let message = "Received malformed panel markup".to_string();
            warn!(panel = %panel_id, "{message}");
            self.notify(&mut doc, None, NoticeKind::Error, &message);
            return Ok(ActionOutcome::Failed(message));
        };
        ensure_overlay(state, &mut doc);

        let epoch = state.next_seq();
        let active_tab = doc
            .find(node, |el| el.has_attr(ATTR_TAB_CONTENT) && el.has_class(CLASS_ACTIVE))
            .and_then(|tab| doc.attr(tab, ATTR_TAB_CONTENT))
            .map(str::to_string);
        state.instances.insert(
            panel_id.clone(),
            ClientInstance {
                panel_id: panel_id.clone(),
                node,
                phase: PanelPhase::Opening,
                active_tab,
                payload: command.payload,
                ajax: data.client_config.ajax,
                ui: data.client_config.ui,
                epoch,
            },
        );
        drop(doc);
        drop(guard);

        // `active` lands one tick after insertion so the entry transition runs.
        tokio::task::yield_now().await;

        let mut guard = self.inner.lock().await;
        let state = &mut *guard;
        let Some(instance) = state
            .instances
            .get_mut(&panel_id)
            .filter(|instance| instance.epoch == epoch && instance.phase == PanelPhase::Opening)
        else {
            debug!(panel = %panel_id, "panel closed before it finished opening");
            return Ok(ActionOutcome::Cancelled);
        };
        instance.phase = PanelPhase::Open;

        let mut doc = self.document.lock().await;
        doc.add_class(node, CLASS_ACTIVE);
        if let Some(overlay) = state.overlay {
            doc.add_class(overlay, CLASS_ACTIVE);
        }
        if let Some(target) = focus_target(&doc, node) {
            doc.focus(target);
        }
        drop(doc);
        drop(guard);

        info!(panel = %panel_id, "panel opened");
        self.emit(PanelEvent::Opened { panel_id });
        Ok(ActionOutcome::Opened)
    }

    /// Switches the visible tab of an open panel. Disabled and already
    /// active tabs are ignored.
    pub async fn switch_tab(
        &self,
        panel_id: &PanelId,
        tab_id: &str,
    ) -> Result<ActionOutcome, ClientError> {
        let mut guard = self.inner.lock().await;
        let instance = guard
            .instances
            .get_mut(panel_id)
            .filter(|instance| instance.phase != PanelPhase::Closing)
            .ok_or_else(|| ClientError::NotOpen(panel_id.clone()))?;
        if instance.active_tab.as_deref() == Some(tab_id) {
            return Ok(ActionOutcome::Ignored);
        }

        let mut doc = self.document.lock().await;
        let root = instance.node;
        let button = doc.find(root, |el| el.attr(ATTR_TAB) == Some(tab_id));
        if button.is_some_and(|b| doc.has_attr(b, "disabled") || doc.has_class(b, CLASS_DISABLED))
        {
            debug!(panel = %panel_id, tab = tab_id, "ignoring disabled tab");
            return Ok(ActionOutcome::Ignored);
        }
        let content = doc.find(root, |el| el.attr(ATTR_TAB_CONTENT) == Some(tab_id));
        if button.is_none() && content.is_none() {
            debug!(panel = %panel_id, tab = tab_id, "no such tab");
            return Ok(ActionOutcome::Ignored);
        }

        for tab in doc.find_all(root, |el| el.has_attr(ATTR_TAB)) {
            let active = doc.attr(tab, ATTR_TAB) == Some(tab_id);
            doc.toggle_class(tab, CLASS_ACTIVE, active);
            doc.set_attr(tab, "aria-selected", if active { "true" } else { "false" });
        }
        for pane in doc.find_all(root, |el| el.has_attr(ATTR_TAB_CONTENT)) {
            let active = doc.attr(pane, ATTR_TAB_CONTENT) == Some(tab_id);
            doc.toggle_class(pane, CLASS_ACTIVE, active);
        }
        instance.active_tab = Some(tab_id.to_string());
        drop(doc);
        drop(guard);

        self.emit(PanelEvent::TabChanged {
            panel_id: panel_id.clone(),
            tab_id: tab_id.to_string(),
        });
        Ok(ActionOutcome::TabChanged(tab_id.to_string()))
    }

    /// Validates and submits the panel's form.
    pub async fn submit(self: &Arc<Self>, panel_id: &PanelId) -> Result<ActionOutcome, ClientError> {
        let (request, root, epoch) = {
            let mut guard = self.inner.lock().await;
            let instance = guard
                .instances
                .get_mut(panel_id)
                .ok_or_else(|| ClientError::NotOpen(panel_id.clone()))?;
            match instance.phase {
                PanelPhase::Open => {}
                PanelPhase::Submitting => return Ok(ActionOutcome::Ignored),
                _ => return Err(ClientError::NotOpen(panel_id.clone())),
            }

            let mut doc = self.document.lock().await;
            let form_node = doc
                .find(instance.node, |el| el.tag() == "form")
                .ok_or_else(|| ClientError::NotAForm(panel_id.clone()))?;
            for field in doc.find_all(form_node, |el| el.has_class(CLASS_FIELD_INVALID)) {
                doc.remove_class(field, CLASS_FIELD_INVALID);
            }

            let invalid = form::invalid_fields(&doc, form_node);
            if let Some(first) = invalid.first().copied() {
                for field in &invalid {
                    doc.add_class(*field, CLASS_FIELD_INVALID);
                }
                doc.focus(first);
                self.notify(
                    &mut doc,
                    Some(instance.node),
                    NoticeKind::Error,
                    REQUIRED_FIELDS_MESSAGE,
                );
                debug!(panel = %panel_id, invalid = invalid.len(), "submit blocked by validation");
                return Ok(ActionOutcome::Invalid);
            }

            let payload = form::serialize(&doc, form_node);
            instance.phase = PanelPhase::Submitting;
            (
                RequestEnvelope::new(
                    instance.ajax.save_action.clone(),
                    instance.ajax.token.clone(),
                    payload,
                ),
                instance.node,
                instance.epoch,
            )
        };

        let (mut guard, result) = match self.request(panel_id, ActionKind::Save, request).await {
            Settled::Cancelled => {
                self.restore_open(panel_id, epoch).await;
                return Ok(ActionOutcome::Cancelled);
            }
            Settled::Done(guard, result) => (guard, result),
        };
        let ui = match guard
            .instances
            .get_mut(panel_id)
            .filter(|instance| instance.epoch == epoch)
        {
            Some(instance) => {
                instance.phase = PanelPhase::Open;
                instance.ui
            }
            None => return Ok(ActionOutcome::Cancelled),
        };

        let mut doc = self.document.lock().await;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(panel = %panel_id, error = %err, "save request failed");
                self.notify(&mut doc, Some(root), NoticeKind::Error, &format!("Network error: {err}"));
                return Err(err.into());
            }
        };
        let data = match response.decode::<SaveData>() {
            Ok(data) => data,
            Err(err) => {
                debug!(panel = %panel_id, code = ?err.code, "save rejected");
                self.notify(&mut doc, Some(root), NoticeKind::Error, &err.message);
                return Ok(ActionOutcome::Failed(err.message));
            }
        };

        info!(panel = %panel_id, item = %data.id, "item saved");
        self.emit(PanelEvent::Saved {
            panel_id: panel_id.clone(),
            item_id: data.id,
            row_markup: data.row_markup.clone(),
            message: data.message.clone(),
        });
        if ui.close_on_save {
            drop(doc);
            drop(guard);
            self.close(panel_id).await?;
        } else {
            self.notify(&mut doc, Some(root), NoticeKind::Success, &data.message);
        }
        Ok(ActionOutcome::Saved(data))
    }

    /// Deletes `item_id` through the panel's delete action.
    pub async fn delete(
        self: &Arc<Self>,
        panel_id: &PanelId,
        item_id: ItemId,
    ) -> Result<ActionOutcome, ClientError> {
        self.delete_item(panel_id, item_id, None).await
    }

    async fn delete_item(
        self: &Arc<Self>,
        panel_id: &PanelId,
        item_id: ItemId,
        source: Option<u64>,
    ) -> Result<ActionOutcome, ClientError> {
        let config = self.config(panel_id).await?;
        let mut payload = Payload::new();
        payload.insert("id".to_string(), Value::from(item_id.0));
        let request = RequestEnvelope::new(
            config.ajax.delete_action.clone(),
            config.ajax.token.clone(),
            payload,
        );

        let (guard, result) = match self.request(panel_id, ActionKind::Delete, request).await {
            Settled::Cancelled => return Ok(ActionOutcome::Cancelled),
            Settled::Done(guard, result) => (guard, result),
        };
        let source_node = source.and_then(|epoch| {
            guard
                .instances
                .get(panel_id)
                .filter(|instance| instance.epoch == epoch)
                .map(|instance| instance.node)
        });

        let mut doc = self.document.lock().await;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(panel = %panel_id, item = %item_id, error = %err, "delete request failed");
                self.notify(&mut doc, source_node, NoticeKind::Error, &format!("Network error: {err}"));
                return Err(err.into());
            }
        };
        let data = match response.decode::<DeleteData>() {
            Ok(data) => data,
            Err(err) => {
                debug!(panel = %panel_id, item = %item_id, code = ?err.code, "delete rejected");
                self.notify(&mut doc, source_node, NoticeKind::Error, &err.message);
                return Ok(ActionOutcome::Failed(err.message));
            }
        };
        drop(doc);
        drop(guard);

        info!(panel = %panel_id, item = %data.id, "item deleted");
        self.emit(PanelEvent::Deleted {
            panel_id: panel_id.clone(),
            item_id: data.id,
        });
        if source_node.is_some() {
            self.close(panel_id).await?;
        }
        Ok(ActionOutcome::Deleted(data))
    }

    /// Starts the close transition. Closing a panel that is still loading
    /// cancels the load.
    pub async fn close(self: &Arc<Self>, panel_id: &PanelId) -> Result<(), ClientError> {
        let mut guard = self.inner.lock().await;
        let state = &mut *guard;
        // Dropping the sender resolves the waiting request as cancelled.
        let cancelled = state.inflight.remove(panel_id).is_some();

        let Some(instance) = state.instances.get_mut(panel_id) else {
            if cancelled {
                debug!(panel = %panel_id, "cancelled pending request for unopened panel");
                return Ok(());
            }
            return Err(ClientError::NotOpen(panel_id.clone()));
        };
        if instance.phase == PanelPhase::Closing {
            return Ok(());
        }
        instance.phase = PanelPhase::Closing;
        let (node, epoch) = (instance.node, instance.epoch);
        let fade_overlay = state
            .instances
            .values()
            .all(|instance| instance.phase == PanelPhase::Closing);

        let mut doc = self.document.lock().await;
        doc.remove_class(node, CLASS_ACTIVE);
        if fade_overlay {
            if let Some(overlay) = state.overlay {
                doc.remove_class(overlay, CLASS_ACTIVE);
            }
        }
        drop(doc);
        drop(guard);

        debug!(panel = %panel_id, "panel closing");
        let manager = Arc::clone(self);
        let panel_id = panel_id.clone();
        tokio::spawn(async move {
            sleep(manager.timings.close_transition).await;
            manager.finish_close(panel_id, epoch).await;
        });
        Ok(())
    }

    async fn finish_close(&self, panel_id: PanelId, epoch: u64) {
        let mut guard = self.inner.lock().await;
        let state = &mut *guard;
        let Some(node) = state
            .instances
            .get(&panel_id)
            .filter(|instance| instance.epoch == epoch && instance.phase == PanelPhase::Closing)
            .map(|instance| instance.node)
        else {
            return;
        };
        state.instances.remove(&panel_id);

        let mut doc = self.document.lock().await;
        doc.remove(node);
        if state.instances.is_empty() {
            if let Some(overlay) = state.overlay.take() {
                doc.remove(overlay);
            }
        }
        drop(doc);
        drop(guard);

        info!(panel = %panel_id, "panel closed");
        self.emit(PanelEvent::Closed { panel_id });
    }

    pub async fn close_all(self: &Arc<Self>) {
        let ids: BTreeSet<PanelId> = {
            let state = self.inner.lock().await;
            state
                .instances
                .keys()
                .chain(state.inflight.keys())
                .cloned()
                .collect()
        };
        for panel_id in ids {
            if let Err(err) = self.close(&panel_id).await {
                debug!(panel = %panel_id, error = %err, "close_all skipped panel");
            }
        }
    }

    /// Closes the topmost panel if it allows closing on Escape.
    pub async fn press_escape(self: &Arc<Self>) -> Option<PanelId> {
        let target = {
            let state = self.inner.lock().await;
            let topmost = state
                .instances
                .values()
                .filter(|instance| instance.phase != PanelPhase::Closing)
                .max_by_key(|instance| instance.epoch)?;
            (topmost.phase == PanelPhase::Open && topmost.ui.close_on_escape)
                .then(|| topmost.panel_id.clone())?
        };
        self.close(&target).await.ok()?;
        Some(target)
    }

    /// Closes every open panel that allows closing from the overlay.
    pub async fn click_overlay(self: &Arc<Self>) -> Vec<PanelId> {
        let targets: Vec<PanelId> = {
            let state = self.inner.lock().await;
            state
                .instances
                .values()
                .filter(|instance| instance.phase != PanelPhase::Closing && instance.ui.close_on_overlay)
                .map(|instance| instance.panel_id.clone())
                .collect()
        };
        let mut closed = Vec::with_capacity(targets.len());
        for panel_id in targets {
            if self.close(&panel_id).await.is_ok() {
                closed.push(panel_id);
            }
        }
        closed
    }

    async fn config(&self, panel_id: &PanelId) -> Result<PanelClientConfig, ClientError> {
        self.inner
            .lock()
            .await
            .configs
            .get(panel_id)
            .cloned()
            .ok_or_else(|| {
                warn!(panel = %panel_id, "no client config registered for panel");
                ClientError::UnknownPanel(panel_id.clone())
            })
    }

    /// Sends `request` in the panel's request slot, superseding whatever was
    /// there. A `Done` result comes back with the state lock held so the
    /// caller applies it before anything else can interleave.
    async fn request(
        &self,
        panel_id: &PanelId,
        kind: ActionKind,
        request: RequestEnvelope,
    ) -> Settled<'_> {
        let (cancel, cancelled) = oneshot::channel();
        let seq = {
            let mut state = self.inner.lock().await;
            let seq = state.next_seq();
            let previous = state
                .inflight
                .insert(panel_id.clone(), Inflight { seq, kind, cancel });
            if let Some(previous) = previous {
                debug!(panel = %panel_id, superseded = ?previous.kind, "superseding in-flight request");
                let _ = previous.cancel.send(());
            }
            seq
        };

        debug!(panel = %panel_id, action = %request.action, "sending request");
        let result = tokio::select! {
            biased;
            _ = cancelled => {
                debug!(panel = %panel_id, kind = ?kind, "request cancelled");
                return Settled::Cancelled;
            }
            result = self.transport.send(&request) => result,
        };

        let mut state = self.inner.lock().await;
        if state.inflight.get(panel_id).map(|current| current.seq) != Some(seq) {
            debug!(panel = %panel_id, kind = ?kind, "discarding response of superseded request");
            return Settled::Cancelled;
        }
        state.inflight.remove(panel_id);
        Settled::Done(state, result)
    }

    async fn restore_open(&self, panel_id: &PanelId, epoch: u64) {
        let mut state = self.inner.lock().await;
        if let Some(instance) = state.instances.get_mut(panel_id) {
            if instance.epoch == epoch && instance.phase == PanelPhase::Submitting {
                instance.phase = PanelPhase::Open;
            }
        }
    }

    fn emit(&self, event: PanelEvent) {
        if self.events.send(event).is_err() {
            debug!("panel event dropped; no subscribers");
        }
    }

    /// Shows a notice inside `panel` when it is mounted, otherwise in the
    /// page-level notice area. Every notice dismisses itself.
    fn notify(&self, doc: &mut Document, panel: Option<NodeId>, kind: NoticeKind, message: &str) {
        let notice = match panel.filter(|root| doc.contains(*root)) {
            Some(root) => inline_notice(doc, root, kind, message),
            None => document_notice(doc, kind, message),
        };
        let Some(notice) = notice else {
            return;
        };
        let document = Arc::clone(&self.document);
        let delay = self.timings.notice_dismiss;
        tokio::spawn(async move {
            sleep(delay).await;
            document.lock().await.remove(notice);
        });
    }
}

fn classify_click(doc: &Document, node: NodeId) -> ClickTarget {
    if !doc.contains(node) {
        return ClickTarget::Nothing;
    }
    if doc.has_class(node, CLASS_OVERLAY) {
        return ClickTarget::Overlay;
    }

    let panel_id = doc
        .closest(node, |el| el.has_attr(ATTR_PANEL_ID))
        .and_then(|root| doc.attr(root, ATTR_PANEL_ID))
        .map(PanelId::new);
    if let Some(panel_id) = panel_id {
        if doc
            .closest(node, |el| el.has_attr(ATTR_CLOSE) || el.has_attr(ATTR_CANCEL))
            .is_some()
        {
            return ClickTarget::Close(panel_id);
        }
        if let Some(tab) = doc
            .closest(node, |el| el.has_attr(ATTR_TAB))
            .and_then(|tab| doc.attr(tab, ATTR_TAB))
        {
            return ClickTarget::Tab(panel_id, tab.to_string());
        }
        if let Some(button) = doc.closest(node, |el| el.has_attr(ATTR_DELETE)) {
            let item_id = doc
                .attr(button, ATTR_ROW_ID)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .filter(|id| *id > 0)
                .map(ItemId);
            return ClickTarget::DeleteInPanel(panel_id, item_id);
        }
        if doc.closest(node, |el| el.has_attr(ATTR_SUBMIT)).is_some() {
            return ClickTarget::Submit(panel_id);
        }
    }

    match TriggerCommand::from_element(doc, node) {
        Some(command) => ClickTarget::Trigger(command),
        None => ClickTarget::Nothing,
    }
}

/// Appends the markup to the body and drops any older node for the same id.
/// Returns `None`, leaving the document untouched, when the markup has no
/// panel root for `panel_id`.
fn mount(doc: &mut Document, panel_id: &PanelId, markup: &str) -> Option<NodeId> {
    let body = doc.body();
    let inserted = doc.append_html(body, markup);
    let root = inserted
        .iter()
        .copied()
        .find(|node| doc.attr(*node, ATTR_PANEL_ID) == Some(panel_id.as_str()));
    let Some(root) = root else {
        for node in inserted {
            doc.remove(node);
        }
        return None;
    };
    for stale in doc.find_all(body, |el| el.attr(ATTR_PANEL_ID) == Some(panel_id.as_str())) {
        if stale != root {
            doc.remove(stale);
        }
    }
    Some(root)
}

fn ensure_overlay(state: &mut ManagerState, doc: &mut Document) {
    if state.overlay.is_some_and(|overlay| doc.contains(overlay)) {
        return;
    }
    let body = doc.body();
    state.overlay = doc
        .append_html(body, &format!(r#"<div class="{CLASS_OVERLAY}"></div>"#))
        .into_iter()
        .next();
}

fn focus_target(doc: &Document, root: NodeId) -> Option<NodeId> {
    let body = doc.find(root, |el| el.has_class(CLASS_BODY)).unwrap_or(root);
    doc.find(body, |el| {
        matches!(el.tag(), "input" | "select" | "textarea")
            && !el.has_attr("disabled")
            && el.attr("type") != Some("hidden")
    })
    .or_else(|| doc.find(root, |el| el.has_attr(ATTR_CLOSE)))
}

fn notice_markup(kind: NoticeKind, message: &str) -> String {
    format!(
        r#"<div class="{CLASS_NOTICE} {CLASS_NOTICE}-{}" {ATTR_NOTICE} role="alert"><p>{}</p></div>"#,
        kind.as_str(),
        v_htmlescape::escape(message)
    )
}

/// At most one inline notice per panel; a new one replaces the old.
fn inline_notice(
    doc: &mut Document,
    root: NodeId,
    kind: NoticeKind,
    message: &str,
) -> Option<NodeId> {
    for existing in doc.find_all(root, |el| el.has_attr(ATTR_NOTICE)) {
        doc.remove(existing);
    }
    let target = doc.find(root, |el| el.has_class(CLASS_BODY)).unwrap_or(root);
    doc.prepend_html(target, &notice_markup(kind, message))
        .into_iter()
        .next()
}

fn document_notice(doc: &mut Document, kind: NoticeKind, message: &str) -> Option<NodeId> {
    let body = doc.body();
    let area = match doc.find(body, |el| el.has_class(CLASS_NOTICES)) {
        Some(area) => area,
        None => doc
            .prepend_html(body, &format!(r#"<div class="{CLASS_NOTICES}" aria-live="polite"></div>"#))
            .into_iter()
            .next()?,
    };
    doc.append_html(area, &notice_markup(kind, message))
        .into_iter()
        .next()
}

#[cfg(test)]
#[path = "tests/manager_tests.rs"]
mod tests;
