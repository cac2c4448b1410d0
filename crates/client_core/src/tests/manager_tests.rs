use std::time::Duration;

use panel::{ContentEntry, FooterActions, Panel};
use proptest::prelude::*;
use shared::{
    contract::{ATTR_ACTION, ATTR_TRIGGER},
    error::ApiError,
};

use super::*;
use crate::{
    dom::Element,
    test_support::{
        count, first, harness, Harness, ScriptedTransport, EDITOR, PINNED, VIEWER,
    },
};

const SCRIPTED: &str = "scripted";

fn settle_time() -> Duration {
    Timings::default().close_transition + Duration::from_millis(50)
}

async fn node_where(manager: &PanelManager, pred: impl Fn(&Element) -> bool) -> NodeId {
    let document = manager.document();
    let doc = document.lock().await;
    first(&doc, pred)
}

async fn count_where(manager: &PanelManager, pred: impl Fn(&Element) -> bool) -> usize {
    let document = manager.document();
    let doc = document.lock().await;
    count(&doc, pred)
}

async fn open_editor_for(h: &Harness, id: &str) -> ActionOutcome {
    let edit = node_where(&h.manager, |el| {
        el.attr(ATTR_TRIGGER) == Some(EDITOR) && el.attr(ATTR_ROW_ID) == Some(id)
    })
    .await;
    h.manager.click(edit).await.expect("open editor")
}

async fn set_title(manager: &PanelManager, panel_id: &str, title: &str) {
    let root = manager
        .panel_node(&PanelId::new(panel_id))
        .await
        .expect("panel mounted");
    let document = manager.document();
    let mut doc = document.lock().await;
    let form_node = doc.find(root, |el| el.tag() == "form").expect("form");
    assert!(form::set_field(&mut doc, form_node, "title", title));
}

async fn assert_overlay_invariant(manager: &PanelManager) {
    let tracked = manager.open_count().await;
    let overlays = count_where(manager, |el| el.has_class(CLASS_OVERLAY)).await;
    assert_eq!(overlays, usize::from(tracked > 0), "{tracked} tracked panels");
}

fn scripted_config() -> PanelClientConfig {
    PanelClientConfig {
        ajax: AjaxConfig {
            load_action: "s_load".into(),
            save_action: "s_save".into(),
            delete_action: "s_delete".into(),
            token: "tok".into(),
        },
        ui: UiConfig::default(),
    }
}

fn scripted_load(marker: &str) -> ResponseEnvelope {
    let mut panel = Panel::new(SCRIPTED).with_title(marker).as_form();
    panel.add_default_content(ContentEntry::fields(
        r#"<input type="text" name="title" value="filled" required>"#,
    ));
    panel.set_footer(FooterActions::new());
    ResponseEnvelope::success(&LoadData {
        markup: panel.render().into_string(),
        client_config: scripted_config(),
    })
}

async fn scripted_manager() -> (Arc<PanelManager>, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new();
    let manager = PanelManager::new(transport.clone(), Document::new().shared(), Timings::default());
    manager.register(SCRIPTED, scripted_config()).await;
    (manager, transport)
}

async fn wait_for_phase(manager: &PanelManager, panel_id: &PanelId, phase: PanelPhase) {
    while manager.phase(panel_id).await != phase {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn trigger_click_opens_panel_with_overlay_and_focus() {
    let h = harness().await;
    let mut events = h.manager.subscribe();
    let add = node_where(&h.manager, |el| el.attr("id") == Some("add-note")).await;

    let outcome = h.manager.click(add).await.expect("click");
    assert_eq!(outcome, ActionOutcome::Opened);
    let editor = PanelId::new(EDITOR);
    assert_eq!(h.manager.phase(&editor).await, PanelPhase::Open);
    assert_eq!(h.manager.active_tab(&editor).await.as_deref(), Some("general"));

    let document = h.manager.document();
    let doc = document.lock().await;
    let root = first(&doc, |el| el.attr(ATTR_PANEL_ID) == Some(EDITOR));
    assert!(doc.has_class(root, CLASS_ACTIVE));
    let overlays = doc.find_all(doc.body(), |el| el.has_class(CLASS_OVERLAY));
    assert_eq!(overlays.len(), 1);
    assert!(doc.has_class(overlays[0], CLASS_ACTIVE));
    let focused = doc.focused().expect("focus");
    assert_eq!(doc.attr(focused, "name"), Some("title"));
    drop(doc);

    assert_eq!(
        events.try_recv().expect("event"),
        PanelEvent::Opened { panel_id: editor }
    );
}

#[tokio::test(start_paused = true)]
async fn row_trigger_sends_row_id_and_item_id() {
    let h = harness().await;
    open_editor_for(&h, "1").await;
    let payload = h
        .manager
        .load_payload(&PanelId::new(EDITOR))
        .await
        .expect("payload");
    assert_eq!(payload.get("id"), Some(&Value::from("1")));
    assert_eq!(payload.get("row_id"), Some(&Value::from("1")));

    let hidden = count_where(&h.manager, |el| {
        el.attr("type") == Some("hidden") && el.attr("value") == Some("1")
    })
    .await;
    assert_eq!(hidden, 1);
}

#[tokio::test(start_paused = true)]
async fn close_removes_node_and_overlay_after_transition() {
    let h = harness().await;
    let mut events = h.manager.subscribe();
    let editor = PanelId::new(EDITOR);
    h.manager
        .load(TriggerCommand::load(EDITOR))
        .await
        .expect("load");

    let close = node_where(&h.manager, |el| el.has_attr(ATTR_CLOSE)).await;
    assert_eq!(h.manager.click(close).await.expect("close"), ActionOutcome::Closing);
    assert_eq!(h.manager.phase(&editor).await, PanelPhase::Closing);
    let overlay = node_where(&h.manager, |el| el.has_class(CLASS_OVERLAY)).await;
    {
        let document = h.manager.document();
        let doc = document.lock().await;
        assert!(!doc.has_class(overlay, CLASS_ACTIVE));
        let root = first(&doc, |el| el.attr(ATTR_PANEL_ID) == Some(EDITOR));
        assert!(!doc.has_class(root, CLASS_ACTIVE));
    }
    assert_overlay_invariant(&h.manager).await;

    sleep(settle_time()).await;
    assert_eq!(h.manager.phase(&editor).await, PanelPhase::Closed);
    assert_eq!(count_where(&h.manager, |el| el.has_attr(ATTR_PANEL_ID)).await, 0);
    assert_eq!(count_where(&h.manager, |el| el.has_class(CLASS_OVERLAY)).await, 0);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        [
            PanelEvent::Opened { panel_id: editor.clone() },
            PanelEvent::Closed { panel_id: editor },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn overlay_outlives_first_of_two_panels() {
    let h = harness().await;
    h.manager.load(TriggerCommand::load(EDITOR)).await.expect("editor");
    h.manager.load(TriggerCommand::load(VIEWER)).await.expect("viewer");
    assert_eq!(count_where(&h.manager, |el| el.has_class(CLASS_OVERLAY)).await, 1);

    h.manager.close(&PanelId::new(EDITOR)).await.expect("close editor");
    sleep(settle_time()).await;
    assert_eq!(h.manager.open_count().await, 1);
    let overlay = node_where(&h.manager, |el| el.has_class(CLASS_OVERLAY)).await;
    assert!(h.manager.document().lock().await.has_class(overlay, CLASS_ACTIVE));

    h.manager.close(&PanelId::new(VIEWER)).await.expect("close viewer");
    sleep(settle_time()).await;
    assert_overlay_invariant(&h.manager).await;
    assert_eq!(h.manager.open_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn reload_replaces_the_mounted_node() {
    let h = harness().await;
    h.manager.load(TriggerCommand::load(EDITOR)).await.expect("first");
    open_editor_for(&h, "1").await;
    assert_eq!(
        count_where(&h.manager, |el| el.attr(ATTR_PANEL_ID) == Some(EDITOR)).await,
        1
    );
    assert_eq!(count_where(&h.manager, |el| el.has_class(CLASS_OVERLAY)).await, 1);
    assert_eq!(h.manager.open_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn tab_clicks_keep_exactly_one_active_tab() {
    let h = harness().await;
    let editor = PanelId::new(EDITOR);
    h.manager.load(TriggerCommand::load(EDITOR)).await.expect("load");
    let mut events = h.manager.subscribe();

    for (tab, expected) in [
        ("advanced", ActionOutcome::TabChanged("advanced".into())),
        ("advanced", ActionOutcome::Ignored),
        ("locked", ActionOutcome::Ignored),
        ("general", ActionOutcome::TabChanged("general".into())),
        ("advanced", ActionOutcome::TabChanged("advanced".into())),
    ] {
        let button = node_where(&h.manager, |el| el.attr(ATTR_TAB) == Some(tab)).await;
        assert_eq!(h.manager.click(button).await.expect("tab click"), expected);

        let active = h.manager.active_tab(&editor).await.expect("active tab");
        let document = h.manager.document();
        let doc = document.lock().await;
        let active_buttons = doc.find_all(doc.body(), |el| {
            el.has_attr(ATTR_TAB) && el.has_class(CLASS_ACTIVE)
        });
        let active_panes = doc.find_all(doc.body(), |el| {
            el.has_attr(ATTR_TAB_CONTENT) && el.has_class(CLASS_ACTIVE)
        });
        assert_eq!(active_buttons.len(), 1);
        assert_eq!(active_panes.len(), 1);
        assert_eq!(doc.attr(active_buttons[0], ATTR_TAB), Some(active.as_str()));
        assert_eq!(doc.attr(active_panes[0], ATTR_TAB_CONTENT), Some(active.as_str()));
        assert_eq!(doc.attr(active_buttons[0], "aria-selected"), Some("true"));
    }

    let mut changes = 0;
    while let Ok(event) = events.try_recv() {
        assert!(matches!(event, PanelEvent::TabChanged { .. }));
        changes += 1;
    }
    assert_eq!(changes, 3);
}

#[tokio::test(start_paused = true)]
async fn empty_required_field_blocks_submit() {
    let h = harness().await;
    h.manager.load(TriggerCommand::load(EDITOR)).await.expect("load");
    let calls_after_load = h.transport.calls();

    let submit = node_where(&h.manager, |el| el.has_attr(ATTR_SUBMIT)).await;
    for _ in 0..2 {
        assert_eq!(h.manager.click(submit).await.expect("submit"), ActionOutcome::Invalid);
    }
    assert_eq!(h.transport.calls(), calls_after_load);
    assert_eq!(h.manager.phase(&PanelId::new(EDITOR)).await, PanelPhase::Open);

    {
        let document = h.manager.document();
        let doc = document.lock().await;
        let notices = doc.find_all(doc.body(), |el| el.has_attr(ATTR_NOTICE));
        assert_eq!(notices.len(), 1);
        assert_eq!(doc.text_content(notices[0]), REQUIRED_FIELDS_MESSAGE);
        let title = first(&doc, |el| el.attr("name") == Some("title"));
        assert!(doc.has_class(title, CLASS_FIELD_INVALID));
        assert_eq!(doc.focused(), Some(title));
    }

    sleep(Timings::default().notice_dismiss + Duration::from_millis(10)).await;
    assert_eq!(count_where(&h.manager, |el| el.has_attr(ATTR_NOTICE)).await, 0);
}

#[tokio::test(start_paused = true)]
async fn successful_submit_emits_saved_then_closes() {
    let h = harness().await;
    let editor = PanelId::new(EDITOR);
    open_editor_for(&h, "1").await;
    set_title(&h.manager, EDITOR, "Renamed").await;
    let mut events = h.manager.subscribe();

    let submit = node_where(&h.manager, |el| el.has_attr(ATTR_SUBMIT)).await;
    let outcome = h.manager.click(submit).await.expect("submit");
    let ActionOutcome::Saved(data) = outcome else {
        panic!("expected save, got {outcome:?}");
    };
    assert_eq!(data.id, ItemId(1));
    assert_eq!(data.message, "Saved successfully");
    assert_eq!(h.manager.phase(&editor).await, PanelPhase::Closing);

    let saved = h.notes.saves.lock().expect("saves").last().cloned().expect("save");
    assert_eq!(saved.get("title"), Some(&Value::from("Renamed")));
    assert_eq!(saved.get("id"), Some(&Value::from("1")));

    match events.try_recv().expect("saved event") {
        PanelEvent::Saved {
            item_id,
            row_markup,
            ..
        } => {
            assert_eq!(item_id, ItemId(1));
            assert!(row_markup.expect("row markup").contains(r#"data-id="1""#));
        }
        other => panic!("unexpected event {other:?}"),
    }

    sleep(settle_time()).await;
    assert_eq!(h.manager.phase(&editor).await, PanelPhase::Closed);
}

#[tokio::test(start_paused = true)]
async fn panel_without_close_on_save_stays_open_with_notice() {
    let h = harness().await;
    let pinned = PanelId::new(PINNED);
    h.manager.load(TriggerCommand::load(PINNED)).await.expect("load");
    set_title(&h.manager, PINNED, "Kept").await;

    let outcome = h.manager.submit(&pinned).await.expect("submit");
    assert!(matches!(outcome, ActionOutcome::Saved(_)));
    assert_eq!(h.manager.phase(&pinned).await, PanelPhase::Open);

    let document = h.manager.document();
    let doc = document.lock().await;
    let notice = first(&doc, |el| el.has_attr(ATTR_NOTICE));
    assert!(doc.has_class(notice, "flyout-notice-success"));
    assert_eq!(doc.text_content(notice), "Saved successfully");
}

#[tokio::test(start_paused = true)]
async fn rejected_save_shows_inline_error_and_reopens() {
    let h = harness().await;
    let editor = PanelId::new(EDITOR);
    h.manager.load(TriggerCommand::load(EDITOR)).await.expect("load");
    set_title(&h.manager, EDITOR, "reject").await;

    let outcome = h.manager.submit(&editor).await.expect("submit");
    assert_eq!(outcome, ActionOutcome::Failed("Title is reserved".into()));
    assert_eq!(h.manager.phase(&editor).await, PanelPhase::Open);

    let document = h.manager.document();
    let doc = document.lock().await;
    let body = first(&doc, |el| el.has_class(CLASS_BODY));
    let notice = doc.element_children(body)[0];
    assert!(doc.has_attr(notice, ATTR_NOTICE));
    assert_eq!(doc.text_content(notice), "Title is reserved");
}

#[tokio::test(start_paused = true)]
async fn network_error_on_save_keeps_panel_open() {
    let (manager, transport) = scripted_manager().await;
    let id = PanelId::new(SCRIPTED);
    transport.respond(scripted_load("first"));
    manager.load(TriggerCommand::load(SCRIPTED)).await.expect("load");

    transport.fail("connection reset");
    let err = manager.submit(&id).await.expect_err("transport failure");
    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(manager.phase(&id).await, PanelPhase::Open);

    let requests = transport.requests();
    assert_eq!(requests[1].action, "s_save");
    assert_eq!(requests[1].token, "tok");
    assert_eq!(requests[1].payload.get("title"), Some(&Value::from("filled")));

    let notice = node_where(&manager, |el| el.has_attr(ATTR_NOTICE)).await;
    assert_eq!(
        manager.document().lock().await.text_content(notice),
        "Network error: connection reset"
    );
}

#[tokio::test(start_paused = true)]
async fn superseded_load_never_touches_document() {
    let (manager, transport) = scripted_manager().await;
    let id = PanelId::new(SCRIPTED);
    let held = transport.hold();
    transport.respond(scripted_load("fresh"));

    let first_load = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.load(TriggerCommand::load(SCRIPTED)).await }
    });
    wait_for_phase(&manager, &id, PanelPhase::Loading).await;

    let second = manager.load(TriggerCommand::load(SCRIPTED)).await.expect("second");
    assert_eq!(second, ActionOutcome::Opened);
    assert_eq!(
        first_load.await.expect("join").expect("first"),
        ActionOutcome::Cancelled
    );
    assert!(held.send(scripted_load("stale")).is_err());

    let html = manager.document().lock().await.to_html();
    assert!(html.contains("fresh"));
    assert!(!html.contains("stale"));
    assert_eq!(count_where(&manager, |el| el.has_attr(ATTR_PANEL_ID)).await, 1);
}

#[tokio::test(start_paused = true)]
async fn closing_a_loading_panel_cancels_its_request() {
    let (manager, transport) = scripted_manager().await;
    let id = PanelId::new(SCRIPTED);
    let held = transport.hold();

    let load = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.load(TriggerCommand::load(SCRIPTED)).await }
    });
    wait_for_phase(&manager, &id, PanelPhase::Loading).await;

    manager.close(&id).await.expect("close");
    assert_eq!(load.await.expect("join").expect("load"), ActionOutcome::Cancelled);
    assert!(held.send(scripted_load("late")).is_err());
    assert_eq!(manager.phase(&id).await, PanelPhase::Closed);
    assert_eq!(manager.document().lock().await.to_html(), "");
}

#[tokio::test(start_paused = true)]
async fn rejected_load_surfaces_page_notice() {
    let (manager, transport) = scripted_manager().await;
    let id = PanelId::new(SCRIPTED);
    transport.respond(ResponseEnvelope::failure(ApiError::unauthorized()));

    let outcome = manager.load(TriggerCommand::load(SCRIPTED)).await.expect("load");
    assert_eq!(outcome, ActionOutcome::Failed("Security check failed".into()));
    assert_eq!(manager.phase(&id).await, PanelPhase::Closed);
    assert_overlay_invariant(&manager).await;

    let document = manager.document();
    let doc = document.lock().await;
    let area = first(&doc, |el| el.has_class(CLASS_NOTICES));
    let notices = doc.element_children(area);
    assert_eq!(notices.len(), 1);
    assert!(doc.has_class(notices[0], "flyout-notice-error"));
}

#[tokio::test(start_paused = true)]
async fn malformed_markup_is_not_mounted() {
    let (manager, transport) = scripted_manager().await;
    transport.respond(ResponseEnvelope::success(&LoadData {
        markup: "<div>no panel root</div>".into(),
        client_config: scripted_config(),
    }));

    let outcome = manager.load(TriggerCommand::load(SCRIPTED)).await.expect("load");
    assert!(matches!(outcome, ActionOutcome::Failed(_)));
    assert_eq!(manager.open_count().await, 0);
    assert!(!manager.document().lock().await.to_html().contains("no panel root"));
}

#[tokio::test(start_paused = true)]
async fn unknown_panel_is_rejected_without_a_request() {
    let (manager, transport) = scripted_manager().await;
    let err = manager
        .load(TriggerCommand::load("nope"))
        .await
        .expect_err("unknown panel");
    assert!(matches!(err, ClientError::UnknownPanel(id) if id.as_str() == "nope"));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn escape_closes_topmost_panel_that_allows_it() {
    let h = harness().await;
    h.manager.load(TriggerCommand::load(EDITOR)).await.expect("editor");
    h.manager.load(TriggerCommand::load(VIEWER)).await.expect("viewer");

    assert_eq!(h.manager.press_escape().await, Some(PanelId::new(VIEWER)));
    assert_eq!(h.manager.press_escape().await, Some(PanelId::new(EDITOR)));
    assert_eq!(h.manager.press_escape().await, None);

    h.manager.load(TriggerCommand::load(PINNED)).await.expect("pinned");
    assert_eq!(h.manager.press_escape().await, None);
    assert_eq!(h.manager.phase(&PanelId::new(PINNED)).await, PanelPhase::Open);
}

#[tokio::test(start_paused = true)]
async fn overlay_click_closes_only_panels_that_allow_it() {
    let h = harness().await;
    h.manager.load(TriggerCommand::load(EDITOR)).await.expect("editor");
    h.manager.load(TriggerCommand::load(PINNED)).await.expect("pinned");

    let overlay = node_where(&h.manager, |el| el.has_class(CLASS_OVERLAY)).await;
    assert_eq!(h.manager.click(overlay).await.expect("click"), ActionOutcome::Closing);
    assert_eq!(h.manager.phase(&PanelId::new(EDITOR)).await, PanelPhase::Closing);
    assert_eq!(h.manager.phase(&PanelId::new(PINNED)).await, PanelPhase::Open);

    sleep(settle_time()).await;
    assert_eq!(count_where(&h.manager, |el| el.has_class(CLASS_OVERLAY)).await, 1);
}

#[tokio::test(start_paused = true)]
async fn row_delete_trigger_emits_deleted() {
    let h = harness().await;
    let mut events = h.manager.subscribe();
    let delete = node_where(&h.manager, |el| el.attr(ATTR_ACTION) == Some("delete")).await;

    let outcome = h.manager.click(delete).await.expect("delete");
    let ActionOutcome::Deleted(data) = outcome else {
        panic!("expected delete, got {outcome:?}");
    };
    assert_eq!(data.id, ItemId(1));
    assert_eq!(h.manager.open_count().await, 0);
    assert_eq!(
        events.try_recv().expect("event"),
        PanelEvent::Deleted {
            panel_id: PanelId::new(EDITOR),
            item_id: ItemId(1),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn delete_inside_panel_closes_it() {
    let h = harness().await;
    let editor = PanelId::new(EDITOR);
    open_editor_for(&h, "1").await;

    let delete = node_where(&h.manager, |el| el.has_attr(ATTR_DELETE)).await;
    let outcome = h.manager.click(delete).await.expect("delete");
    assert!(matches!(outcome, ActionOutcome::Deleted(_)));
    assert_eq!(h.manager.phase(&editor).await, PanelPhase::Closing);
}

#[tokio::test(start_paused = true)]
async fn failed_delete_surfaces_notice() {
    let h = harness().await;
    let outcome = h
        .manager
        .delete(&PanelId::new(EDITOR), ItemId(404))
        .await
        .expect("delete");
    assert_eq!(outcome, ActionOutcome::Failed("Item not found".into()));
    assert_eq!(count_where(&h.manager, |el| el.has_attr(ATTR_NOTICE)).await, 1);
}

#[tokio::test(start_paused = true)]
async fn close_all_closes_every_panel() {
    let h = harness().await;
    h.manager.load(TriggerCommand::load(EDITOR)).await.expect("editor");
    h.manager.load(TriggerCommand::load(VIEWER)).await.expect("viewer");
    h.manager.close_all().await;
    sleep(settle_time()).await;
    assert_eq!(h.manager.open_count().await, 0);
    assert_overlay_invariant(&h.manager).await;
}

#[tokio::test(start_paused = true)]
async fn operations_on_closed_panels_report_not_open() {
    let h = harness().await;
    let editor = PanelId::new(EDITOR);
    assert!(matches!(h.manager.close(&editor).await, Err(ClientError::NotOpen(_))));
    assert!(matches!(h.manager.submit(&editor).await, Err(ClientError::NotOpen(_))));
    assert!(matches!(
        h.manager.switch_tab(&editor, "general").await,
        Err(ClientError::NotOpen(_))
    ));

    h.manager.load(TriggerCommand::load(VIEWER)).await.expect("viewer");
    assert!(matches!(
        h.manager.submit(&PanelId::new(VIEWER)).await,
        Err(ClientError::NotAForm(_))
    ));
}

const PANELS: [&str; 3] = [EDITOR, VIEWER, PINNED];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn overlay_exists_exactly_while_panels_are_tracked(
        ops in proptest::collection::vec((0usize..3, 0u8..4), 1..20)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("runtime");
        runtime.block_on(async move {
            let h = harness().await;
            for (panel, op) in ops {
                let id = PanelId::new(PANELS[panel]);
                match op {
                    0 => {
                        h.manager.load(TriggerCommand::load(id)).await.expect("load");
                    }
                    1 => {
                        let _ = h.manager.close(&id).await;
                    }
                    2 => {
                        h.manager.press_escape().await;
                    }
                    _ => sleep(settle_time()).await,
                }
                assert_overlay_invariant(&h.manager).await;
            }

            h.manager.close_all().await;
            sleep(settle_time()).await;
            assert_eq!(h.manager.open_count().await, 0);
            assert_overlay_invariant(&h.manager).await;
        });
    }
}
