// =====
// TESTS: 5
// =====
//
// Stale response discard: per-direction epochs and conversation switches.

use chatwin::sdk::{ConversationKind, HistoryPage};
use chatwin::window::history::begin_older;
use chatwin::window::{
    ActiveConversation, EngineEvent, RenderSignal, ViewMode, WindowEvent, handle_engine_event,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

use crate::helpers::{CONVERSATION, drain, history, ids, local, msg, open, paged, push, test_engine};

#[test]
fn older_loads_resolved_out_of_order_apply_only_the_latest() {
    let (mut engine, _sdk) = test_engine(paged(20));
    engine.conversation =
        Some(ActiveConversation { id: CONVERSATION.to_owned(), kind: ConversationKind::Single });

    let first = begin_older(&mut engine).unwrap().unwrap();
    let second = begin_older(&mut engine).unwrap().unwrap();

    let latest = HistoryPage { messages: vec![msg("b", 2, 20)], is_end: false };
    handle_engine_event(&mut engine, EngineEvent::PageLoaded { ticket: second.ticket, result: Ok(latest) });
    let stale = HistoryPage { messages: vec![msg("a", 1, 10)], is_end: true };
    handle_engine_event(&mut engine, EngineEvent::PageLoaded { ticket: first.ticket, result: Ok(stale) });

    assert_eq!(ids(&engine), ["b"]);
    assert!(engine.window.has_more_old);
    assert_eq!(engine.window.first_item_index, 10_000 - 1);
}

#[tokio::test(start_paused = true)]
async fn switch_drops_pages_of_previous_conversation() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history("c1", history(3));
        sdk.insert_history("c2", vec![msg("x", 1, 0)]);
        sdk.delay_next_fetch(Duration::from_millis(500));

        engine.open("c1", ConversationKind::Single).unwrap();
        engine.open("c2", ConversationKind::Group).unwrap();
        engine.settle().await;

        assert_eq!(ids(&engine), ["x"]);
        assert_eq!(engine.in_flight(), 0);
        assert_eq!(engine.conversation.as_ref().unwrap().id, "c2");
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn stale_failure_is_silent() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history("c2", vec![msg("x", 1, 0)]);
        sdk.delay_next_fetch(Duration::from_millis(500));
        sdk.fail_next_fetch(500, "late failure");
        let mut signals = engine.subscribe_signals();

        engine.open("c1", ConversationKind::Single).unwrap();
        engine.open("c2", ConversationKind::Single).unwrap();
        engine.settle().await;

        assert_eq!(ids(&engine), ["x"]);
        assert_eq!(drain(&mut signals), [RenderSignal::FollowTail]);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn jump_discards_older_page_in_flight() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(2));
        sdk.insert_history(CONVERSATION, history(6));
        open(&mut engine).await;
        assert_eq!(ids(&engine), ["m5", "m6"]);

        sdk.delay_next_fetch(Duration::from_millis(500));
        engine.load_older().unwrap();
        let target = sdk.stored(CONVERSATION)[1].clone();
        engine.jump_to(&target).unwrap();
        engine.settle().await;

        assert_eq!(ids(&engine), ["m1", "m2", "m3", "m4", "m5", "m6"]);
        assert!(!engine.window.loading_older);
        assert_eq!(engine.mode, ViewMode::History);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn clear_discards_page_in_flight() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(2));
        sdk.insert_history(CONVERSATION, history(3));
        open(&mut engine).await;

        sdk.delay_next_fetch(Duration::from_millis(500));
        engine.load_older().unwrap();
        push(&mut engine, WindowEvent::Clear);
        engine.settle().await;

        assert!(engine.window.is_empty());
        assert!(engine.window.has_more_old);
        assert!(!engine.window.has_more_new);
        assert_eq!(engine.window.first_item_index, 10_000);
    })
    .await;
}
