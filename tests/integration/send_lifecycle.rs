// =====
// TESTS: 7
// =====
//
// Optimistic send, reconciliation, resend and the delayed spinner.

use chatwin::error::EngineError;
use chatwin::sdk::{MessageContent, MessageStatus};
use chatwin::window::{RenderSignal, ViewMode, handle_engine_event};
use pretty_assertions::assert_eq;
use std::time::Duration;

use crate::helpers::{
    CONVERSATION, assert_window_invariants, drain, history, ids, local, open, paged, test_engine,
};

fn drain_events(engine: &mut chatwin::window::Engine) {
    while let Ok(event) = engine.event_rx.try_recv() {
        handle_engine_event(engine, event);
    }
}

#[tokio::test]
async fn successful_send_confirms_in_place() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(2));
        open(&mut engine).await;

        let local_id = engine.send(MessageContent::text("hello")).unwrap();
        assert_eq!(engine.window.len(), 3);
        let pending = &engine.window.messages()[2];
        assert_eq!(pending.client_msg_id, local_id);
        assert_eq!(pending.status, MessageStatus::Sending);
        assert_eq!(pending.seq, None);
        assert_eq!(pending.sender_nickname, "Me");

        engine.settle().await;

        assert_eq!(engine.window.len(), 3);
        let confirmed = &engine.window.messages()[2];
        assert_eq!(confirmed.client_msg_id, local_id);
        assert_eq!(confirmed.status, MessageStatus::Succeed);
        assert_eq!(confirmed.seq, Some(3));
        assert!(!confirmed.show_spinner);
        assert_window_invariants(&engine);
    })
    .await;
}

#[tokio::test]
async fn failed_send_stays_with_error_code() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(1));
        open(&mut engine).await;
        sdk.fail_next_send(1302, "you are muted");
        let mut signals = engine.subscribe_signals();

        let local_id = engine.send(MessageContent::text("hello")).unwrap();
        engine.settle().await;

        assert_eq!(engine.window.len(), 2);
        let failed = &engine.window.messages()[1];
        assert_eq!(failed.client_msg_id, local_id);
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(failed.err_code, Some(1302));
        assert_eq!(
            drain(&mut signals),
            [
                RenderSignal::FollowTail,
                RenderSignal::SendFailed { client_msg_id: local_id, code: 1302 }
            ]
        );
    })
    .await;
}

#[tokio::test]
async fn resend_replaces_failed_entry_at_tail() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(1));
        open(&mut engine).await;
        sdk.fail_next_send(500, "timeout");
        let failed_id = engine.send(MessageContent::text("again")).unwrap();
        engine.settle().await;

        let resent_id = engine.resend(&failed_id).unwrap();
        assert_ne!(resent_id, failed_id);
        assert!(!engine.window.contains(&failed_id));
        assert_eq!(ids(&engine).last(), Some(&resent_id));

        // The failed id is gone, so a second resend of it cannot stack.
        assert_eq!(
            engine.resend(&failed_id),
            Err(EngineError::MessageNotFound(failed_id.clone()))
        );

        engine.settle().await;
        let resent = engine.window.get(&resent_id).unwrap();
        assert_eq!(resent.status, MessageStatus::Succeed);
        assert_eq!(resent.content, MessageContent::text("again"));
        assert_eq!(engine.window.len(), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn fast_send_never_shows_spinner() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(1));
        open(&mut engine).await;

        sdk.delay_next_send(Duration::from_millis(300));
        let local_id = engine.send(MessageContent::text("quick")).unwrap();
        engine.settle().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        drain_events(&mut engine);

        let sent = engine.window.get(&local_id).unwrap();
        assert_eq!(sent.status, MessageStatus::Succeed);
        assert!(!sent.show_spinner);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn slow_send_reveals_spinner_until_resolved() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(1));
        open(&mut engine).await;

        sdk.delay_next_send(Duration::from_secs(3));
        let local_id = engine.send(MessageContent::text("slow")).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drain_events(&mut engine);
        assert!(engine.window.get(&local_id).unwrap().show_spinner);

        engine.settle().await;
        let sent = engine.window.get(&local_id).unwrap();
        assert_eq!(sent.status, MessageStatus::Succeed);
        assert!(!sent.show_spinner);
    })
    .await;
}

#[tokio::test]
async fn send_while_searching_still_targets_tail() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(40));
        open(&mut engine).await;
        let target = sdk.stored(CONVERSATION)[5].clone();
        engine.jump_to(&target).unwrap();
        engine.settle().await;
        assert_eq!(engine.mode, ViewMode::Search);

        let local_id = engine.send(MessageContent::text("from search")).unwrap();

        assert_eq!(ids(&engine).last(), Some(&local_id));
        assert!(engine.pending_append_ids.is_empty());
        engine.settle().await;
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn send_resolved_after_switch_is_ignored() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(1));
        open(&mut engine).await;
        sdk.delay_next_send(Duration::from_millis(200));

        engine.send(MessageContent::text("orphan")).unwrap();
        engine.close();
        engine.settle().await;

        assert!(engine.window.is_empty());
        assert_eq!(engine.in_flight(), 0);
        assert_eq!(sdk.stored(CONVERSATION).len(), 2);
    })
    .await;
}
