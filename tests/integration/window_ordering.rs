// =====
// TESTS: 6
// =====
//
// Ordering, uniqueness and gap annotation across pages and pushes.

use chatwin::sdk::MessageContent;
use chatwin::window::{Direction, RenderSignal, WindowEvent};
use pretty_assertions::assert_eq;

use crate::helpers::{
    CONVERSATION, assert_window_invariants, drain, gaps, history, ids, local, msg, open, paged,
    push, test_engine,
};

#[tokio::test]
async fn push_then_older_page_matches_worked_example() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(2));
        sdk.insert_history(
            CONVERSATION,
            vec![msg("M0", 9, -600_000), msg("M1", 10, 0), msg("M2", 11, 120_000)],
        );
        open(&mut engine).await;
        assert_eq!(ids(&engine), ["M1", "M2"]);
        assert!(engine.window.has_more_old);

        let m3 = sdk.deliver(CONVERSATION, msg("M3", 0, 200_000));
        assert_eq!(m3.seq, Some(12));
        push(&mut engine, WindowEvent::PushNew { message: m3 });
        assert_eq!(ids(&engine), ["M1", "M2", "M3"]);
        assert!(!engine.window.messages()[2].gap_time);

        engine.load_older().unwrap();
        engine.settle().await;

        assert_eq!(ids(&engine), ["M0", "M1", "M2", "M3"]);
        assert_eq!(gaps(&engine), [true, true, false, false]);
        assert!(!engine.window.has_more_old);
        assert_eq!(engine.window.first_item_index, 10_000 - 3);
        assert_window_invariants(&engine);
    })
    .await;
}

#[tokio::test]
async fn overlapping_push_and_page_never_duplicate() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(3));
        sdk.insert_history(CONVERSATION, history(5));
        open(&mut engine).await;
        assert_eq!(ids(&engine), ["m3", "m4", "m5"]);

        // The same message arrives by push after the page already held it.
        let m5 = sdk.stored(CONVERSATION)[4].clone();
        push(&mut engine, WindowEvent::PushNew { message: m5 });
        engine.load_older().unwrap();
        engine.settle().await;

        assert_eq!(ids(&engine), ["m1", "m2", "m3", "m4", "m5"]);
        assert_eq!(engine.window.first_item_index, 10_000 - 5);
        assert_window_invariants(&engine);
    })
    .await;
}

#[tokio::test]
async fn late_push_lands_in_send_time_order() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(3));
        open(&mut engine).await;

        push(&mut engine, WindowEvent::PushNew { message: msg("late", 4, 1500) });

        assert_eq!(ids(&engine), ["m1", "late", "m2", "m3"]);
        assert_eq!(gaps(&engine), [true, false, false, false]);
    })
    .await;
}

#[tokio::test]
async fn gap_threshold_separates_time_groups() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(
            CONVERSATION,
            vec![msg("a", 1, 0), msg("b", 2, 300_000), msg("c", 3, 600_001), msg("d", 4, 600_002)],
        );
        open(&mut engine).await;
        assert_eq!(gaps(&engine), [true, false, true, false]);

        // Without b, a and c are more than the threshold apart.
        push(&mut engine, WindowEvent::DeleteById { client_msg_id: "b".to_owned() });
        assert_eq!(gaps(&engine), [true, true, false]);
    })
    .await;
}

#[tokio::test]
async fn failed_initial_load_is_retryable() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(2));
        sdk.fail_next_fetch(500, "unreachable");
        let mut signals = engine.subscribe_signals();

        open(&mut engine).await;
        assert!(engine.window.is_empty());
        assert!(!engine.window.init_loading);
        assert!(!engine.window.loading_older);
        assert_eq!(
            drain(&mut signals),
            [RenderSignal::LoadFailed {
                direction: Direction::Older,
                message: "sdk error 500: unreachable".to_owned()
            }]
        );

        engine.load_older().unwrap();
        engine.settle().await;
        assert_eq!(ids(&engine), ["m1", "m2"]);
        assert!(!engine.window.has_more_old);
    })
    .await;
}

#[tokio::test]
async fn page_entries_without_id_are_dropped() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        let blank = chatwin::sdk::Message::new("", "peer", MessageContent::text("?"), 500).seq(2);
        sdk.insert_history(CONVERSATION, vec![msg("a", 1, 0), blank, msg("b", 3, 1000)]);
        open(&mut engine).await;
        assert_eq!(ids(&engine), ["a", "b"]);
    })
    .await;
}
