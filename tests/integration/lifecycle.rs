// =====
// TESTS: 7
// =====
//
// Conversation lifecycle, read reconciliation, user actions, the command
// loop and scenario replay.

use chatwin::replay::{Scenario, run_scenario};
use chatwin::sdk::{ConversationKind, Message, MessageContent, MessageStatus};
use chatwin::window::{EngineCommand, RenderSignal, ViewMode, WindowConfig, run_engine};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use crate::helpers::{CONVERSATION, drain, history, ids, local, msg, open, paged, test_engine};

#[tokio::test]
async fn mark_visible_acknowledges_only_eligible_messages() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        let own = Message::new("own", "me", MessageContent::text("mine"), 500).seq(9);
        let mut already = msg("already", 10, 600);
        already.is_read = true;
        sdk.insert_history(CONVERSATION, vec![msg("m1", 1, 100), own, already]);
        open(&mut engine).await;

        let visible = ["m1", "own", "already", "not-loaded"].map(str::to_owned);
        engine.mark_visible(&visible).unwrap();
        assert!(engine.window.get("m1").unwrap().is_read);
        engine.settle().await;

        let acks = sdk.read_acks();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].client_msg_ids, ["m1"]);
        assert!(!acks[0].group);

        // Already read now, so nothing goes out again.
        engine.mark_visible(&visible).unwrap();
        engine.settle().await;
        assert_eq!(sdk.read_acks().len(), 1);
    })
    .await;
}

#[tokio::test]
async fn group_conversations_use_group_read() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history("g1", history(2));
        engine.open("g1", ConversationKind::Group).unwrap();
        engine.settle().await;

        engine.mark_visible(&["m2".to_owned()]).unwrap();
        engine.settle().await;

        let acks = sdk.read_acks();
        assert_eq!(acks.len(), 1);
        assert!(acks[0].group);
        assert_eq!(acks[0].conversation_id, "g1");
    })
    .await;
}

#[tokio::test]
async fn delete_and_multi_select() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(4));
        open(&mut engine).await;

        engine.toggle_checked("m2").unwrap();
        engine.toggle_checked("m3").unwrap();
        let selected = engine.checked_ids();
        assert_eq!(selected, ["m2", "m3"]);

        engine.delete(selected, true).unwrap();
        engine.settle().await;

        assert_eq!(ids(&engine), ["m1", "m4"]);
        assert_eq!(sdk.deleted_ids(), ["m2", "m3"]);
        assert!(engine.checked_ids().is_empty());
    })
    .await;
}

#[tokio::test]
async fn open_at_recenters_on_target() {
    local(async {
        let config = WindowConfig { jump_before: 2, jump_after: 2, ..WindowConfig::default() };
        let (mut engine, sdk) = test_engine(config);
        sdk.insert_history(CONVERSATION, history(10));
        let mut signals = engine.subscribe_signals();
        let target = sdk.stored(CONVERSATION)[4].clone();

        engine.open_at(CONVERSATION, ConversationKind::Single, &target).unwrap();
        assert!(engine.snapshot().init_loading);
        engine.settle().await;

        assert_eq!(ids(&engine), ["m3", "m4", "m5", "m6", "m7"]);
        assert_eq!(engine.window.first_item_index, 10_000 - 2);
        assert!(engine.window.has_more_old);
        assert!(engine.window.has_more_new);
        assert_eq!(engine.mode, ViewMode::Search);
        assert_eq!(drain(&mut signals), [RenderSignal::ScrollToIndex { index: 10_000 }]);

        engine.jump_to_latest().unwrap();
        engine.settle().await;
        assert_eq!(engine.mode, ViewMode::History);
        assert_eq!(ids(&engine).last().map(String::as_str), Some("m10"));
        assert!(!engine.window.has_more_new);
    })
    .await;
}

#[tokio::test]
async fn run_engine_applies_commands_until_shutdown() {
    local(async {
        let (mut engine, sdk) = test_engine(paged(20));
        sdk.insert_history(CONVERSATION, history(3));
        let mut snapshots = engine.subscribe();
        let (commands, command_rx) = mpsc::unbounded_channel();

        commands
            .send(EngineCommand::Open {
                conversation_id: CONVERSATION.to_owned(),
                kind: ConversationKind::Single,
            })
            .unwrap();
        commands.send(EngineCommand::Send(MessageContent::text("hi"))).unwrap();

        let watcher = tokio::task::spawn_local(async move {
            let seen = snapshots
                .wait_for(|s| {
                    s.messages.len() == 4
                        && s.messages.iter().all(|m| m.status == MessageStatus::Succeed)
                })
                .await
                .unwrap()
                .clone();
            commands.send(EngineCommand::Shutdown).unwrap();
            seen
        });

        run_engine(&mut engine, command_rx).await;
        let seen = watcher.await.unwrap();

        assert_eq!(seen.messages.len(), 4);
        assert_eq!(seen.messages[3].seq, Some(4));
        assert_eq!(engine.conversation, None);
        assert!(engine.window.is_empty());
    })
    .await;
}

#[tokio::test]
async fn rejected_command_is_reported_not_fatal() {
    local(async {
        let (mut engine, _sdk) = test_engine(paged(20));
        let mut signals = engine.subscribe_signals();
        let (commands, command_rx) = mpsc::unbounded_channel();
        commands.send(EngineCommand::LoadOlder).unwrap();
        commands.send(EngineCommand::Shutdown).unwrap();

        run_engine(&mut engine, command_rx).await;

        assert_eq!(
            drain(&mut signals),
            [RenderSignal::ActionFailed { message: "Open a conversation first.".to_owned() }]
        );
    })
    .await;
}

#[tokio::test]
async fn scenario_replay_produces_final_window() {
    let raw = r#"{
        "conversation_id": "c1",
        "kind": "single",
        "self_user": { "user_id": "me", "nickname": "Me" },
        "history": [
            { "client_msg_id": "M0", "seq": 9, "status": "succeed", "send_time": -600000,
              "sender_id": "peer", "content": { "type": "text", "text": "old" } },
            { "client_msg_id": "M1", "seq": 10, "status": "succeed", "send_time": 0,
              "sender_id": "peer", "content": { "type": "text", "text": "one" } },
            { "client_msg_id": "M2", "seq": 11, "status": "succeed", "send_time": 120000,
              "sender_id": "peer", "content": { "type": "text", "text": "two" } }
        ],
        "steps": [
            { "op": "open" },
            { "op": "incoming", "message": { "client_msg_id": "M3", "status": "succeed",
              "send_time": 200000, "sender_id": "peer", "content": { "type": "text", "text": "three" } } },
            { "op": "load_older" },
            { "op": "fail_next_send", "code": 1302, "message": "muted" },
            { "op": "send", "text": "hello" },
            { "op": "resend" }
        ]
    }"#;
    let scenario: Scenario = serde_json::from_str(raw).unwrap();
    let config = WindowConfig { page_size: 2, ..WindowConfig::default() };

    let report = local(run_scenario(scenario, config)).await.unwrap();

    let ids: Vec<_> = report.snapshot.messages.iter().map(|m| m.client_msg_id.as_str()).collect();
    assert_eq!(&ids[..4], ["M0", "M1", "M2", "M3"]);
    assert_eq!(ids.len(), 5);
    let gaps: Vec<_> = report.snapshot.messages.iter().map(|m| m.gap_time).collect();
    assert_eq!(&gaps[..4], [true, true, false, false]);
    assert!(!report.snapshot.has_more_old);
    let resent = &report.snapshot.messages[4];
    assert_eq!(resent.status, MessageStatus::Succeed);
    assert_eq!(resent.seq, Some(13));
    assert!(
        report
            .signals
            .iter()
            .any(|signal| matches!(signal, RenderSignal::SendFailed { code: 1302, .. }))
    );
    assert_eq!(report.mode, ViewMode::History);
}
