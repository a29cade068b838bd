use chatwin::sdk::{ConversationKind, ImSdk, MemorySdk, Message, MessageContent};
use chatwin::window::{
    Engine, EngineEvent, EventEnvelope, RenderSignal, SelfProfile, WindowConfig, WindowEvent,
    handle_engine_event,
};
use std::future::Future;
use std::rc::Rc;
use tokio::sync::broadcast;

pub const CONVERSATION: &str = "c1";

/// Build an engine over a fresh `MemorySdk`. The SDK handle is returned so
/// tests can seed history and queue failures.
pub fn test_engine(config: WindowConfig) -> (Engine, Rc<MemorySdk>) {
    let sdk = Rc::new(MemorySdk::new());
    let self_user = SelfProfile {
        user_id: "me".to_owned(),
        nickname: "Me".to_owned(),
        face_url: String::new(),
    };
    let engine_sdk: Rc<dyn ImSdk> = sdk.clone();
    let engine = Engine::new(engine_sdk, self_user, config);
    (engine, sdk)
}

pub fn paged(page_size: usize) -> WindowConfig {
    WindowConfig { page_size, ..WindowConfig::default() }
}

/// A confirmed text message from `peer`.
pub fn msg(id: &str, seq: u64, send_time: i64) -> Message {
    Message::new(id, "peer", MessageContent::text(id), send_time).seq(seq)
}

/// `count` confirmed messages `m1..`, one second apart.
pub fn history(count: u64) -> Vec<Message> {
    (1..=count).map(|i| msg(&format!("m{i}"), i, i64::try_from(i).unwrap() * 1000)).collect()
}

/// Deliver a pushed event for the default conversation.
pub fn push(engine: &mut Engine, event: WindowEvent) {
    push_to(engine, CONVERSATION, event);
}

pub fn push_to(engine: &mut Engine, conversation_id: &str, event: WindowEvent) {
    handle_engine_event(engine, EngineEvent::Incoming(EventEnvelope::new(conversation_id, event)));
}

pub fn ids(engine: &Engine) -> Vec<String> {
    engine.window.messages().iter().map(|m| m.client_msg_id.clone()).collect()
}

pub fn gaps(engine: &Engine) -> Vec<bool> {
    engine.window.messages().iter().map(|m| m.gap_time).collect()
}

/// Open the default conversation and wait for the initial page.
pub async fn open(engine: &mut Engine) {
    engine.open(CONVERSATION, ConversationKind::Single).unwrap();
    engine.settle().await;
}

/// Run `future` on a `LocalSet`, as the engine requires.
pub async fn local<F: Future>(future: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(future).await
}

pub fn drain(signals: &mut broadcast::Receiver<RenderSignal>) -> Vec<RenderSignal> {
    let mut out = Vec::new();
    while let Ok(signal) = signals.try_recv() {
        out.push(signal);
    }
    out
}

/// Every window invariant that must hold after any operation.
pub fn assert_window_invariants(engine: &Engine) {
    let messages = engine.window.messages();
    let mut seen = std::collections::HashSet::new();
    for message in messages {
        assert!(seen.insert(&message.client_msg_id), "duplicate id {}", message.client_msg_id);
    }
    for pair in messages.windows(2) {
        assert!(pair[0].send_time <= pair[1].send_time, "send_time out of order");
        if let (Some(a), Some(b)) = (pair[0].seq, pair[1].seq) {
            assert!(a <= b, "seq out of order");
        }
    }
    if let Some(first) = messages.first() {
        assert!(first.gap_time, "first message must start a time group");
    }
}
