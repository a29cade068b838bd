// chatwin — Conversation message window engine for chat clients
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Scripted replay of a conversation against the in-memory SDK.
//!
//! A scenario seeds server-side history, then runs steps one at a time. Each
//! step is settled (every request it spawned has re-entered) before the next
//! one starts, so the outcome is deterministic.

use crate::error::EngineError;
use crate::sdk::{ConversationKind, ImSdk, MemorySdk, Message, MessageContent, MessageStatus};
use crate::window::{
    Engine, EngineEvent, EventEnvelope, RenderSignal, SelfProfile, ViewMode, WindowConfig,
    WindowEvent, WindowSnapshot, handle_engine_event,
};
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::rc::Rc;
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub conversation_id: String,
    #[serde(default = "default_kind")]
    pub kind: ConversationKind,
    pub self_user: SelfProfile,
    /// Server-side history, oldest first.
    #[serde(default)]
    pub history: Vec<Message>,
    pub steps: Vec<Step>,
}

fn default_kind() -> ConversationKind {
    ConversationKind::Single
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Open {
        #[serde(default)]
        jump_to: Option<String>,
    },
    Close,
    LoadOlder,
    LoadNewer,
    JumpTo {
        client_msg_id: String,
    },
    JumpToLatest,
    /// A message from someone else reaches the server and is pushed.
    Incoming {
        message: Message,
    },
    /// A raw pushed event.
    Event(EventStep),
    Send {
        text: String,
    },
    FailNextSend {
        code: i32,
        #[serde(default)]
        message: String,
    },
    FailNextFetch {
        code: i32,
        #[serde(default)]
        message: String,
    },
    /// Resend `client_msg_id`, or the newest failed message when omitted.
    Resend {
        #[serde(default)]
        client_msg_id: Option<String>,
    },
    MarkVisible {
        client_msg_ids: Vec<String>,
    },
    SetAtBottom {
        at_bottom: bool,
    },
    Delete {
        client_msg_ids: Vec<String>,
        #[serde(default)]
        sync: bool,
    },
    Revoke {
        client_msg_id: String,
    },
    ToggleChecked {
        client_msg_id: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventStep {
    /// Defaults to the scenario's conversation.
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(flatten)]
    pub event: WindowEvent,
}

/// Final state after a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub mode: ViewMode,
    pub pending_append_ids: Vec<String>,
    pub signals: Vec<RenderSignal>,
    #[serde(flatten)]
    pub snapshot: WindowSnapshot,
}

pub fn load_scenario(path: &Path) -> anyhow::Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .map_err(|err| EngineError::InvalidScenario(err.to_string()))
        .with_context(|| format!("failed to parse scenario {}", path.display()))?;
    validate(&scenario)?;
    Ok(scenario)
}

fn validate(scenario: &Scenario) -> Result<(), EngineError> {
    if scenario.conversation_id.is_empty() {
        return Err(EngineError::InvalidScenario("conversation_id is empty".to_owned()));
    }
    if scenario.self_user.user_id.is_empty() {
        return Err(EngineError::InvalidScenario("self_user.user_id is empty".to_owned()));
    }
    Ok(())
}

/// Run a scenario to completion. Must run inside a `LocalSet`.
pub async fn run_scenario(scenario: Scenario, config: WindowConfig) -> anyhow::Result<ReplayReport> {
    validate(&scenario)?;
    let Scenario { conversation_id, kind, self_user, history, steps } = scenario;

    let sdk = Rc::new(MemorySdk::new());
    sdk.insert_history(&conversation_id, history);
    let engine_sdk: Rc<dyn ImSdk> = sdk.clone();
    let mut engine = Engine::new(engine_sdk, self_user, config);
    let mut replay = Replay { sdk, conversation_id, kind, signals: engine.subscribe_signals() };
    let mut collected = Vec::new();

    for (index, step) in steps.into_iter().enumerate() {
        tracing::debug!(index, ?step, "replay step");
        replay
            .apply(&mut engine, step)
            .with_context(|| format!("scenario step {index} failed"))?;
        engine.settle().await;
        replay.drain_signals(&mut collected);
    }

    let mut pending_append_ids: Vec<_> = engine.pending_append_ids.iter().cloned().collect();
    pending_append_ids.sort();
    Ok(ReplayReport {
        mode: engine.mode,
        pending_append_ids,
        signals: collected,
        snapshot: engine.snapshot(),
    })
}

struct Replay {
    sdk: Rc<MemorySdk>,
    conversation_id: String,
    kind: ConversationKind,
    signals: tokio::sync::broadcast::Receiver<RenderSignal>,
}

impl Replay {
    fn apply(&self, engine: &mut Engine, step: Step) -> Result<(), EngineError> {
        match step {
            Step::Open { jump_to: None } => engine.open(&self.conversation_id, self.kind),
            Step::Open { jump_to: Some(id) } => {
                let target = self.stored(&id)?;
                engine.open_at(&self.conversation_id, self.kind, &target)
            }
            Step::Close => {
                engine.close();
                Ok(())
            }
            Step::LoadOlder => engine.load_older(),
            Step::LoadNewer => engine.load_newer(),
            Step::JumpTo { client_msg_id } => {
                let target = match engine.window.get(&client_msg_id) {
                    Some(loaded) => loaded.clone(),
                    None => self.stored(&client_msg_id)?,
                };
                engine.jump_to(&target)
            }
            Step::JumpToLatest => engine.jump_to_latest(),
            Step::Incoming { message } => {
                let message = self.sdk.deliver(&self.conversation_id, message);
                let event = WindowEvent::PushNew { message };
                push(engine, EventEnvelope::new(self.conversation_id.clone(), event));
                Ok(())
            }
            Step::Event(EventStep { conversation_id, event }) => {
                let conversation_id = conversation_id.unwrap_or_else(|| self.conversation_id.clone());
                push(engine, EventEnvelope::new(conversation_id, event));
                Ok(())
            }
            Step::Send { text } => engine.send(MessageContent::text(text)).map(drop),
            Step::FailNextSend { code, message } => {
                self.sdk.fail_next_send(code, message);
                Ok(())
            }
            Step::FailNextFetch { code, message } => {
                self.sdk.fail_next_fetch(code, message);
                Ok(())
            }
            Step::Resend { client_msg_id } => {
                let client_msg_id = match client_msg_id {
                    Some(id) => id,
                    None => last_failed(engine)?,
                };
                engine.resend(&client_msg_id).map(drop)
            }
            Step::MarkVisible { client_msg_ids } => engine.mark_visible(&client_msg_ids),
            Step::SetAtBottom { at_bottom } => {
                engine.set_at_bottom(at_bottom);
                Ok(())
            }
            Step::Delete { client_msg_ids, sync } => engine.delete(client_msg_ids, sync),
            Step::Revoke { client_msg_id } => engine.revoke(&client_msg_id),
            Step::ToggleChecked { client_msg_id } => engine.toggle_checked(&client_msg_id).map(drop),
        }
    }

    fn stored(&self, client_msg_id: &str) -> Result<Message, EngineError> {
        self.sdk
            .stored(&self.conversation_id)
            .into_iter()
            .find(|m| m.client_msg_id == client_msg_id)
            .ok_or_else(|| EngineError::MessageNotFound(client_msg_id.to_owned()))
    }

    fn drain_signals(&mut self, into: &mut Vec<RenderSignal>) {
        loop {
            match self.signals.try_recv() {
                Ok(signal) => into.push(signal),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "render signals dropped during replay");
                }
                Err(_) => break,
            }
        }
    }
}

/// Pushes take the same path as events from the SDK listener.
fn push(engine: &mut Engine, envelope: EventEnvelope) {
    handle_engine_event(engine, EngineEvent::Incoming(envelope));
}

fn last_failed(engine: &Engine) -> Result<String, EngineError> {
    engine
        .window
        .messages()
        .iter()
        .rev()
        .find(|m| m.status == MessageStatus::Failed)
        .map(|m| m.client_msg_id.clone())
        .ok_or_else(|| EngineError::InvalidScenario("no failed message to resend".to_owned()))
}
