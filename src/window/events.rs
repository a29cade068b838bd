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

use super::epoch::{Direction, RequestTicket};
use super::state::Engine;
use super::{actions, applier, history, read_state, send};
use crate::sdk::{HistoryPage, Message, MessagePatch, ReadCounts, SdkError};
use serde::{Deserialize, Serialize};

/// Mutation events pushed by the SDK for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WindowEvent {
    /// A new message arrived.
    PushNew { message: Message },
    /// Partial update of one message (status, read flag, edit, revoke).
    Update { client_msg_id: String, patch: MessagePatch },
    DeleteById { client_msg_id: String },
    /// Remove everything a user sent (e.g. after they were removed).
    DeleteBySender { sender_id: String },
    /// Remove `old_client_msg_id` and place `message` at the tail.
    DeleteAndReplace { old_client_msg_id: String, message: Message },
    /// Conversation history was cleared.
    Clear,
    ProfileUpdate {
        sender_id: String,
        #[serde(default)]
        nickname: Option<String>,
        #[serde(default)]
        face_url: Option<String>,
    },
    /// Single chat: the peer read these messages.
    SingleReceipt { client_msg_ids: Vec<String> },
    /// Group chat: new read counters for one message.
    GroupReceipt {
        client_msg_id: String,
        counts: ReadCounts,
        #[serde(default)]
        reader_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub conversation_id: String,
    #[serde(flatten)]
    pub event: WindowEvent,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, event: WindowEvent) -> Self {
        Self { conversation_id: conversation_id.into(), event }
    }
}

/// Everything that re-enters the engine: pushed events and the results of
/// spawned collaborator calls.
#[derive(Debug)]
pub enum EngineEvent {
    Incoming(EventEnvelope),
    PageLoaded {
        ticket: RequestTicket,
        result: Result<HistoryPage, SdkError>,
    },
    ContextLoaded {
        ticket: RequestTicket,
        target_id: String,
        before: usize,
        after: usize,
        result: Result<Vec<Message>, SdkError>,
    },
    SendResolved {
        conversation: u64,
        local_id: String,
        result: Result<Message, SdkError>,
    },
    /// The spinner delay elapsed for a send that may still be pending.
    SpinnerDue {
        conversation: u64,
        client_msg_id: String,
    },
    ReadAcked {
        client_msg_ids: Vec<String>,
        result: Result<(), SdkError>,
    },
    DeleteFinished {
        conversation: u64,
        client_msg_ids: Vec<String>,
        result: Result<(), SdkError>,
    },
    RevokeFinished {
        conversation: u64,
        client_msg_id: String,
        result: Result<(), SdkError>,
    },
}

impl EngineEvent {
    /// Results of spawned requests, as opposed to pushes and timers.
    fn completes_request(&self) -> bool {
        !matches!(self, Self::Incoming(_) | Self::SpinnerDue { .. })
    }
}

/// Signals for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum RenderSignal {
    /// Messages arrived while the viewport was away from the newest edge.
    NewMessagesBelow { count: usize },
    /// The newest edge changed and the viewport is anchored to it.
    FollowTail,
    /// Scroll so the item at this virtual index is in view.
    ScrollToIndex { index: i64 },
    LoadFailed { direction: Direction, message: String },
    SendFailed { client_msg_id: String, code: i32 },
    ActionFailed { message: String },
}

pub fn handle_engine_event(engine: &mut Engine, event: EngineEvent) {
    if event.completes_request() {
        engine.in_flight = engine.in_flight.saturating_sub(1);
    }
    match event {
        EngineEvent::Incoming(envelope) => applier::apply_incoming(engine, envelope),
        EngineEvent::PageLoaded { ticket, result } => history::apply_page(engine, ticket, result),
        EngineEvent::ContextLoaded { ticket, target_id, before, after, result } => {
            history::apply_context(engine, ticket, &target_id, (before, after), result);
        }
        EngineEvent::SendResolved { conversation, local_id, result } => {
            send::apply_send_result(engine, conversation, &local_id, result);
        }
        EngineEvent::SpinnerDue { conversation, client_msg_id } => {
            send::reveal_spinner(engine, conversation, &client_msg_id);
        }
        EngineEvent::ReadAcked { client_msg_ids, result } => {
            read_state::apply_read_ack(&client_msg_ids, result);
        }
        EngineEvent::DeleteFinished { conversation, client_msg_ids, result } => {
            actions::apply_delete_result(engine, conversation, &client_msg_ids, result);
        }
        EngineEvent::RevokeFinished { conversation, client_msg_id, result } => {
            actions::apply_revoke_result(engine, conversation, &client_msg_id, result);
        }
    }
    engine.publish();
}
