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

//! Optimistic sends and their reconciliation.

use super::applier;
use super::events::{EngineEvent, RenderSignal};
use super::state::Engine;
use crate::error::EngineError;
use crate::sdk::{Message, MessageContent, MessageStatus, SdkError};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

impl Engine {
    /// Insert `content` as a `Sending` message at the tail and send it.
    /// Returns the local client id of the new entry.
    ///
    /// Sends target the live tail even while a search context is shown.
    pub fn send(&mut self, content: MessageContent) -> Result<String, EngineError> {
        let conversation_id = self.active()?.id.clone();
        let message = self.compose(content);
        let client_msg_id = message.client_msg_id.clone();
        self.insert_outgoing(message.clone());
        self.start_send(conversation_id, message);
        self.publish();
        Ok(client_msg_id)
    }

    /// Retry a failed send. The failed entry is removed and the content goes
    /// out again under a fresh id at the tail.
    ///
    /// Only `Failed` entries can be resent. Once an entry has been resent its
    /// id is gone, so a second resend of the same id is rejected rather than
    /// stacking another attempt.
    pub fn resend(&mut self, client_msg_id: &str) -> Result<String, EngineError> {
        let conversation_id = self.active()?.id.clone();
        let failed = self
            .window
            .get(client_msg_id)
            .ok_or_else(|| EngineError::MessageNotFound(client_msg_id.to_owned()))?;
        if failed.status != MessageStatus::Failed {
            return Err(EngineError::ResendNotAllowed {
                client_msg_id: client_msg_id.to_owned(),
                status: failed.status,
            });
        }
        let content = failed.content.clone();
        applier::delete_by_id(self, client_msg_id);

        let message = self.compose(content);
        let new_id = message.client_msg_id.clone();
        tracing::info!(old = client_msg_id, new = %new_id, "resending message");
        self.insert_outgoing(message.clone());
        self.start_send(conversation_id, message);
        self.publish();
        Ok(new_id)
    }

    fn compose(&self, content: MessageContent) -> Message {
        let mut message =
            Message::new(new_client_msg_id(), self.self_user.user_id.clone(), content, now_ms())
                .status(MessageStatus::Sending)
                .nickname(self.self_user.nickname.clone());
        self.self_user.face_url.clone_into(&mut message.sender_face_url);
        message
    }

    fn insert_outgoing(&mut self, message: Message) {
        if self.window.insert(message).is_some() {
            self.emit(RenderSignal::FollowTail);
        }
    }

    fn start_send(&mut self, conversation_id: String, message: Message) {
        let conversation = self.epochs.conversation();
        let local_id = message.client_msg_id.clone();
        self.arm_spinner(conversation, local_id.clone());
        let sdk = Rc::clone(&self.sdk);
        self.spawn_request(async move {
            let result = sdk.send(&conversation_id, message).await;
            EngineEvent::SendResolved { conversation, local_id, result }
        });
    }

    /// Sends resolving within the delay never show a spinner.
    fn arm_spinner(&mut self, conversation: u64, client_msg_id: String) {
        let token = CancellationToken::new();
        if let Some(previous) = self.spinners.insert(client_msg_id.clone(), token.clone()) {
            previous.cancel();
        }
        let delay = self.config.spinner_delay();
        let event_tx = self.event_tx.clone();
        tokio::task::spawn_local(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = event_tx.send(EngineEvent::SpinnerDue { conversation, client_msg_id });
                }
            }
        });
    }
}

pub fn apply_send_result(
    engine: &mut Engine,
    conversation: u64,
    local_id: &str,
    result: Result<Message, SdkError>,
) {
    if let Some(token) = engine.spinners.remove(local_id) {
        token.cancel();
    }
    if conversation != engine.epochs.conversation() {
        tracing::debug!(local_id, "send resolved after conversation switch");
        return;
    }

    match result {
        Ok(confirmed) => confirm_send(engine, local_id, confirmed),
        Err(err) => {
            tracing::error!(local_id, code = err.code, "send failed: {}", err.message);
            if let Some(entry) = engine.window.get_mut(local_id) {
                if entry.status.can_transition_to(MessageStatus::Failed) {
                    entry.status = MessageStatus::Failed;
                    entry.err_code = Some(err.code);
                }
                entry.show_spinner = false;
            }
            engine.emit(RenderSignal::SendFailed {
                client_msg_id: local_id.to_owned(),
                code: err.code,
            });
        }
    }
}

/// Merge the server copy into the optimistic entry in place.
fn confirm_send(engine: &mut Engine, local_id: &str, confirmed: Message) {
    let client_msg_id = confirmed.client_msg_id.clone();
    if !engine.window.rename(local_id, &client_msg_id) {
        tracing::debug!(local_id, "confirmed message is no longer in the window");
        return;
    }
    let Some(entry) = engine.window.get_mut(&client_msg_id) else {
        return;
    };
    entry.seq = confirmed.seq;
    if entry.status != MessageStatus::Revoked {
        entry.status = MessageStatus::Succeed;
        entry.send_time = confirmed.send_time;
        entry.content = confirmed.content;
    }
    entry.err_code = None;
    entry.show_spinner = false;
    let seq = entry.seq;
    engine.window.reposition(&client_msg_id);
    tracing::info!(%client_msg_id, ?seq, "send confirmed");
}

pub fn reveal_spinner(engine: &mut Engine, conversation: u64, client_msg_id: &str) {
    engine.spinners.remove(client_msg_id);
    if conversation != engine.epochs.conversation() {
        return;
    }
    if let Some(entry) = engine.window.get_mut(client_msg_id)
        && entry.status == MessageStatus::Sending
    {
        entry.show_spinner = true;
    }
}

fn new_client_msg_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
