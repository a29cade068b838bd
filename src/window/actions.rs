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

//! User-initiated delete, revoke and multi-select.

use super::applier;
use super::events::{EngineEvent, RenderSignal};
use super::state::Engine;
use crate::error::EngineError;
use crate::sdk::{MessageContent, MessagePatch, SdkError};
use std::rc::Rc;

impl Engine {
    /// Delete through the SDK, then drop the entries locally.
    pub fn delete(&mut self, client_msg_ids: Vec<String>, sync: bool) -> Result<(), EngineError> {
        let conversation_id = self.active()?.id.clone();
        let conversation = self.epochs.conversation();
        let sdk = Rc::clone(&self.sdk);
        self.spawn_request(async move {
            let result = sdk.delete_messages(&conversation_id, &client_msg_ids, sync).await;
            EngineEvent::DeleteFinished { conversation, client_msg_ids, result }
        });
        Ok(())
    }

    /// Revoke through the SDK, then rewrite the entry and its quotes.
    pub fn revoke(&mut self, client_msg_id: &str) -> Result<(), EngineError> {
        let conversation_id = self.active()?.id.clone();
        if !self.window.contains(client_msg_id) {
            return Err(EngineError::MessageNotFound(client_msg_id.to_owned()));
        }
        let conversation = self.epochs.conversation();
        let client_msg_id = client_msg_id.to_owned();
        let sdk = Rc::clone(&self.sdk);
        self.spawn_request(async move {
            let result = sdk.revoke(&conversation_id, &client_msg_id).await;
            EngineEvent::RevokeFinished { conversation, client_msg_id, result }
        });
        Ok(())
    }

    /// Flip the multi-select mark. Returns the new state.
    pub fn toggle_checked(&mut self, client_msg_id: &str) -> Result<bool, EngineError> {
        let entry = self
            .window
            .get_mut(client_msg_id)
            .ok_or_else(|| EngineError::MessageNotFound(client_msg_id.to_owned()))?;
        entry.checked = !entry.checked;
        let checked = entry.checked;
        self.publish();
        Ok(checked)
    }

    pub fn clear_checked(&mut self) {
        for message in self.window.iter_mut() {
            message.checked = false;
        }
        self.publish();
    }

    #[must_use]
    pub fn checked_ids(&self) -> Vec<String> {
        self.window
            .messages()
            .iter()
            .filter(|m| m.checked)
            .map(|m| m.client_msg_id.clone())
            .collect()
    }
}

pub fn apply_delete_result(
    engine: &mut Engine,
    conversation: u64,
    client_msg_ids: &[String],
    result: Result<(), SdkError>,
) {
    if conversation != engine.epochs.conversation() {
        return;
    }
    match result {
        Ok(()) => {
            for id in client_msg_ids {
                applier::delete_by_id(engine, id);
            }
            tracing::info!(count = client_msg_ids.len(), "messages deleted");
        }
        Err(err) => {
            tracing::error!(?client_msg_ids, "delete failed: {err}");
            engine.emit(RenderSignal::ActionFailed { message: err.to_string() });
        }
    }
}

pub fn apply_revoke_result(
    engine: &mut Engine,
    conversation: u64,
    client_msg_id: &str,
    result: Result<(), SdkError>,
) {
    if conversation != engine.epochs.conversation() {
        return;
    }
    match result {
        Ok(()) => {
            let revoker_id = Some(engine.self_user.user_id.clone());
            let patch = MessagePatch::new().content(MessageContent::Revoked { revoker_id });
            applier::update_message(&mut engine.window, client_msg_id, patch);
            tracing::info!(client_msg_id, "message revoked");
        }
        Err(err) => {
            tracing::error!(client_msg_id, "revoke failed: {err}");
            engine.emit(RenderSignal::ActionFailed { message: err.to_string() });
        }
    }
}
