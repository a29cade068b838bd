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

//! Read-state reconciliation: optimistic local `is_read` plus an outbound
//! acknowledgment that is never rolled back.

use super::events::EngineEvent;
use super::state::Engine;
use crate::error::EngineError;
use crate::sdk::{ConversationKind, SdkError};
use std::rc::Rc;

impl Engine {
    /// The rendering layer reports these ids as rendered in the viewport.
    ///
    /// A message is acknowledged once: it must come from someone else, carry
    /// a seq and not be read yet.
    pub fn mark_visible(&mut self, client_msg_ids: &[String]) -> Result<(), EngineError> {
        let active = self.active()?.clone();
        let mut newly_read = Vec::new();
        for id in client_msg_ids {
            if let Some(entry) = self.window.get_mut(id)
                && entry.sender_id != self.self_user.user_id
                && entry.seq.is_some()
                && !entry.is_read
            {
                entry.is_read = true;
                newly_read.push(id.clone());
            }
        }
        if newly_read.is_empty() {
            return Ok(());
        }

        tracing::debug!(conversation_id = %active.id, count = newly_read.len(), "marking read");
        let sdk = Rc::clone(&self.sdk);
        self.spawn_request(async move {
            let result = match active.kind {
                ConversationKind::Single => sdk.mark_read(&active.id, &newly_read).await,
                ConversationKind::Group => sdk.mark_group_read(&active.id, &newly_read).await,
            };
            EngineEvent::ReadAcked { client_msg_ids: newly_read, result }
        });
        self.publish();
        Ok(())
    }
}

pub fn apply_read_ack(client_msg_ids: &[String], result: Result<(), SdkError>) {
    match result {
        Ok(()) => tracing::debug!(count = client_msg_ids.len(), "read acknowledged"),
        Err(err) => tracing::warn!(
            ?client_msg_ids,
            code = err.code,
            "read acknowledgment failed, keeping local read state: {}",
            err.message
        ),
    }
}
