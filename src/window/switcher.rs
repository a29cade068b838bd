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

//! Explicit open/close lifecycle of the active conversation.

use super::state::{ActiveConversation, Engine, ViewMode};
use crate::error::EngineError;
use crate::sdk::{ConversationKind, Message};

impl Engine {
    /// Make `conversation_id` the active conversation and load its newest page.
    pub fn open(&mut self, conversation_id: &str, kind: ConversationKind) -> Result<(), EngineError> {
        self.switch_to(conversation_id, kind);
        self.load_older()
    }

    /// Like [`Self::open`], but start from the context around `target`.
    pub fn open_at(
        &mut self,
        conversation_id: &str,
        kind: ConversationKind,
        target: &Message,
    ) -> Result<(), EngineError> {
        self.switch_to(conversation_id, kind);
        self.jump_to(target)
    }

    /// Leave the active conversation. Outstanding results are dropped when
    /// they arrive.
    pub fn close(&mut self) {
        if let Some(active) = self.conversation.take() {
            tracing::info!(conversation_id = %active.id, "closing conversation");
        }
        self.teardown();
        self.publish();
    }

    fn switch_to(&mut self, conversation_id: &str, kind: ConversationKind) {
        tracing::info!(conversation_id, ?kind, "opening conversation");
        self.teardown();
        self.conversation = Some(ActiveConversation { id: conversation_id.to_owned(), kind });
        self.window.init_loading = true;
    }

    fn teardown(&mut self) {
        self.epochs.next_conversation();
        self.cancel_spinners();
        self.window.reset();
        self.pending_append_ids.clear();
        self.mode = ViewMode::History;
        self.at_bottom = true;
    }
}
