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

use crate::sdk::MessageStatus;

/// Caller misuse of the engine surface. SDK failures never surface here; they
/// are folded into window state and render signals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("no conversation is open")]
    NoActiveConversation,
    #[error("message {0} is not in the window")]
    MessageNotFound(String),
    #[error("message {client_msg_id} cannot be resent while {status:?}")]
    ResendNotAllowed { client_msg_id: String, status: MessageStatus },
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
}

impl EngineError {
    pub const NO_ACTIVE_CONVERSATION_EXIT_CODE: i32 = 20;
    pub const MESSAGE_NOT_FOUND_EXIT_CODE: i32 = 21;
    pub const RESEND_NOT_ALLOWED_EXIT_CODE: i32 = 22;
    pub const INVALID_SCENARIO_EXIT_CODE: i32 = 23;

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoActiveConversation => Self::NO_ACTIVE_CONVERSATION_EXIT_CODE,
            Self::MessageNotFound(_) => Self::MESSAGE_NOT_FOUND_EXIT_CODE,
            Self::ResendNotAllowed { .. } => Self::RESEND_NOT_ALLOWED_EXIT_CODE,
            Self::InvalidScenario(_) => Self::INVALID_SCENARIO_EXIT_CODE,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoActiveConversation => "Open a conversation first.".to_owned(),
            Self::MessageNotFound(id) => format!("Message {id} is not loaded."),
            Self::ResendNotAllowed { .. } => "Only failed messages can be resent.".to_owned(),
            Self::InvalidScenario(reason) => format!("The scenario file is invalid: {reason}"),
        }
    }
}
