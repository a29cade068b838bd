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

use super::types::{HistoryPage, Message};

/// Typed rejection of a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sdk error {code}: {message}")]
pub struct SdkError {
    pub code: i32,
    pub message: String,
}

impl SdkError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// The IM SDK this engine sits on. Transport, persistence and wire encoding
/// all live behind this trait.
///
/// Every call is a suspension point. The engine is single-threaded, so
/// implementations are `?Send` and are held behind an `Rc`.
#[async_trait::async_trait(?Send)]
pub trait ImSdk {
    /// Page strictly older than `cursor` (the oldest loaded message), or the
    /// newest page when `cursor` is `None`. Returned ascending.
    async fn fetch_older(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> Result<HistoryPage, SdkError>;

    /// Page strictly newer than `cursor`. Returned ascending.
    async fn fetch_newer(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> Result<HistoryPage, SdkError>;

    /// Up to `before` messages preceding `target`, the target itself, and up to
    /// `after` messages following it.
    async fn fetch_context(
        &self,
        conversation_id: &str,
        target: &Message,
        before: usize,
        after: usize,
    ) -> Result<Vec<Message>, SdkError>;

    /// Send and return the server-confirmed message.
    async fn send(&self, conversation_id: &str, message: Message) -> Result<Message, SdkError>;

    async fn mark_read(&self, conversation_id: &str, client_msg_ids: &[String])
    -> Result<(), SdkError>;

    async fn mark_group_read(
        &self,
        conversation_id: &str,
        client_msg_ids: &[String],
    ) -> Result<(), SdkError>;

    async fn delete_messages(
        &self,
        conversation_id: &str,
        client_msg_ids: &[String],
        sync: bool,
    ) -> Result<(), SdkError>;

    async fn revoke(&self, conversation_id: &str, client_msg_id: &str) -> Result<(), SdkError>;
}
