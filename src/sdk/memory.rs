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

//! In-memory SDK collaborator.
//!
//! Keeps one seq-ordered message log per conversation and answers paging,
//! context, send and acknowledgement calls against it. Failures and latency
//! can be queued per call kind, which is how the replay tool and the tests
//! reproduce races without a server.

use super::client::{ImSdk, SdkError};
use super::types::{HistoryPage, Message, MessageStatus};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

pub const RECORD_NOT_FOUND: i32 = 1004;

/// One outbound read acknowledgement, as recorded by [`MemorySdk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadAck {
    pub conversation_id: String,
    pub client_msg_ids: Vec<String>,
    pub group: bool,
}

#[derive(Default)]
struct MemoryState {
    conversations: HashMap<String, Vec<Message>>,
    send_failures: VecDeque<SdkError>,
    fetch_failures: VecDeque<SdkError>,
    fetch_delays: VecDeque<Duration>,
    send_delays: VecDeque<Duration>,
    read_acks: Vec<ReadAck>,
    deleted: Vec<String>,
}

#[derive(Default)]
pub struct MemorySdk {
    state: RefCell<MemoryState>,
}

impl MemorySdk {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation log. Messages are kept ordered by `(seq, send_time)`.
    pub fn insert_history(&self, conversation_id: &str, messages: Vec<Message>) {
        let mut state = self.state.borrow_mut();
        let log = state.conversations.entry(conversation_id.to_owned()).or_default();
        log.extend(messages);
        log.sort_by_key(|m| (m.seq.unwrap_or(u64::MAX), m.send_time));
    }

    /// Store a message from another participant and return it as the server
    /// would push it: next seq, `Succeed`.
    pub fn deliver(&self, conversation_id: &str, mut message: Message) -> Message {
        let mut state = self.state.borrow_mut();
        let log = state.conversations.entry(conversation_id.to_owned()).or_default();
        confirm(log, &mut message);
        log.push(message.clone());
        message
    }

    pub fn fail_next_send(&self, code: i32, message: impl Into<String>) {
        self.state.borrow_mut().send_failures.push_back(SdkError::new(code, message));
    }

    pub fn fail_next_fetch(&self, code: i32, message: impl Into<String>) {
        self.state.borrow_mut().fetch_failures.push_back(SdkError::new(code, message));
    }

    pub fn delay_next_fetch(&self, delay: Duration) {
        self.state.borrow_mut().fetch_delays.push_back(delay);
    }

    pub fn delay_next_send(&self, delay: Duration) {
        self.state.borrow_mut().send_delays.push_back(delay);
    }

    #[must_use]
    pub fn read_acks(&self) -> Vec<ReadAck> {
        self.state.borrow().read_acks.clone()
    }

    #[must_use]
    pub fn deleted_ids(&self) -> Vec<String> {
        self.state.borrow().deleted.clone()
    }

    #[must_use]
    pub fn stored(&self, conversation_id: &str) -> Vec<Message> {
        self.state.borrow().conversations.get(conversation_id).cloned().unwrap_or_default()
    }

    /// Apply queued latency and failure for a fetch. The borrow is released
    /// before sleeping.
    async fn fetch_gate(&self) -> Result<(), SdkError> {
        let (delay, failure) = {
            let mut state = self.state.borrow_mut();
            (state.fetch_delays.pop_front(), state.fetch_failures.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        failure.map_or(Ok(()), Err)
    }

    fn position(&self, conversation_id: &str, client_msg_id: &str) -> Result<usize, SdkError> {
        self.state
            .borrow()
            .conversations
            .get(conversation_id)
            .and_then(|log| log.iter().position(|m| m.client_msg_id == client_msg_id))
            .ok_or_else(|| not_found(client_msg_id))
    }

    fn slice(&self, conversation_id: &str, start: usize, end: usize) -> Vec<Message> {
        self.state
            .borrow()
            .conversations
            .get(conversation_id)
            .map(|log| log[start.min(log.len())..end.min(log.len())].to_vec())
            .unwrap_or_default()
    }

    fn len(&self, conversation_id: &str) -> usize {
        self.state.borrow().conversations.get(conversation_id).map_or(0, Vec::len)
    }
}

fn not_found(client_msg_id: &str) -> SdkError {
    SdkError::new(RECORD_NOT_FOUND, format!("message {client_msg_id} not found"))
}

/// Stamp a message as server-accepted at the end of `log`.
fn confirm(log: &[Message], message: &mut Message) {
    let last_seq = log.iter().filter_map(|m| m.seq).max().unwrap_or(0);
    let last_time = log.last().map_or(message.send_time, |m| m.send_time);
    message.seq = Some(last_seq + 1);
    message.send_time = message.send_time.max(last_time);
    message.status = MessageStatus::Succeed;
    message.err_code = None;
    message.show_spinner = false;
}

#[async_trait::async_trait(?Send)]
impl ImSdk for MemorySdk {
    async fn fetch_older(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> Result<HistoryPage, SdkError> {
        self.fetch_gate().await?;
        let end = match cursor {
            Some(id) => self.position(conversation_id, id)?,
            None => self.len(conversation_id),
        };
        let start = end.saturating_sub(count);
        Ok(HistoryPage { messages: self.slice(conversation_id, start, end), is_end: start == 0 })
    }

    async fn fetch_newer(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> Result<HistoryPage, SdkError> {
        self.fetch_gate().await?;
        let start = match cursor {
            Some(id) => self.position(conversation_id, id)? + 1,
            None => 0,
        };
        let len = self.len(conversation_id);
        let end = start.saturating_add(count).min(len);
        Ok(HistoryPage { messages: self.slice(conversation_id, start, end), is_end: end == len })
    }

    async fn fetch_context(
        &self,
        conversation_id: &str,
        target: &Message,
        before: usize,
        after: usize,
    ) -> Result<Vec<Message>, SdkError> {
        self.fetch_gate().await?;
        let idx = self.position(conversation_id, &target.client_msg_id)?;
        let start = idx.saturating_sub(before);
        let end = idx.saturating_add(after).saturating_add(1);
        Ok(self.slice(conversation_id, start, end))
    }

    async fn send(&self, conversation_id: &str, mut message: Message) -> Result<Message, SdkError> {
        let delay = self.state.borrow_mut().send_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.borrow_mut();
        if let Some(err) = state.send_failures.pop_front() {
            return Err(err);
        }
        let log = state.conversations.entry(conversation_id.to_owned()).or_default();
        confirm(log, &mut message);
        log.push(message.clone());
        Ok(message)
    }

    async fn mark_read(
        &self,
        conversation_id: &str,
        client_msg_ids: &[String],
    ) -> Result<(), SdkError> {
        self.record_read(conversation_id, client_msg_ids, false);
        Ok(())
    }

    async fn mark_group_read(
        &self,
        conversation_id: &str,
        client_msg_ids: &[String],
    ) -> Result<(), SdkError> {
        self.record_read(conversation_id, client_msg_ids, true);
        Ok(())
    }

    async fn delete_messages(
        &self,
        conversation_id: &str,
        client_msg_ids: &[String],
        _sync: bool,
    ) -> Result<(), SdkError> {
        let mut state = self.state.borrow_mut();
        if let Some(log) = state.conversations.get_mut(conversation_id) {
            log.retain(|m| !client_msg_ids.contains(&m.client_msg_id));
        }
        state.deleted.extend(client_msg_ids.iter().cloned());
        Ok(())
    }

    async fn revoke(&self, conversation_id: &str, client_msg_id: &str) -> Result<(), SdkError> {
        let mut state = self.state.borrow_mut();
        let message = state
            .conversations
            .get_mut(conversation_id)
            .and_then(|log| log.iter_mut().find(|m| m.client_msg_id == client_msg_id))
            .ok_or_else(|| not_found(client_msg_id))?;
        message.revoke(None);
        Ok(())
    }
}

impl MemorySdk {
    fn record_read(&self, conversation_id: &str, client_msg_ids: &[String], group: bool) {
        let mut state = self.state.borrow_mut();
        if let Some(log) = state.conversations.get_mut(conversation_id) {
            for message in log.iter_mut().filter(|m| client_msg_ids.contains(&m.client_msg_id)) {
                message.is_read = true;
            }
        }
        state.read_acks.push(ReadAck {
            conversation_id: conversation_id.to_owned(),
            client_msg_ids: client_msg_ids.to_vec(),
            group,
        });
    }
}
