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

use super::config::WindowConfig;
use crate::sdk::Message;
use std::collections::HashSet;

/// Total order of the window: send time, then seq. Messages without a seq
/// (still sending) sort after confirmed ones sharing the same send time.
fn order_key(message: &Message) -> (i64, u64) {
    (message.send_time, message.seq.unwrap_or(u64::MAX))
}

/// The ordered, deduplicated message list of the active conversation plus
/// its load-state flags. No I/O.
#[derive(Debug)]
pub struct ConversationWindow {
    messages: Vec<Message>,
    ids: HashSet<String>,
    /// Virtualization offset. Decremented by the number of prepended messages
    /// so the rendered position of existing messages does not move.
    pub first_item_index: i64,
    pub has_more_old: bool,
    pub has_more_new: bool,
    pub init_loading: bool,
    pub loading_older: bool,
    pub loading_newer: bool,
    gap_threshold_ms: i64,
    start_index: i64,
}

impl ConversationWindow {
    #[must_use]
    pub fn new(config: &WindowConfig) -> Self {
        Self {
            messages: Vec::new(),
            ids: HashSet::new(),
            first_item_index: config.start_index,
            has_more_old: true,
            has_more_new: false,
            init_loading: false,
            loading_older: false,
            loading_newer: false,
            gap_threshold_ms: config.gap_threshold_ms,
            start_index: config.start_index,
        }
    }

    /// Drop every message and return the flags to their initial values.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.ids.clear();
        self.first_item_index = self.start_index;
        self.has_more_old = true;
        self.has_more_new = false;
        self.init_loading = false;
        self.loading_older = false;
        self.loading_newer = false;
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn contains(&self, client_msg_id: &str) -> bool {
        self.ids.contains(client_msg_id)
    }

    #[must_use]
    pub fn position(&self, client_msg_id: &str) -> Option<usize> {
        if !self.contains(client_msg_id) {
            return None;
        }
        self.messages.iter().position(|m| m.client_msg_id == client_msg_id)
    }

    #[must_use]
    pub fn get(&self, client_msg_id: &str) -> Option<&Message> {
        self.position(client_msg_id).map(|idx| &self.messages[idx])
    }

    /// Mutable access for in-place merges. Callers must not change the id;
    /// a changed send time or seq needs a [`Self::reposition`] afterwards.
    pub(crate) fn get_mut(&mut self, client_msg_id: &str) -> Option<&mut Message> {
        let idx = self.position(client_msg_id)?;
        self.messages.get_mut(idx)
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Message> {
        self.messages.iter_mut()
    }

    /// Cursor for an older page: the oldest message the server knows about.
    #[must_use]
    pub fn oldest_cursor(&self) -> Option<&str> {
        self.messages.iter().find(|m| m.seq.is_some()).map(|m| m.client_msg_id.as_str())
    }

    /// Cursor for a newer page: the newest message the server knows about.
    #[must_use]
    pub fn newest_cursor(&self) -> Option<&str> {
        self.messages.iter().rev().find(|m| m.seq.is_some()).map(|m| m.client_msg_id.as_str())
    }

    /// Insert one message at its ordered position (the tail, for anything
    /// newer than the window). Returns `None` for a duplicate id.
    pub fn insert(&mut self, message: Message) -> Option<usize> {
        if self.contains(&message.client_msg_id) {
            tracing::debug!(client_msg_id = %message.client_msg_id, "dropping duplicate message");
            return None;
        }
        let key = order_key(&message);
        let idx = self.messages.partition_point(|m| order_key(m) <= key);
        self.ids.insert(message.client_msg_id.clone());
        self.messages.insert(idx, message);
        self.refresh_gap_times();
        Some(idx)
    }

    /// Prepend an older page. Returns how many messages were actually added;
    /// the anchor index moves back by the same amount.
    pub fn prepend_page(&mut self, page: Vec<Message>) -> usize {
        let fresh = self.dedupe(page);
        let added = fresh.len();
        self.messages.splice(0..0, fresh);
        self.first_item_index -= i64::try_from(added).unwrap_or(i64::MAX);
        self.restore_order();
        self.refresh_gap_times();
        added
    }

    /// Append a newer page. Returns how many messages were actually added.
    pub fn append_page(&mut self, page: Vec<Message>) -> usize {
        let fresh = self.dedupe(page);
        let added = fresh.len();
        self.messages.extend(fresh);
        self.restore_order();
        self.refresh_gap_times();
        added
    }

    /// Replace the whole list (context jump).
    pub fn replace_all(&mut self, page: Vec<Message>) {
        self.messages.clear();
        self.ids.clear();
        let fresh = self.dedupe(page);
        self.messages = fresh;
        self.restore_order();
        self.refresh_gap_times();
    }

    pub fn remove(&mut self, client_msg_id: &str) -> Option<Message> {
        let idx = self.position(client_msg_id)?;
        let removed = self.messages.remove(idx);
        self.ids.remove(client_msg_id);
        self.refresh_gap_times();
        Some(removed)
    }

    /// Remove every message matching `pred`. Returns the removed ids.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&Message) -> bool) -> Vec<String> {
        let mut removed = Vec::new();
        self.messages.retain(|m| {
            if pred(m) {
                removed.push(m.client_msg_id.clone());
                false
            } else {
                true
            }
        });
        for id in &removed {
            self.ids.remove(id);
        }
        if !removed.is_empty() {
            self.refresh_gap_times();
        }
        removed
    }

    /// Swap the identity of an entry in place (a confirmed send echoing a
    /// different id). Any other entry already holding `new_id` is dropped.
    pub(crate) fn rename(&mut self, old_id: &str, new_id: &str) -> bool {
        if old_id == new_id || !self.contains(old_id) {
            return self.contains(new_id);
        }
        if self.contains(new_id) {
            tracing::debug!(client_msg_id = new_id, "confirmed id already present; dropping copy");
            self.remove(new_id);
        }
        let Some(entry) = self.get_mut(old_id) else {
            return false;
        };
        new_id.clone_into(&mut entry.client_msg_id);
        self.ids.remove(old_id);
        self.ids.insert(new_id.to_owned());
        true
    }

    /// Move an entry whose send time or seq changed back into order.
    /// Entries that are still in order keep their position. Gap flags are
    /// recomputed either way since the send time may have moved.
    pub(crate) fn reposition(&mut self, client_msg_id: &str) {
        let Some(idx) = self.position(client_msg_id) else {
            return;
        };
        let key = order_key(&self.messages[idx]);
        let after_prev = idx == 0 || order_key(&self.messages[idx - 1]) <= key;
        let before_next =
            idx + 1 >= self.messages.len() || key <= order_key(&self.messages[idx + 1]);
        if !(after_prev && before_next) {
            let entry = self.messages.remove(idx);
            let target = self.messages.partition_point(|m| order_key(m) <= key);
            tracing::debug!(client_msg_id, from = idx, to = target, "repositioned message");
            self.messages.insert(target, entry);
        }
        self.refresh_gap_times();
    }

    /// Recompute the derived separator flags. The first message always starts
    /// a new time group.
    pub fn refresh_gap_times(&mut self) {
        let threshold = self.gap_threshold_ms;
        let mut prev_time: Option<i64> = None;
        for message in &mut self.messages {
            message.gap_time =
                prev_time.is_none_or(|prev| message.send_time.saturating_sub(prev) > threshold);
            prev_time = Some(message.send_time);
        }
    }

    fn dedupe(&mut self, page: Vec<Message>) -> Vec<Message> {
        let mut fresh = Vec::with_capacity(page.len());
        for message in page {
            if self.ids.insert(message.client_msg_id.clone()) {
                fresh.push(message);
            } else {
                tracing::debug!(
                    client_msg_id = %message.client_msg_id,
                    "dropping duplicate message from page"
                );
            }
        }
        fresh
    }

    fn restore_order(&mut self) {
        if !self.messages.is_sorted_by_key(order_key) {
            tracing::debug!("page overlapped window edge; re-sorting");
            self.messages.sort_by_key(order_key);
        }
    }
}
