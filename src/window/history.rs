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

//! Older/newer paging and jump-to-context loads.
//!
//! A load is split in two halves. `begin_*` runs synchronously on the engine,
//! issues a [`RequestTicket`] and describes the fetch. `apply_*` runs when the
//! result re-enters, and applies it only if the ticket is still current.

use super::epoch::{Direction, RequestTicket};
use super::events::{EngineEvent, RenderSignal};
use super::state::{Engine, ViewMode};
use crate::error::EngineError;
use crate::sdk::{HistoryPage, Message, SdkError};
use std::collections::HashSet;
use std::rc::Rc;

/// An older or newer page fetch, ready to be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub ticket: RequestTicket,
    pub conversation_id: String,
    pub cursor: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRequest {
    pub ticket: RequestTicket,
    pub conversation_id: String,
    pub target: Message,
    pub before: usize,
    pub after: usize,
}

/// Returns `None` when the window already holds the oldest message.
///
/// An older load that is still in flight is superseded, not awaited.
pub fn begin_older(engine: &mut Engine) -> Result<Option<PageRequest>, EngineError> {
    let conversation_id = engine.active()?.id.clone();
    if !engine.window.has_more_old {
        tracing::debug!(%conversation_id, "no older messages to load");
        return Ok(None);
    }
    let ticket = engine.epochs.issue(Direction::Older);
    engine.window.loading_older = true;
    Ok(Some(PageRequest {
        ticket,
        conversation_id,
        cursor: engine.window.oldest_cursor().map(str::to_owned),
        count: engine.config.page_size,
    }))
}

/// Returns `None` when the window already reaches the live tail.
pub fn begin_newer(engine: &mut Engine) -> Result<Option<PageRequest>, EngineError> {
    let conversation_id = engine.active()?.id.clone();
    if !engine.window.has_more_new {
        tracing::debug!(%conversation_id, "window already at the newest message");
        return Ok(None);
    }
    let ticket = engine.epochs.issue(Direction::Newer);
    engine.window.loading_newer = true;
    Ok(Some(PageRequest {
        ticket,
        conversation_id,
        cursor: engine.window.newest_cursor().map(str::to_owned),
        count: engine.config.page_size,
    }))
}

/// A jump replaces the whole window, so it also cancels paging in both
/// directions.
pub fn begin_jump(engine: &mut Engine, target: &Message) -> Result<ContextRequest, EngineError> {
    let conversation_id = engine.active()?.id.clone();
    engine.epochs.supersede(Direction::Older);
    engine.epochs.supersede(Direction::Newer);
    engine.window.loading_older = false;
    engine.window.loading_newer = false;
    let ticket = engine.epochs.issue(Direction::Context);
    engine.mode = ViewMode::Search;
    tracing::info!(%conversation_id, target = %target.client_msg_id, "jumping to message");
    Ok(ContextRequest {
        ticket,
        conversation_id,
        target: target.clone(),
        before: engine.config.jump_before,
        after: engine.config.jump_after,
    })
}

/// Drop entries that cannot be admitted and reset the UI-only flags the
/// window derives itself.
pub fn normalize_page(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::with_capacity(messages.len());
    messages
        .into_iter()
        .filter_map(|mut message| {
            if message.client_msg_id.is_empty() {
                tracing::warn!(seq = ?message.seq, "dropping fetched message without client id");
                return None;
            }
            if !seen.insert(message.client_msg_id.clone()) {
                tracing::debug!(
                    client_msg_id = %message.client_msg_id,
                    "dropping repeated message within page"
                );
                return None;
            }
            message.gap_time = false;
            message.is_append = false;
            message.checked = false;
            message.show_spinner = false;
            Some(message)
        })
        .collect()
}

pub fn apply_page(engine: &mut Engine, ticket: RequestTicket, result: Result<HistoryPage, SdkError>) {
    if !engine.epochs.is_current(&ticket) {
        tracing::debug!(?ticket, "discarding stale page");
        return;
    }
    match ticket.direction {
        Direction::Older => engine.window.loading_older = false,
        Direction::Newer => engine.window.loading_newer = false,
        Direction::Context => {
            tracing::warn!(?ticket, "context ticket delivered as a page");
            return;
        }
    }

    let page = match result {
        Ok(page) => page,
        Err(err) => {
            tracing::error!(direction = ?ticket.direction, "page load failed: {err}");
            engine.window.init_loading = false;
            engine.emit(RenderSignal::LoadFailed {
                direction: ticket.direction,
                message: err.to_string(),
            });
            return;
        }
    };

    let is_end = page.is_end;
    let mut messages = normalize_page(page.messages);
    if ticket.direction == Direction::Older {
        let initial = engine.window.init_loading;
        let added = engine.window.prepend_page(messages);
        engine.window.has_more_old = !is_end;
        tracing::debug!(added, is_end, "prepended older page");
        if initial {
            engine.window.init_loading = false;
            engine.emit(RenderSignal::FollowTail);
        }
    } else {
        mark_materialized(engine, &mut messages);
        let added = engine.window.append_page(messages);
        engine.window.has_more_new = !is_end;
        tracing::debug!(added, is_end, "appended newer page");
        if is_end {
            reached_live_tail(engine);
        }
    }
}

pub fn apply_context(
    engine: &mut Engine,
    ticket: RequestTicket,
    target_id: &str,
    (before, after): (usize, usize),
    result: Result<Vec<Message>, SdkError>,
) {
    if !engine.epochs.is_current(&ticket) {
        tracing::debug!(?ticket, target_id, "discarding stale context");
        return;
    }

    let mut messages = match result {
        Ok(messages) => normalize_page(messages),
        Err(err) => {
            tracing::error!(target_id, "context load failed: {err}");
            context_failed(engine, err.to_string());
            return;
        }
    };
    if !messages.iter().any(|m| m.client_msg_id == target_id) {
        tracing::warn!(target_id, "context page does not contain its target");
        context_failed(engine, format!("message {target_id} is not available"));
        return;
    }

    mark_materialized(engine, &mut messages);
    engine.window.replace_all(messages);
    let Some(idx) = engine.window.position(target_id) else {
        return;
    };
    let count_before = idx;
    let count_after = engine.window.len() - idx - 1;
    let start_index = engine.config.start_index;
    engine.window.has_more_old = count_before >= before;
    engine.window.has_more_new = count_after >= after;
    engine.window.first_item_index = start_index - i64::try_from(idx).unwrap_or(i64::MAX);
    engine.window.init_loading = false;
    if !engine.window.has_more_new {
        reached_live_tail(engine);
    }
    tracing::debug!(target_id, count_before, count_after, "context applied");
    engine.emit(RenderSignal::ScrollToIndex { index: start_index });
}

/// Deferred pushes that now come in through a page keep their "arrived while
/// away" mark.
fn mark_materialized(engine: &mut Engine, messages: &mut [Message]) {
    if engine.pending_append_ids.is_empty() {
        return;
    }
    for message in messages.iter_mut() {
        if engine.pending_append_ids.remove(&message.client_msg_id) {
            message.is_append = true;
        }
    }
}

fn reached_live_tail(engine: &mut Engine) {
    engine.pending_append_ids.clear();
    if engine.mode == ViewMode::Search {
        tracing::info!("search context reached the live tail");
        engine.mode = ViewMode::History;
    }
}

fn context_failed(engine: &mut Engine, message: String) {
    engine.window.init_loading = false;
    if !engine.window.has_more_new {
        engine.mode = ViewMode::History;
    }
    engine.emit(RenderSignal::LoadFailed { direction: Direction::Context, message });
}

impl Engine {
    /// Fetch the page before the oldest loaded message.
    pub fn load_older(&mut self) -> Result<(), EngineError> {
        if let Some(request) = begin_older(self)? {
            self.spawn_page_fetch(request);
        }
        self.publish();
        Ok(())
    }

    /// Fetch the page after the newest loaded message. Only does anything
    /// while a search context has not reached the live tail.
    pub fn load_newer(&mut self) -> Result<(), EngineError> {
        if let Some(request) = begin_newer(self)? {
            self.spawn_page_fetch(request);
        }
        self.publish();
        Ok(())
    }

    /// Replace the window with the context around `target`.
    pub fn jump_to(&mut self, target: &Message) -> Result<(), EngineError> {
        let request = begin_jump(self, target)?;
        let sdk = Rc::clone(&self.sdk);
        self.spawn_request(async move {
            let ContextRequest { ticket, conversation_id, target, before, after } = request;
            let result = sdk.fetch_context(&conversation_id, &target, before, after).await;
            EngineEvent::ContextLoaded {
                ticket,
                target_id: target.client_msg_id,
                before,
                after,
                result,
            }
        });
        self.publish();
        Ok(())
    }

    /// Leave a search context and reload from the live tail.
    pub fn jump_to_latest(&mut self) -> Result<(), EngineError> {
        self.active()?;
        self.epochs.supersede(Direction::Context);
        self.epochs.supersede(Direction::Newer);
        self.window.reset();
        self.window.init_loading = true;
        self.pending_append_ids.clear();
        self.mode = ViewMode::History;
        self.load_older()
    }

    fn spawn_page_fetch(&mut self, request: PageRequest) {
        let sdk = Rc::clone(&self.sdk);
        self.spawn_request(async move {
            let PageRequest { ticket, conversation_id, cursor, count } = request;
            let result = match ticket.direction {
                Direction::Newer => sdk.fetch_newer(&conversation_id, cursor.as_deref(), count).await,
                Direction::Older | Direction::Context => {
                    sdk.fetch_older(&conversation_id, cursor.as_deref(), count).await
                }
            };
            EngineEvent::PageLoaded { ticket, result }
        });
    }
}
