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
use super::epoch::RequestEpochs;
use super::events::{EngineEvent, RenderSignal};
use super::store::ConversationWindow;
use crate::error::EngineError;
use crate::sdk::{ConversationKind, ImSdk, MemorySdk, Message};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

const SIGNAL_BUFFER: usize = 64;

/// How the window relates to the live tail of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Anchored at the newest messages.
    History,
    /// Showing the context around a pinned message; pushes are deferred while
    /// newer pages remain.
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConversation {
    pub id: String,
    pub kind: ConversationKind,
}

/// The local user, stamped on optimistic sends and used for receipt checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfProfile {
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub face_url: String,
}

/// What the rendering layer observes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowSnapshot {
    pub messages: Vec<Message>,
    pub has_more_old: bool,
    pub has_more_new: bool,
    pub init_loading: bool,
    pub first_item_index: i64,
}

/// One engine per client. It owns the window of the active conversation and
/// every piece of state that decides how async results are merged into it.
///
/// Requests are spawned with `tokio::task::spawn_local`, so triggers must be
/// called from inside a `LocalSet`. Results re-enter through `event_rx` and
/// are applied by [`super::handle_engine_event`].
pub struct Engine {
    pub window: ConversationWindow,
    pub conversation: Option<ActiveConversation>,
    pub mode: ViewMode,
    /// Push-arrived ids deferred while a search context is displayed.
    pub pending_append_ids: HashSet<String>,
    /// Reported by the rendering layer: the viewport shows the newest edge.
    pub at_bottom: bool,
    pub self_user: SelfProfile,
    pub config: WindowConfig,
    pub(crate) epochs: RequestEpochs,
    /// Spawned requests whose result has not re-entered yet.
    pub(crate) in_flight: usize,
    /// Pending spinner timers for sends, keyed by local client id.
    pub(crate) spinners: HashMap<String, CancellationToken>,
    pub(crate) sdk: Rc<dyn ImSdk>,
    pub event_tx: mpsc::UnboundedSender<EngineEvent>,
    pub event_rx: mpsc::UnboundedReceiver<EngineEvent>,
    snapshot_tx: watch::Sender<WindowSnapshot>,
    signal_tx: broadcast::Sender<RenderSignal>,
}

impl Engine {
    pub fn new(sdk: Rc<dyn ImSdk>, self_user: SelfProfile, config: WindowConfig) -> Self {
        let config = config.sanitized();
        let window = ConversationWindow::new(&config);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(snapshot_of(&window));
        let (signal_tx, _) = broadcast::channel(SIGNAL_BUFFER);
        Self {
            window,
            conversation: None,
            mode: ViewMode::History,
            pending_append_ids: HashSet::new(),
            at_bottom: true,
            self_user,
            config,
            epochs: RequestEpochs::default(),
            in_flight: 0,
            spinners: HashMap::new(),
            sdk,
            event_tx,
            event_rx,
            snapshot_tx,
            signal_tx,
        }
    }

    /// Engine over an empty [`MemorySdk`], self user `me`, default config.
    #[doc(hidden)]
    pub fn test_default() -> Self {
        let self_user =
            SelfProfile { user_id: "me".to_owned(), nickname: "Me".to_owned(), ..Default::default() };
        Self::new(Rc::new(MemorySdk::new()), self_user, WindowConfig::default())
    }

    /// Read-only subscription to the window state.
    pub fn subscribe(&self) -> watch::Receiver<WindowSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Typed channel for cross-cutting signals (new messages below, scroll
    /// targets, failure notices).
    pub fn subscribe_signals(&self) -> broadcast::Receiver<RenderSignal> {
        self.signal_tx.subscribe()
    }

    /// Sender through which the SDK listener delivers pushed events.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<EngineEvent> {
        self.event_tx.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> WindowSnapshot {
        snapshot_of(&self.window)
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub(crate) fn active(&self) -> Result<&ActiveConversation, EngineError> {
        self.conversation.as_ref().ok_or(EngineError::NoActiveConversation)
    }

    /// Push the current state to subscribers, skipping no-op updates.
    pub(crate) fn publish(&self) {
        let snapshot = snapshot_of(&self.window);
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Emission is best-effort; with no subscriber the signal is dropped.
    pub(crate) fn emit(&self, signal: RenderSignal) {
        let _ = self.signal_tx.send(signal);
    }

    /// Run a collaborator call in the background and feed its result back
    /// through the event channel.
    pub(crate) fn spawn_request<F>(&mut self, request: F)
    where
        F: Future<Output = EngineEvent> + 'static,
    {
        self.in_flight += 1;
        let event_tx = self.event_tx.clone();
        tokio::task::spawn_local(async move {
            let _ = event_tx.send(request.await);
        });
    }

    pub(crate) fn cancel_spinners(&mut self) {
        for (_, token) in self.spinners.drain() {
            token.cancel();
        }
    }

    /// The rendering layer reports whether the newest edge is in view.
    /// Reaching it clears the "arrived while away" marks, including queued
    /// ids whose message is already in the window.
    pub fn set_at_bottom(&mut self, at_bottom: bool) {
        self.at_bottom = at_bottom;
        if at_bottom {
            for message in self.window.iter_mut().filter(|m| m.is_append) {
                message.is_append = false;
            }
            let window = &self.window;
            self.pending_append_ids.retain(|id| !window.contains(id));
        }
        self.publish();
    }

    /// Wait until every spawned request has re-entered and been applied.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            let Some(event) = self.event_rx.recv().await else {
                break;
            };
            super::handle_engine_event(self, event);
        }
    }
}

fn snapshot_of(window: &ConversationWindow) -> WindowSnapshot {
    WindowSnapshot {
        messages: window.messages().to_vec(),
        has_more_old: window.has_more_old,
        has_more_new: window.has_more_new,
        init_loading: window.init_loading,
        first_item_index: window.first_item_index,
    }
}
