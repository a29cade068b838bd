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

//! The conversation message window and its synchronization engine.
//!
//! [`Engine`] owns the window of the active conversation. Three sources
//! change it: page fetches ([`history`]), pushed SDK events ([`applier`]) and
//! local sends ([`send`]). Every async result re-enters through one channel
//! and is applied by [`handle_engine_event`] in a single synchronous turn.

pub mod actions;
pub mod applier;
pub mod config;
pub mod epoch;
pub mod events;
pub mod history;
pub mod read_state;
pub mod send;
pub mod state;
pub mod store;
pub mod switcher;

pub use config::{WindowConfig, default_window_config, load_config};
pub use epoch::{Direction, RequestEpochs, RequestTicket};
pub use events::{EngineEvent, EventEnvelope, RenderSignal, WindowEvent, handle_engine_event};
pub use history::{ContextRequest, PageRequest};
pub use state::{ActiveConversation, Engine, SelfProfile, ViewMode, WindowSnapshot};
pub use store::ConversationWindow;

use crate::sdk::{ConversationKind, Message, MessageContent};
use tokio::sync::mpsc;

/// Imperative triggers from the rendering layer, for embedders that drive the
/// engine through [`run_engine`].
#[derive(Debug)]
pub enum EngineCommand {
    Open { conversation_id: String, kind: ConversationKind },
    OpenAt { conversation_id: String, kind: ConversationKind, target: Message },
    Close,
    LoadOlder,
    LoadNewer,
    JumpTo(Message),
    JumpToLatest,
    Send(MessageContent),
    Resend(String),
    MarkVisible(Vec<String>),
    SetAtBottom(bool),
    Delete { client_msg_ids: Vec<String>, sync: bool },
    Revoke(String),
    ToggleChecked(String),
    Shutdown,
}

/// Drive the engine until `Shutdown` or until every command sender is gone.
/// Must run inside a `LocalSet`.
pub async fn run_engine(engine: &mut Engine, mut commands: mpsc::UnboundedReceiver<EngineCommand>) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(EngineCommand::Shutdown) | None => break,
                Some(command) => apply_command(engine, command),
            },
            Some(event) = engine.event_rx.recv() => {
                handle_engine_event(engine, event);
            }
        }

        // Drain whatever re-entered meanwhile before waiting again.
        while let Ok(event) = engine.event_rx.try_recv() {
            handle_engine_event(engine, event);
        }
    }
    engine.close();
    tracing::info!("engine stopped");
}

fn apply_command(engine: &mut Engine, command: EngineCommand) {
    let result = match command {
        EngineCommand::Open { conversation_id, kind } => engine.open(&conversation_id, kind),
        EngineCommand::OpenAt { conversation_id, kind, target } => {
            engine.open_at(&conversation_id, kind, &target)
        }
        EngineCommand::Close => {
            engine.close();
            Ok(())
        }
        EngineCommand::LoadOlder => engine.load_older(),
        EngineCommand::LoadNewer => engine.load_newer(),
        EngineCommand::JumpTo(target) => engine.jump_to(&target),
        EngineCommand::JumpToLatest => engine.jump_to_latest(),
        EngineCommand::Send(content) => engine.send(content).map(drop),
        EngineCommand::Resend(client_msg_id) => engine.resend(&client_msg_id).map(drop),
        EngineCommand::MarkVisible(ids) => engine.mark_visible(&ids),
        EngineCommand::SetAtBottom(at_bottom) => {
            engine.set_at_bottom(at_bottom);
            Ok(())
        }
        EngineCommand::Delete { client_msg_ids, sync } => engine.delete(client_msg_ids, sync),
        EngineCommand::Revoke(client_msg_id) => engine.revoke(&client_msg_id),
        EngineCommand::ToggleChecked(client_msg_id) => engine.toggle_checked(&client_msg_id).map(drop),
        EngineCommand::Shutdown => Ok(()),
    };
    if let Err(err) = result {
        tracing::warn!("command rejected: {err}");
        engine.emit(RenderSignal::ActionFailed { message: err.user_message() });
    }
}
