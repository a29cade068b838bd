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

//! Applies pushed mutation events to the window.

use super::epoch::Direction;
use super::events::{EventEnvelope, RenderSignal, WindowEvent};
use super::state::{Engine, ViewMode};
use super::store::ConversationWindow;
use crate::sdk::{ContentType, Message, MessageContent, MessagePatch, MessageStatus, ReadCounts};

pub fn apply_incoming(engine: &mut Engine, envelope: EventEnvelope) {
    let Some(active) = engine.conversation.as_ref() else {
        tracing::debug!("no active conversation; ignoring {:?}", envelope.event);
        return;
    };
    if active.id != envelope.conversation_id {
        tracing::debug!(
            conversation_id = %envelope.conversation_id,
            "ignoring event for inactive conversation"
        );
        return;
    }

    match envelope.event {
        WindowEvent::PushNew { message } => push_new(engine, message),
        WindowEvent::Update { client_msg_id, patch } => {
            update_message(&mut engine.window, &client_msg_id, patch);
        }
        WindowEvent::DeleteById { client_msg_id } => delete_by_id(engine, &client_msg_id),
        WindowEvent::DeleteBySender { sender_id } => {
            let removed = engine.window.remove_where(|m| m.sender_id == sender_id);
            for id in &removed {
                engine.pending_append_ids.remove(id);
            }
            tracing::debug!(%sender_id, count = removed.len(), "removed messages by sender");
        }
        WindowEvent::DeleteAndReplace { old_client_msg_id, message } => {
            delete_and_replace(engine, &old_client_msg_id, message);
        }
        WindowEvent::Clear => clear(engine),
        WindowEvent::ProfileUpdate { sender_id, nickname, face_url } => {
            update_profile(&mut engine.window, &sender_id, nickname.as_deref(), face_url.as_deref());
        }
        WindowEvent::SingleReceipt { client_msg_ids } => {
            for id in &client_msg_ids {
                if let Some(message) = engine.window.get_mut(id) {
                    message.is_read = true;
                }
            }
        }
        WindowEvent::GroupReceipt { client_msg_id, counts, reader_ids } => {
            group_receipt(engine, &client_msg_id, counts, &reader_ids);
        }
    }
}

fn push_new(engine: &mut Engine, mut message: Message) {
    let id = message.client_msg_id.clone();
    if engine.window.contains(&id) {
        tracing::debug!(client_msg_id = %id, "duplicate push dropped");
        if message.is_append {
            engine.pending_append_ids.insert(id);
        }
        return;
    }

    if engine.mode == ViewMode::Search && engine.window.has_more_new {
        tracing::debug!(client_msg_id = %id, "deferring push while showing search context");
        engine.pending_append_ids.insert(id);
        engine.emit(RenderSignal::NewMessagesBelow { count: engine.pending_append_ids.len() });
        return;
    }

    message.gap_time = false;
    message.checked = false;
    message.show_spinner = false;
    message.is_append = !engine.at_bottom;
    engine.window.insert(message);

    if engine.at_bottom {
        engine.emit(RenderSignal::FollowTail);
    } else {
        let count = engine.window.messages().iter().filter(|m| m.is_append).count();
        engine.emit(RenderSignal::NewMessagesBelow { count });
    }
}

/// Merge a partial update into the entry with this id. Revocations also
/// rewrite every quote of the revoked message, whether or not the message
/// itself is loaded.
pub(crate) fn update_message(window: &mut ConversationWindow, client_msg_id: &str, patch: MessagePatch) {
    let revoke = patch.is_revoke();
    if let Some(entry) = window.get_mut(client_msg_id) {
        if merge_patch(entry, patch) {
            window.reposition(client_msg_id);
        }
    } else {
        tracing::debug!(client_msg_id, "update for message outside the window");
    }
    if revoke {
        propagate_revoke(window, client_msg_id);
    }
}

/// Returns whether the ordering key (send time, seq) changed.
fn merge_patch(entry: &mut Message, patch: MessagePatch) -> bool {
    let MessagePatch { status, seq, content, send_time, is_read, read_counts, err_code } = patch;
    let key_before = (entry.send_time, entry.seq);

    let revoke = status == Some(MessageStatus::Revoked)
        || matches!(content, Some(MessageContent::Revoked { .. }));
    if revoke {
        let revoker_id = match content {
            Some(MessageContent::Revoked { revoker_id }) => revoker_id,
            _ => None,
        };
        entry.revoke(revoker_id);
    } else {
        if let Some(status) = status {
            if entry.status.can_transition_to(status) {
                entry.status = status;
                if status != MessageStatus::Sending {
                    entry.show_spinner = false;
                }
            } else {
                tracing::warn!(
                    client_msg_id = %entry.client_msg_id,
                    from = ?entry.status,
                    to = ?status,
                    "rejected status transition"
                );
            }
        }
        if let Some(content) = content {
            if entry.status == MessageStatus::Revoked {
                tracing::warn!(client_msg_id = %entry.client_msg_id, "edit of revoked message ignored");
            } else {
                entry.content = content;
            }
        }
    }

    if seq.is_some() {
        entry.seq = seq;
    }
    if let Some(send_time) = send_time {
        entry.send_time = send_time;
    }
    if let Some(is_read) = is_read {
        entry.is_read = is_read;
    }
    if read_counts.is_some() {
        entry.read_counts = read_counts;
    }
    if entry.status == MessageStatus::Failed {
        entry.err_code = err_code.or(entry.err_code);
    } else {
        entry.err_code = None;
    }

    (entry.send_time, entry.seq) != key_before
}

fn propagate_revoke(window: &mut ConversationWindow, revoked_id: &str) {
    for message in window.iter_mut() {
        if let MessageContent::Quote { quoted, .. } = &mut message.content
            && quoted.client_msg_id == revoked_id
        {
            quoted.content_type = ContentType::Revoked;
        }
    }
}

pub(crate) fn delete_by_id(engine: &mut Engine, client_msg_id: &str) {
    engine.pending_append_ids.remove(client_msg_id);
    if engine.window.remove(client_msg_id).is_none() {
        tracing::debug!(client_msg_id, "delete for message outside the window");
    }
    if let Some(token) = engine.spinners.remove(client_msg_id) {
        token.cancel();
    }
}

fn delete_and_replace(engine: &mut Engine, old_client_msg_id: &str, mut message: Message) {
    delete_by_id(engine, old_client_msg_id);
    message.gap_time = false;
    message.is_append = false;
    message.checked = false;
    if engine.window.insert(message).is_some() && engine.at_bottom {
        engine.emit(RenderSignal::FollowTail);
    }
}

fn clear(engine: &mut Engine) {
    // Outstanding pages were cut against the old contents.
    engine.epochs.supersede(Direction::Older);
    engine.epochs.supersede(Direction::Newer);
    engine.epochs.supersede(Direction::Context);
    engine.window.reset();
    engine.pending_append_ids.clear();
    engine.mode = ViewMode::History;
    tracing::info!("conversation history cleared");
}

fn update_profile(
    window: &mut ConversationWindow,
    sender_id: &str,
    nickname: Option<&str>,
    face_url: Option<&str>,
) {
    for message in window.iter_mut().filter(|m| m.sender_id == sender_id) {
        if let Some(nickname) = nickname {
            nickname.clone_into(&mut message.sender_nickname);
        }
        if let Some(face_url) = face_url {
            face_url.clone_into(&mut message.sender_face_url);
        }
    }
}

fn group_receipt(engine: &mut Engine, client_msg_id: &str, counts: ReadCounts, reader_ids: &[String]) {
    let self_read = reader_ids.iter().any(|id| *id == engine.self_user.user_id);
    if let Some(message) = engine.window.get_mut(client_msg_id) {
        message.read_counts = Some(counts);
        if self_read {
            message.is_read = true;
        }
    }
}
