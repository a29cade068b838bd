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

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sending,
    Succeed,
    Failed,
    Revoked,
}

impl MessageStatus {
    /// Whether a message in this status may move to `target`.
    ///
    /// Only `Sending -> Succeed`, `Sending -> Failed` and `any -> Revoked` are
    /// real transitions. Re-applying the current status is accepted as a no-op.
    #[must_use]
    pub fn can_transition_to(self, target: MessageStatus) -> bool {
        self == target
            || matches!(
                (self, target),
                (Self::Sending, Self::Succeed | Self::Failed) | (_, Self::Revoked)
            )
    }
}

/// Flat discriminant of [`MessageContent`], used where only the kind matters
/// (quote previews, revoke propagation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Picture,
    Video,
    Voice,
    File,
    Custom,
    Quote,
    Notification,
    Revoked,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Picture => "picture",
            Self::Video => "video",
            Self::Voice => "voice",
            Self::File => "file",
            Self::Custom => "custom",
            Self::Quote => "quote",
            Self::Notification => "notification",
            Self::Revoked => "revoked",
        };
        f.write_str(name)
    }
}

/// Preview of a message embedded inside a quoting message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
    pub client_msg_id: String,
    #[serde(default)]
    pub sender_nickname: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub summary: String,
}

impl QuotedMessage {
    #[must_use]
    pub fn of(message: &Message) -> Self {
        Self {
            client_msg_id: message.client_msg_id.clone(),
            sender_nickname: message.sender_nickname.clone(),
            content_type: message.content_type(),
            summary: message.content.summary(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Picture {
        url: String,
        #[serde(default)]
        width: u32,
        #[serde(default)]
        height: u32,
    },
    Video {
        url: String,
        #[serde(default)]
        duration_secs: u32,
        #[serde(default)]
        snapshot_url: Option<String>,
    },
    Voice {
        url: String,
        #[serde(default)]
        duration_secs: u32,
    },
    File {
        name: String,
        #[serde(default)]
        size: u64,
        #[serde(default)]
        url: String,
    },
    /// Application-defined payload. `data` is raw JSON and is only parsed on
    /// demand via [`Message::custom_payload`].
    Custom {
        data: String,
        #[serde(default)]
        description: Option<String>,
    },
    Quote {
        text: String,
        quoted: QuotedMessage,
    },
    Notification {
        detail: String,
    },
    Revoked {
        #[serde(default)]
        revoker_id: Option<String>,
    },
}

impl MessageContent {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Text { .. } => ContentType::Text,
            Self::Picture { .. } => ContentType::Picture,
            Self::Video { .. } => ContentType::Video,
            Self::Voice { .. } => ContentType::Voice,
            Self::File { .. } => ContentType::File,
            Self::Custom { .. } => ContentType::Custom,
            Self::Quote { .. } => ContentType::Quote,
            Self::Notification { .. } => ContentType::Notification,
            Self::Revoked { .. } => ContentType::Revoked,
        }
    }

    /// Short plain-text preview used for quotes.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Text { text } | Self::Quote { text, .. } => text.clone(),
            Self::Notification { detail } => detail.clone(),
            Self::File { name, .. } => format!("[file] {name}"),
            Self::Custom { description, .. } => {
                description.clone().unwrap_or_else(|| "[custom]".to_owned())
            }
            other => format!("[{}]", other.content_type()),
        }
    }
}

/// Read counters attached to group-chat messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadCounts {
    pub has_read_count: u32,
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub client_msg_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    pub status: MessageStatus,
    pub content: MessageContent,
    pub send_time: i64,
    pub sender_id: String,
    #[serde(default)]
    pub sender_nickname: String,
    #[serde(default)]
    pub sender_face_url: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_counts: Option<ReadCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_code: Option<i32>,
    /// Derived: a time separator precedes this message.
    #[serde(default)]
    pub gap_time: bool,
    /// Arrived by push while the viewer was away from the newest edge.
    #[serde(default)]
    pub is_append: bool,
    /// Multi-select state.
    #[serde(default)]
    pub checked: bool,
    /// The delayed "sending" indicator has been revealed.
    #[serde(default)]
    pub show_spinner: bool,
}

impl Message {
    /// A confirmed message, as it would come out of a history page.
    #[must_use]
    pub fn new(
        client_msg_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: MessageContent,
        send_time: i64,
    ) -> Self {
        Self {
            client_msg_id: client_msg_id.into(),
            seq: None,
            status: MessageStatus::Succeed,
            content,
            send_time,
            sender_id: sender_id.into(),
            sender_nickname: String::new(),
            sender_face_url: String::new(),
            is_read: false,
            read_counts: None,
            err_code: None,
            gap_time: false,
            is_append: false,
            checked: false,
            show_spinner: false,
        }
    }

    #[must_use]
    pub fn seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    #[must_use]
    pub fn status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.sender_nickname = nickname.into();
        self
    }

    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.content.content_type()
    }

    #[must_use]
    pub fn quoted_id(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Quote { quoted, .. } => Some(quoted.client_msg_id.as_str()),
            _ => None,
        }
    }

    /// Parse the payload of a custom message.
    ///
    /// A malformed payload only affects this message: it is logged and `None`
    /// is returned, the window state is untouched.
    #[must_use]
    pub fn custom_payload(&self) -> Option<serde_json::Value> {
        let MessageContent::Custom { data, .. } = &self.content else {
            return None;
        };
        match serde_json::from_str(data) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    client_msg_id = %self.client_msg_id,
                    "malformed custom payload: {err}"
                );
                None
            }
        }
    }

    /// Rewrite this message as revoked. The only terminal content rewrite.
    pub fn revoke(&mut self, revoker_id: Option<String>) {
        self.content = MessageContent::Revoked { revoker_id };
        self.status = MessageStatus::Revoked;
        self.show_spinner = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Single,
    Group,
}

/// Result of an older/newer page fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub is_end: bool,
}

/// Partial update carried by an update event. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePatch {
    #[serde(default)]
    pub status: Option<MessageStatus>,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub send_time: Option<i64>,
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub read_counts: Option<ReadCounts>,
    #[serde(default)]
    pub err_code: Option<i32>,
}

impl MessagePatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    #[must_use]
    pub fn content(mut self, content: MessageContent) -> Self {
        self.content = Some(content);
        self
    }

    #[must_use]
    pub fn is_read(mut self, is_read: bool) -> Self {
        self.is_read = Some(is_read);
        self
    }

    /// Whether applying this patch turns the message into a revoked one.
    #[must_use]
    pub fn is_revoke(&self) -> bool {
        self.status == Some(MessageStatus::Revoked)
            || matches!(self.content, Some(MessageContent::Revoked { .. }))
    }
}
