//! Chat entities: messages, typing entries, and joined rooms.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::value_objects::{RoomId, UserId};
use crate::shared::timer::TimerHandle;

/// One chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    /// Correlation id stamped on messages sent from this client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
}

/// A remote user currently typing in a room.
#[derive(Debug, Clone)]
pub struct TypingEntry {
    pub user_id: UserId,
    pub display_name: String,
    pub started_at: Instant,
    /// Pending expiry timer; replaced whenever a fresh "started" signal arrives
    pub expiry: TimerHandle,
}

/// An outbound message still waiting for its server broadcast.
#[derive(Debug, Clone)]
pub struct PendingEcho {
    pub client_id: Uuid,
    pub body: String,
}

/// One joined (or previously joined) room.
///
/// The message sequence is append-only in receipt order.
#[derive(Debug)]
pub struct ChatRoom {
    pub id: RoomId,
    pub joined: bool,
    messages: Vec<ChatMessage>,
    pub(crate) typing: BTreeMap<UserId, TypingEntry>,
    pub(crate) pending_echoes: VecDeque<PendingEcho>,
}

impl ChatRoom {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            joined: true,
            messages: Vec::new(),
            typing: BTreeMap::new(),
            pending_echoes: VecDeque::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn typing_entry(&self, user_id: &UserId) -> Option<&TypingEntry> {
        self.typing.get(user_id)
    }

    /// Display names of users currently typing, ordered by user id.
    pub fn typing_users(&self) -> Vec<String> {
        self.typing
            .values()
            .map(|entry| entry.display_name.clone())
            .collect()
    }
}
