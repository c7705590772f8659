//! Chat Session
//!
//! Per-room join/leave lifecycle, receipt-ordered message history, echo
//! suppression for our own messages, and the typing state machines.
//!
//! Echo suppression: every outbound message carries a `clientId`. When the
//! server broadcast comes back with a pending `clientId` it is dropped once.
//! Servers that do not relay `clientId` are matched on (local sender, body)
//! against the oldest pending echo instead.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use uuid::Uuid;

use super::emitter::{CommandSink, EmitOutcome};
use super::typing::{ChatTimer, ChatTimers, LocalTyping, TypingTransition};
use crate::config::ChatSettings;
use crate::domain::commands::SendMessageCommand;
use crate::domain::events::{ChatMessagePayload, TypingPayload};
use crate::domain::{ChatMessage, ChatRoom, LocalUser, OutboundCommand, PendingEcho, RoomId, TypingEntry};

/// Chat timing and buffer limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatConfig {
    pub typing_expiry: Duration,
    pub local_typing_idle: Duration,
    pub pending_echo_limit: usize,
}

impl ChatConfig {
    pub fn from_settings(settings: &ChatSettings) -> Self {
        Self {
            typing_expiry: Duration::from_millis(settings.typing_expiry_ms),
            local_typing_idle: Duration::from_millis(settings.local_typing_idle_ms),
            pending_echo_limit: settings.pending_echo_limit.max(1),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_expiry: Duration::from_millis(3000),
            local_typing_idle: Duration::from_millis(1000),
            pending_echo_limit: 32,
        }
    }
}

/// Result of applying an inbound chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Server broadcast of a message we already echoed locally
    EchoSuppressed,
    /// Room unknown or not joined
    Ignored,
}

/// Chat session state for the current principal
#[derive(Debug)]
pub struct ChatSession {
    config: ChatConfig,
    local_user: Option<LocalUser>,
    rooms: HashMap<RoomId, ChatRoom>,
    local_typing: HashMap<RoomId, LocalTyping>,
    timers: ChatTimers,
}

impl ChatSession {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            local_user: None,
            rooms: HashMap::new(),
            local_typing: HashMap::new(),
            timers: ChatTimers::new(),
        }
    }

    pub fn set_local_user(&mut self, user: Option<LocalUser>) {
        self.local_user = user;
    }

    pub fn local_user(&self) -> Option<&LocalUser> {
        self.local_user.as_ref()
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&ChatRoom> {
        self.rooms.get(room_id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &ChatRoom> {
        self.rooms.values()
    }

    pub fn is_joined(&self, room_id: &RoomId) -> bool {
        self.rooms.get(room_id).is_some_and(|room| room.joined)
    }

    pub fn is_locally_typing(&self, room_id: &RoomId) -> bool {
        self.local_typing
            .get(room_id)
            .is_some_and(LocalTyping::is_typing)
    }

    /// Earliest pending typing timer
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    // --- lifecycle -------------------------------------------------------

    /// Emit `joinChat` and make sure a local room exists.
    pub fn join(&mut self, room_id: RoomId, sink: &mut dyn CommandSink) -> EmitOutcome {
        let command = OutboundCommand::join(room_id.clone());
        if let Err(e) = command.validate() {
            return EmitOutcome::Rejected(e.to_string());
        }
        let outcome = sink.emit(command);

        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| ChatRoom::new(room_id.clone()))
            .joined = true;
        tracing::info!(room_id = %room_id, outcome = ?outcome, "Joined chat room");
        outcome
    }

    /// Emit `leaveChat`. History is kept until [`ChatSession::teardown`].
    pub fn leave(&mut self, room_id: &RoomId, sink: &mut dyn CommandSink) -> EmitOutcome {
        self.stop_typing(room_id, sink);

        let Some(room) = self.rooms.get_mut(room_id) else {
            tracing::debug!(room_id = %room_id, "leave on unknown room");
            return EmitOutcome::Rejected(format!("room {} is not joined", room_id));
        };
        room.joined = false;
        for (_, entry) in std::mem::take(&mut room.typing) {
            self.timers.cancel(entry.expiry);
        }

        let outcome = sink.emit(OutboundCommand::leave(room_id.clone()));
        tracing::info!(room_id = %room_id, outcome = ?outcome, "Left chat room");
        outcome
    }

    /// Re-emit `joinChat` for every joined room after a reconnect.
    pub fn rejoin_all(&mut self, sink: &mut dyn CommandSink) {
        let mut joined: Vec<_> = self
            .rooms
            .values()
            .filter(|room| room.joined)
            .map(|room| room.id.clone())
            .collect();
        joined.sort();
        for room_id in joined {
            let outcome = sink.emit(OutboundCommand::join(room_id.clone()));
            tracing::debug!(room_id = %room_id, outcome = ?outcome, "Rejoined chat room");
        }
    }

    /// Drop a room and its history, cancelling its timers. No commands are sent.
    pub fn teardown(&mut self, room_id: &RoomId) {
        if let Some(LocalTyping::Typing { idle_timer }) = self.local_typing.remove(room_id) {
            self.timers.cancel(idle_timer);
        }
        if let Some(room) = self.rooms.remove(room_id) {
            for entry in room.typing.values() {
                self.timers.cancel(entry.expiry);
            }
        }
    }

    /// Drop every room and cancel every timer.
    pub fn teardown_all(&mut self) {
        self.rooms.clear();
        self.local_typing.clear();
        self.timers.clear();
    }

    /// Forget all typing state (remote and local) without touching history.
    pub fn reset_typing(&mut self) {
        for room in self.rooms.values_mut() {
            room.typing.clear();
        }
        self.local_typing.clear();
        self.timers.clear();
    }

    // --- messages --------------------------------------------------------

    /// Apply an inbound `chatMessage`.
    pub fn append_message(&mut self, payload: ChatMessagePayload) -> AppendOutcome {
        let local_id = self.local_user.as_ref().map(|user| user.user_id.clone());
        let Some(room) = self.rooms.get_mut(&payload.room_id).filter(|room| room.joined) else {
            tracing::debug!(room_id = %payload.room_id, "Message for unjoined room ignored");
            return AppendOutcome::Ignored;
        };

        let echo_index = match payload.client_id {
            Some(client_id) => room
                .pending_echoes
                .iter()
                .position(|echo| echo.client_id == client_id),
            None if local_id.as_ref() == Some(&payload.user_id) => room
                .pending_echoes
                .iter()
                .position(|echo| echo.body == payload.message),
            None => None,
        };
        if let Some(index) = echo_index {
            room.pending_echoes.remove(index);
            tracing::trace!(room_id = %room.id, "Server echo of own message suppressed");
            return AppendOutcome::EchoSuppressed;
        }

        room.push_message(ChatMessage {
            timestamp: payload
                .timestamp
                .as_ref()
                .map(|ts| ts.to_datetime())
                .unwrap_or_else(Utc::now),
            room_id: payload.room_id,
            sender_id: payload.user_id,
            sender_name: payload.user_name,
            body: payload.message,
            client_id: payload.client_id,
        });
        AppendOutcome::Appended
    }

    /// Emit `sendMessage` and append the optimistic local echo once it is sent.
    pub fn send_message(
        &mut self,
        room_id: &RoomId,
        body: &str,
        sink: &mut dyn CommandSink,
    ) -> EmitOutcome {
        let Some(user) = self.local_user.clone() else {
            return EmitOutcome::Rejected("no local user".to_string());
        };
        if !self.is_joined(room_id) {
            return EmitOutcome::Rejected(format!("room {} is not joined", room_id));
        }

        self.stop_typing(room_id, sink);

        let client_id = Uuid::new_v4();
        let outcome = sink.emit(OutboundCommand::SendMessage(SendMessageCommand {
            room_id: room_id.clone(),
            message: body.to_string(),
            sender_name: user.display_name.clone(),
            client_id,
        }));
        if !outcome.is_sent() {
            return outcome;
        }

        let limit = self.config.pending_echo_limit;
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.push_message(ChatMessage {
                room_id: room_id.clone(),
                sender_id: user.user_id,
                sender_name: user.display_name,
                body: body.to_string(),
                timestamp: Utc::now(),
                client_id: Some(client_id),
            });
            room.pending_echoes.push_back(PendingEcho {
                client_id,
                body: body.to_string(),
            });
            while room.pending_echoes.len() > limit {
                room.pending_echoes.pop_front();
            }
        }
        outcome
    }

    // --- remote typing ---------------------------------------------------

    /// Apply an inbound `userTyping` signal.
    pub fn update_typing(&mut self, payload: TypingPayload, now: Instant) -> TypingTransition {
        if self
            .local_user
            .as_ref()
            .is_some_and(|user| user.user_id == payload.user_id)
        {
            return TypingTransition::Ignored;
        }
        let Some(room) = self.rooms.get_mut(&payload.room_id).filter(|room| room.joined) else {
            return TypingTransition::Ignored;
        };

        if !payload.is_typing {
            return match room.typing.remove(&payload.user_id) {
                Some(entry) => {
                    self.timers.cancel(entry.expiry);
                    TypingTransition::Stopped
                }
                None => TypingTransition::Unchanged,
            };
        }

        let deadline = now + self.config.typing_expiry;
        match room.typing.get_mut(&payload.user_id) {
            Some(entry) => {
                self.timers.cancel(entry.expiry);
                entry.expiry = self.timers.arm(
                    deadline,
                    ChatTimer::RemoteTypingExpiry {
                        room: payload.room_id.clone(),
                        user: payload.user_id.clone(),
                    },
                );
                if !payload.user_name.is_empty() {
                    entry.display_name = payload.user_name;
                }
                TypingTransition::Refreshed
            }
            None => {
                let expiry = self.timers.arm(
                    deadline,
                    ChatTimer::RemoteTypingExpiry {
                        room: payload.room_id.clone(),
                        user: payload.user_id.clone(),
                    },
                );
                room.typing.insert(
                    payload.user_id.clone(),
                    TypingEntry {
                        user_id: payload.user_id,
                        display_name: payload.user_name,
                        started_at: now,
                        expiry,
                    },
                );
                TypingTransition::Started
            }
        }
    }

    // --- local typing ----------------------------------------------------

    /// Register a local keystroke in `room_id`.
    pub fn keystroke(
        &mut self,
        room_id: &RoomId,
        now: Instant,
        sink: &mut dyn CommandSink,
    ) -> TypingTransition {
        if !self.is_joined(room_id) {
            return TypingTransition::Ignored;
        }

        let deadline = now + self.config.local_typing_idle;
        let state = self.local_typing.entry(room_id.clone()).or_default();
        match *state {
            LocalTyping::Typing { idle_timer } => {
                self.timers.cancel(idle_timer);
                let idle_timer = self
                    .timers
                    .arm(deadline, ChatTimer::LocalTypingIdle { room: room_id.clone() });
                *state = LocalTyping::Typing { idle_timer };
                TypingTransition::Refreshed
            }
            LocalTyping::Idle => {
                let idle_timer = self
                    .timers
                    .arm(deadline, ChatTimer::LocalTypingIdle { room: room_id.clone() });
                *state = LocalTyping::Typing { idle_timer };
                sink.emit(OutboundCommand::typing(room_id.clone(), true));
                TypingTransition::Started
            }
        }
    }

    /// Leave the local typing state immediately.
    pub fn stop_typing(&mut self, room_id: &RoomId, sink: &mut dyn CommandSink) -> TypingTransition {
        match self.local_typing.remove(room_id) {
            Some(LocalTyping::Typing { idle_timer }) => {
                self.timers.cancel(idle_timer);
                sink.emit(OutboundCommand::typing(room_id.clone(), false));
                TypingTransition::Stopped
            }
            _ => TypingTransition::Unchanged,
        }
    }

    // --- timers ----------------------------------------------------------

    /// Fire every timer due at `now`.
    pub fn fire_timers(&mut self, now: Instant, sink: &mut dyn CommandSink) -> Vec<TypingTransition> {
        let mut transitions = Vec::new();
        for (handle, timer) in self.timers.expire(now) {
            match timer {
                ChatTimer::RemoteTypingExpiry { room, user } => {
                    let Some(room) = self.rooms.get_mut(&room) else {
                        continue;
                    };
                    if room.typing.get(&user).is_some_and(|entry| entry.expiry == handle) {
                        room.typing.remove(&user);
                        tracing::trace!(room_id = %room.id, user_id = %user, "Typing indicator expired");
                        transitions.push(TypingTransition::Expired);
                    }
                }
                ChatTimer::LocalTypingIdle { room } => {
                    let current = self.local_typing.get(&room).copied();
                    if current == Some(LocalTyping::Typing { idle_timer: handle }) {
                        self.local_typing.remove(&room);
                        sink.emit(OutboundCommand::typing(room, false));
                        transitions.push(TypingTransition::Expired);
                    }
                }
            }
        }
        transitions
    }
}
