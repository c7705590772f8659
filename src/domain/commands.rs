//! Outbound Commands
//!
//! Fire-and-forget commands sent back over the transport. Each command
//! validates its payload before it is encoded.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::domain::value_objects::RoomId;
use crate::shared::error::SyncError;
use crate::shared::validation::validate;

/// Maximum chat message body length in characters
pub const MAX_MESSAGE_LEN: u64 = 2000;

/// Wire command names.
pub mod names {
    pub const JOIN_CHAT: &str = "joinChat";
    pub const LEAVE_CHAT: &str = "leaveChat";
    pub const SEND_MESSAGE: &str = "sendMessage";
    pub const TYPING: &str = "typing";
    pub const ORDER_STATUS_CHANGED: &str = "orderStatusChanged";
}

fn room_id_is_valid(room_id: &RoomId) -> Result<(), validator::ValidationError> {
    let len = room_id.as_str().trim().chars().count();
    if len == 0 || len > 64 {
        return Err(validator::ValidationError::new("room_id")
            .with_message("must be 1-64 characters".into()));
    }
    Ok(())
}

/// `joinChat` / `leaveChat`
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoomCommand {
    #[validate(custom(function = "room_id_is_valid"))]
    pub room_id: RoomId,
}

/// `sendMessage`
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageCommand {
    #[validate(custom(function = "room_id_is_valid"))]
    pub room_id: RoomId,
    #[validate(length(min = 1, max = MAX_MESSAGE_LEN, message = "must be 1-2000 characters"))]
    pub message: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub sender_name: String,
    pub client_id: Uuid,
}

/// `typing`
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TypingCommand {
    #[validate(custom(function = "room_id_is_valid"))]
    pub room_id: RoomId,
    pub is_typing: bool,
}

/// `orderStatusChanged`, re-emitted by admin views after a status edit
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusCommand {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub order_id: String,
    #[validate(length(min = 1, max = 32, message = "must be 1-32 characters"))]
    pub new_status: String,
}

/// Outbound command
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    JoinChat(RoomCommand),
    LeaveChat(RoomCommand),
    SendMessage(SendMessageCommand),
    Typing(TypingCommand),
    OrderStatusChanged(OrderStatusCommand),
}

impl OutboundCommand {
    pub fn join(room_id: RoomId) -> Self {
        Self::JoinChat(RoomCommand { room_id })
    }

    pub fn leave(room_id: RoomId) -> Self {
        Self::LeaveChat(RoomCommand { room_id })
    }

    pub fn typing(room_id: RoomId, is_typing: bool) -> Self {
        Self::Typing(TypingCommand { room_id, is_typing })
    }

    pub fn order_status(order_id: impl Into<String>, new_status: impl Into<String>) -> Self {
        Self::OrderStatusChanged(OrderStatusCommand {
            order_id: order_id.into(),
            new_status: new_status.into(),
        })
    }

    /// Wire event name
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinChat(_) => names::JOIN_CHAT,
            Self::LeaveChat(_) => names::LEAVE_CHAT,
            Self::SendMessage(_) => names::SEND_MESSAGE,
            Self::Typing(_) => names::TYPING,
            Self::OrderStatusChanged(_) => names::ORDER_STATUS_CHANGED,
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        match self {
            Self::JoinChat(c) | Self::LeaveChat(c) => validate(c),
            Self::SendMessage(c) => validate(c),
            Self::Typing(c) => validate(c),
            Self::OrderStatusChanged(c) => validate(c),
        }
    }

    /// Validate and encode the payload
    pub fn payload(&self) -> Result<Value, SyncError> {
        self.validate()?;
        let value = match self {
            Self::JoinChat(c) | Self::LeaveChat(c) => serde_json::to_value(c)?,
            Self::SendMessage(c) => serde_json::to_value(c)?,
            Self::Typing(c) => serde_json::to_value(c)?,
            Self::OrderStatusChanged(c) => serde_json::to_value(c)?,
        };
        Ok(value)
    }
}
