//! Typing Indicator State Machines
//!
//! Two machines per room, both `idle -> typing -> idle`:
//!
//! - **remote**, one per (room, user): entered on a "started" signal, left on
//!   an explicit stop or when the expiry timer fires, whichever comes first.
//! - **local**, one per room: entered on the first keystroke (emits
//!   `typing: true`), left after a quiet period (emits `typing: false`).
//!   Every keystroke re-arms the quiet timer.
//!
//! Each typing state owns its timer handle, so leaving the state cancels it.

use crate::domain::{RoomId, UserId};
use crate::shared::timer::{TimerHandle, TimerWheel};

/// Timers owned by the chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTimer {
    RemoteTypingExpiry { room: RoomId, user: UserId },
    LocalTypingIdle { room: RoomId },
}

pub type ChatTimers = TimerWheel<ChatTimer>;

/// Local "am I typing" state for one room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalTyping {
    #[default]
    Idle,
    Typing { idle_timer: TimerHandle },
}

impl LocalTyping {
    pub fn is_typing(&self) -> bool {
        matches!(self, LocalTyping::Typing { .. })
    }
}

/// Transition taken by a typing machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingTransition {
    /// idle -> typing
    Started,
    /// typing -> typing, timer re-armed
    Refreshed,
    /// typing -> idle on an explicit stop
    Stopped,
    /// typing -> idle on timer expiry
    Expired,
    /// Stop signal while already idle
    Unchanged,
    /// Unjoined room or own echo
    Ignored,
}
