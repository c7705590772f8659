//! Outbound Command Emitter
//!
//! Validated fire-and-forget commands. A command reaches the transport only
//! while the session is connected; otherwise it is dropped with a warning.
//! Nothing is queued for later delivery.

use crate::domain::OutboundCommand;
use crate::infrastructure::metrics;
use crate::infrastructure::transport::{Transport, TransportSession};

/// What happened to an outbound command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    Sent,
    /// Session was not connected; command dropped
    NotConnected,
    /// Command failed validation or referenced an unusable target
    Rejected(String),
    /// Transport refused the frame; session is now disconnected
    Failed(String),
}

impl EmitOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, EmitOutcome::Sent)
    }

    fn label(&self) -> &'static str {
        match self {
            EmitOutcome::Sent => "sent",
            EmitOutcome::NotConnected => "not_connected",
            EmitOutcome::Rejected(_) => "rejected",
            EmitOutcome::Failed(_) => "failed",
        }
    }
}

/// Anything outbound commands can be handed to
#[cfg_attr(test, mockall::automock)]
pub trait CommandSink {
    fn emit(&mut self, command: OutboundCommand) -> EmitOutcome;
}

/// Emitter bound to a transport session for the duration of one operation
pub struct OutboundEmitter<'a, T> {
    session: &'a mut TransportSession<T>,
}

impl<'a, T: Transport> OutboundEmitter<'a, T> {
    pub fn new(session: &'a mut TransportSession<T>) -> Self {
        Self { session }
    }
}

impl<T: Transport> CommandSink for OutboundEmitter<'_, T> {
    fn emit(&mut self, command: OutboundCommand) -> EmitOutcome {
        let name = command.event_name();

        let outcome = if !self.session.is_connected() {
            tracing::warn!(command = name, state = %self.session.state(), "Dropping command while not connected");
            EmitOutcome::NotConnected
        } else {
            match command.payload() {
                Err(e) => {
                    tracing::warn!(command = name, error = %e, "Rejecting invalid command");
                    EmitOutcome::Rejected(e.to_string())
                }
                Ok(payload) => match self.session.send(name, &payload) {
                    Ok(()) => {
                        tracing::debug!(command = name, "Command sent");
                        EmitOutcome::Sent
                    }
                    Err(e) => {
                        tracing::warn!(command = name, error = %e, "Command send failed");
                        EmitOutcome::Failed(e.to_string())
                    }
                },
            }
        };

        metrics::record_outbound_command(name, outcome.label());
        outcome
    }
}
