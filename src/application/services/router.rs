//! Event Router
//!
//! Dispatches named inbound events to the component that owns them. Each
//! event is delivered at most once, in arrival order. Unknown names and
//! malformed payloads are logged and dropped; neither ever fails the session.

use tokio::sync::broadcast;
use tokio::time::Instant;

use super::chat_session::{AppendOutcome, ChatSession};
use super::notification_store::NotificationStore;
use super::presence::PresenceCounter;
use super::typing::TypingTransition;
use crate::domain::events::{InboundEvent, NotificationPayload};
use crate::domain::DomainEvent;
use crate::infrastructure::metrics;
use crate::shared::error::SyncError;

/// Title given to notifications synthesized from `lowStockAlert`
pub const LOW_STOCK_TITLE: &str = "Low stock alert";

/// Consumer of domain events (order feed, admin dashboards)
pub trait DomainEventSink {
    fn publish(&mut self, event: DomainEvent);
}

impl DomainEventSink for broadcast::Sender<DomainEvent> {
    fn publish(&mut self, event: DomainEvent) {
        // No subscribers is fine; the event is simply not observed.
        let _ = self.send(event);
    }
}

impl DomainEventSink for Vec<DomainEvent> {
    fn publish(&mut self, event: DomainEvent) {
        self.push(event);
    }
}

/// Components an event can be routed to
pub struct RouteTargets<'a> {
    pub notifications: &'a mut NotificationStore,
    pub chat: &'a mut ChatSession,
    pub presence: &'a mut PresenceCounter,
    pub domain: &'a mut dyn DomainEventSink,
    pub now: Instant,
}

/// Where an event ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Notification,
    Presence,
    Chat,
    Typing(TypingTransition),
    Domain,
    /// Unknown name or malformed payload
    Dropped,
}

/// Stateless dispatcher with delivery counters
#[derive(Debug, Default)]
pub struct EventRouter {
    routed: u64,
    dropped: u64,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one named event.
    pub fn dispatch(
        &mut self,
        name: &str,
        payload: serde_json::Value,
        targets: RouteTargets<'_>,
    ) -> RouteOutcome {
        let event = match InboundEvent::decode(name, payload) {
            Ok(event) => event,
            Err(SyncError::UnknownEvent(name)) => {
                tracing::debug!(event = %name, "Ignoring unknown event");
                metrics::record_unknown_event();
                self.dropped += 1;
                return RouteOutcome::Dropped;
            }
            Err(e) => {
                tracing::warn!(event = name, error = %e, "Dropping malformed event");
                self.dropped += 1;
                return RouteOutcome::Dropped;
            }
        };

        metrics::record_inbound_event(event.event_name());
        self.routed += 1;

        match event {
            InboundEvent::Notification(payload) => {
                targets.notifications.ingest(payload);
                RouteOutcome::Notification
            }
            InboundEvent::LowStockAlert(alert) => {
                targets.notifications.ingest(NotificationPayload {
                    id: None,
                    title: LOW_STOCK_TITLE.to_string(),
                    message: alert.message,
                    kind: Some("low-stock".to_string()),
                });
                RouteOutcome::Notification
            }
            InboundEvent::OnlineCount(count) => {
                targets.presence.set(count);
                RouteOutcome::Presence
            }
            InboundEvent::ChatMessage(payload) => {
                if targets.chat.append_message(payload) == AppendOutcome::Ignored {
                    tracing::trace!("Chat message outside joined rooms");
                }
                RouteOutcome::Chat
            }
            InboundEvent::UserTyping(payload) => {
                RouteOutcome::Typing(targets.chat.update_typing(payload, targets.now))
            }
            InboundEvent::OrderStatusChanged(payload) => {
                targets.domain.publish(DomainEvent::OrderStatusChanged(payload));
                RouteOutcome::Domain
            }
            InboundEvent::NewOrder(payload) => {
                targets.domain.publish(DomainEvent::NewOrder(payload));
                RouteOutcome::Domain
            }
            InboundEvent::StockUpdated(payload) => {
                targets.domain.publish(DomainEvent::StockUpdated(payload));
                RouteOutcome::Domain
            }
        }
    }

    pub fn routed(&self) -> u64 {
        self.routed
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
