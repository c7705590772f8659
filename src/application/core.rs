//! Sync Core
//!
//! Ties the transport session, router, and state owners together for one
//! principal. Every method runs to completion on the event loop; the core
//! never awaits and never reads the clock on its own.

use tokio::time::Instant;

use super::services::{
    ChatConfig, ChatSession, CommandSink, DomainEventSink, EmitOutcome, EventRouter,
    NotificationStore, OutboundEmitter, PresenceCounter, RouteOutcome, RouteTargets,
    TypingTransition,
};
use crate::domain::{
    ConnectionState, LocalUser, NotificationId, NotificationRecord, OutboundCommand, Principal,
    RoomId,
};
use crate::infrastructure::transport::{
    LinkId, SessionSignal, Transport, TransportEvent, TransportSession,
};
use crate::shared::error::{SyncError, TransportFailure};

/// Outcome of feeding one transport event to the core
#[derive(Debug, Clone, PartialEq)]
pub enum CoreSignal {
    /// Link is up; joined rooms were re-subscribed
    Connected,
    /// Link went down; typing state was cleared
    Failed(TransportFailure),
    /// Inbound event delivered (or dropped) by the router
    Routed(RouteOutcome),
    Ignored,
}

/// Real-time state for the current principal
pub struct SyncCore<T> {
    session: TransportSession<T>,
    router: EventRouter,
    notifications: NotificationStore,
    chat: ChatSession,
    presence: PresenceCounter,
    principal: Option<Principal>,
}

impl<T: Transport> SyncCore<T> {
    pub fn new(transport: T, chat: ChatConfig) -> Self {
        Self {
            session: TransportSession::new(transport),
            router: EventRouter::new(),
            notifications: NotificationStore::new(),
            chat: ChatSession::new(chat),
            presence: PresenceCounter::new(),
            principal: None,
        }
    }

    // --- principal -------------------------------------------------------

    /// Adopt `principal`. Any previous principal is logged out first.
    pub fn login(&mut self, principal: Principal) {
        if self.principal.as_ref() == Some(&principal) {
            return;
        }
        if self.principal.is_some() {
            self.logout();
        }
        tracing::info!(user_id = %principal.user_id, "Principal logged in");
        self.chat.set_local_user(Some(LocalUser::from(&principal)));
        self.principal = Some(principal);
    }

    /// Swap the credential of the current user without dropping their
    /// notifications or rooms. The link is closed and must be reopened.
    /// Returns false when `principal` is a different user.
    pub fn refresh_credential(&mut self, principal: Principal) -> bool {
        match &self.principal {
            Some(current) if current.user_id == principal.user_id => {}
            _ => return false,
        }
        self.close();
        tracing::info!(user_id = %principal.user_id, "Credential refreshed");
        self.chat.set_local_user(Some(LocalUser::from(&principal)));
        self.principal = Some(principal);
        true
    }

    /// Close the session and drop everything owned by the principal.
    pub fn logout(&mut self) {
        self.session.close();
        self.chat.teardown_all();
        self.chat.set_local_user(None);
        self.notifications.clear();
        self.presence.set(0);
        if let Some(principal) = self.principal.take() {
            tracing::info!(user_id = %principal.user_id, "Principal logged out");
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    // --- connection ------------------------------------------------------

    /// Start connecting with the current principal's credential.
    pub fn open(&mut self) -> Result<LinkId, SyncError> {
        let credential = self.principal.as_ref().map(|p| &p.credential);
        self.session.open(credential)
    }

    /// Close the link. Rooms and history survive for the next `open`.
    pub fn close(&mut self) {
        self.session.close();
        self.chat.reset_typing();
    }

    /// Apply one transport event at `now`.
    pub fn handle_transport(
        &mut self,
        event: TransportEvent,
        now: Instant,
        domain: &mut dyn DomainEventSink,
    ) -> CoreSignal {
        match self.session.handle(event) {
            SessionSignal::Connected => {
                let mut sink = OutboundEmitter::new(&mut self.session);
                self.chat.rejoin_all(&mut sink);
                CoreSignal::Connected
            }
            SessionSignal::Failed(failure) => {
                self.chat.reset_typing();
                CoreSignal::Failed(failure)
            }
            SessionSignal::Inbound { name, payload } => {
                let outcome = self.router.dispatch(
                    &name,
                    payload,
                    RouteTargets {
                        notifications: &mut self.notifications,
                        chat: &mut self.chat,
                        presence: &mut self.presence,
                        domain,
                        now,
                    },
                );
                CoreSignal::Routed(outcome)
            }
            SessionSignal::Ignored => CoreSignal::Ignored,
        }
    }

    /// Fire chat timers due at `now`.
    pub fn advance(&mut self, now: Instant) -> Vec<TypingTransition> {
        let mut sink = OutboundEmitter::new(&mut self.session);
        self.chat.fire_timers(now, &mut sink)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.chat.next_deadline()
    }

    // --- chat ------------------------------------------------------------

    pub fn join(&mut self, room: RoomId) -> EmitOutcome {
        let mut sink = OutboundEmitter::new(&mut self.session);
        self.chat.join(room, &mut sink)
    }

    pub fn leave(&mut self, room: &RoomId) -> EmitOutcome {
        let mut sink = OutboundEmitter::new(&mut self.session);
        self.chat.leave(room, &mut sink)
    }

    /// Forget a room locally (page teardown). Nothing is emitted.
    pub fn teardown_room(&mut self, room: &RoomId) {
        self.chat.teardown(room);
    }

    pub fn send_message(&mut self, room: &RoomId, body: &str) -> EmitOutcome {
        let mut sink = OutboundEmitter::new(&mut self.session);
        self.chat.send_message(room, body, &mut sink)
    }

    pub fn keystroke(&mut self, room: &RoomId, now: Instant) -> TypingTransition {
        let mut sink = OutboundEmitter::new(&mut self.session);
        self.chat.keystroke(room, now, &mut sink)
    }

    pub fn stop_typing(&mut self, room: &RoomId) -> TypingTransition {
        let mut sink = OutboundEmitter::new(&mut self.session);
        self.chat.stop_typing(room, &mut sink)
    }

    /// Re-broadcast an order status edit made from an admin view.
    pub fn emit_order_status(&mut self, order_id: &str, new_status: &str) -> EmitOutcome {
        OutboundEmitter::new(&mut self.session)
            .emit(OutboundCommand::order_status(order_id, new_status))
    }

    // --- notifications ---------------------------------------------------

    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        self.notifications.mark_read(id)
    }

    pub fn mark_all_read(&mut self) -> usize {
        self.notifications.mark_all_read()
    }

    pub fn clear_notifications(&mut self) {
        self.notifications.clear();
    }

    /// Merge records fetched from the history collaborator.
    pub fn hydrate(&mut self, history: Vec<NotificationRecord>) -> usize {
        let added = self.notifications.hydrate(history);
        tracing::debug!(added, unread = self.notifications.unread_count(), "Notification history merged");
        added
    }

    // --- accessors -------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn attempts(&self) -> u32 {
        self.session.attempts()
    }

    pub fn session(&self) -> &TransportSession<T> {
        &self.session
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn presence(&self) -> &PresenceCounter {
        &self.presence
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Credential, DomainEvent, UserId};
    use crate::infrastructure::transport::MockTransport;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn principal(user: &str) -> Principal {
        Principal::new(UserId::new(user), user.to_uppercase(), Credential::new("token").unwrap())
    }

    fn no_domain() -> Vec<DomainEvent> {
        Vec::new()
    }

    fn connected_core(transport: MockTransport) -> SyncCore<MockTransport> {
        let mut core = SyncCore::new(transport, ChatConfig::default());
        core.login(principal("me"));
        let link = core.open().unwrap();
        core.handle_transport(TransportEvent::Connected { link }, Instant::now(), &mut no_domain());
        core
    }

    fn event(link: LinkId, name: &str, payload: serde_json::Value) -> TransportEvent {
        TransportEvent::Event {
            link,
            name: name.to_string(),
            payload,
        }
    }

    #[test]
    fn test_open_without_principal_is_unauthenticated() {
        let mut transport = MockTransport::new();
        transport.expect_connect().times(0);
        let mut core = SyncCore::new(transport, ChatConfig::default());

        assert!(matches!(core.open(), Err(SyncError::Unauthenticated)));
        assert_eq!(core.state(), ConnectionState::Disconnected);
        assert_eq!(core.attempts(), 0);
    }

    #[test]
    fn test_inbound_event_is_routed() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|_, _| Ok(()));
        let mut core = connected_core(transport);
        let link = core.session().link();

        let signal = core.handle_transport(
            event(link, "notification", json!({"title": "Low Stock", "message": "Widget X", "type": "warning"})),
            Instant::now(),
            &mut no_domain(),
        );
        assert_eq!(signal, CoreSignal::Routed(RouteOutcome::Notification));
        assert_eq!(core.notifications().unread_count(), 1);
    }

    #[test]
    fn test_stale_link_events_are_ignored() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|_, _| Ok(()));
        transport.expect_disconnect().returning(|_| ());
        let mut core = connected_core(transport);
        let old = core.session().link();
        core.close();
        let new = core.open().unwrap();
        assert_ne!(old, new);

        let signal = core.handle_transport(event(old, "onlineUsersCount", json!(9)), Instant::now(), &mut no_domain());
        assert_eq!(signal, CoreSignal::Ignored);
        assert_eq!(core.presence().get(), 0);
    }

    #[test]
    fn test_reconnect_rejoins_rooms() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|_, _| Ok(()));
        transport.expect_disconnect().returning(|_| ());
        transport
            .expect_send()
            .withf(|link, name, payload| *link == 1 && name == "joinChat" && *payload == json!({"roomId": "support"}))
            .times(1)
            .returning(|_, _, _| Ok(()));
        transport
            .expect_send()
            .withf(|link, name, payload| *link == 2 && name == "joinChat" && *payload == json!({"roomId": "support"}))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut core = connected_core(transport);
        assert!(core.join(RoomId::new("support")).is_sent());

        let signal = core.handle_transport(
            TransportEvent::Closed {
                link: 1,
                failure: TransportFailure::Closed("transport close".into()),
            },
            Instant::now(),
            &mut no_domain(),
        );
        assert!(matches!(signal, CoreSignal::Failed(_)));
        assert_eq!(core.attempts(), 1);

        let link = core.open().unwrap();
        assert_eq!(
            core.handle_transport(TransportEvent::Connected { link }, Instant::now(), &mut no_domain()),
            CoreSignal::Connected
        );
        assert_eq!(core.attempts(), 0);
    }

    #[test]
    fn test_domain_events_reach_sink() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|_, _| Ok(()));
        let mut core = connected_core(transport);
        let link = core.session().link();

        let mut domain = no_domain();
        core.handle_transport(
            event(link, "orderStatusChanged", json!({"orderId": "o-1", "newStatus": "shipped"})),
            Instant::now(),
            &mut domain,
        );
        assert!(matches!(domain.as_slice(), [DomainEvent::OrderStatusChanged(p)] if p.order_id == "o-1"));
    }

    #[test]
    fn test_logout_clears_principal_state() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|_, _| Ok(()));
        transport.expect_disconnect().returning(|_| ());
        transport.expect_send().returning(|_, _, _| Ok(()));
        let mut core = connected_core(transport);
        let link = core.session().link();
        core.join(RoomId::new("support"));
        core.handle_transport(event(link, "notification", json!({"title": "t", "message": "m"})), Instant::now(), &mut no_domain());
        core.handle_transport(event(link, "onlineUsersCount", json!(4)), Instant::now(), &mut no_domain());

        core.logout();
        assert!(core.principal().is_none());
        assert!(core.notifications().is_empty());
        assert!(core.chat().room(&RoomId::new("support")).is_none());
        assert_eq!(core.presence().get(), 0);
        assert_eq!(core.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_local_typing_idle_emits_stop() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|_, _| Ok(()));
        transport.expect_send().withf(|_, name, _| name == "joinChat").returning(|_, _, _| Ok(()));
        transport
            .expect_send()
            .withf(|_, name, payload| name == "typing" && payload["isTyping"] == true)
            .times(1)
            .returning(|_, _, _| Ok(()));
        transport
            .expect_send()
            .withf(|_, name, payload| name == "typing" && payload["isTyping"] == false)
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut core = connected_core(transport);
        let room = RoomId::new("support");
        core.join(room.clone());

        let start = Instant::now();
        assert_eq!(core.keystroke(&room, start), TypingTransition::Started);
        assert_eq!(core.next_deadline(), Some(start + ChatConfig::default().local_typing_idle));
        assert_eq!(core.advance(start + ChatConfig::default().local_typing_idle), vec![TypingTransition::Expired]);
    }
}
