//! Sync core scenarios driven through a stub transport.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use storefront_realtime::application::services::{
    ChatConfig, EmitOutcome, RouteOutcome, TypingTransition,
};
use storefront_realtime::application::{CoreSignal, SyncCore};
use storefront_realtime::domain::{ConnectionState, DomainEvent, RoomId, UserId};
use storefront_realtime::infrastructure::transport::TransportEvent;
use storefront_realtime::shared::error::{SyncError, TransportFailure};
use test_case::test_case;
use tokio::time::Instant;

use crate::common::{principal, principal_with_token, StubTransport};

fn core_with(transport: &StubTransport) -> SyncCore<StubTransport> {
    let mut core = SyncCore::new(transport.clone(), ChatConfig::default());
    core.login(principal("me", "Me"));
    core
}

fn connect(core: &mut SyncCore<StubTransport>) {
    let link = core.open().unwrap();
    let signal = core.handle_transport(TransportEvent::Connected { link }, Instant::now(), &mut Vec::<DomainEvent>::new());
    assert_eq!(signal, CoreSignal::Connected);
}

fn inbound(core: &mut SyncCore<StubTransport>, name: &str, payload: serde_json::Value, now: Instant) -> CoreSignal {
    let link = core.session().link();
    core.handle_transport(
        TransportEvent::Event {
            link,
            name: name.to_string(),
            payload,
        },
        now,
        &mut Vec::<DomainEvent>::new(),
    )
}

/// Test open, connect, close, and reopen
#[test]
fn test_open_connect_close_round_trip() {
    let transport = StubTransport::new();
    let mut core = core_with(&transport);

    connect(&mut core);
    assert_eq!(core.state(), ConnectionState::Connected);

    core.close();
    assert_eq!(core.state(), ConnectionState::Disconnected);

    connect(&mut core);
    assert_eq!(core.state(), ConnectionState::Connected);
    assert_eq!(transport.connects(), vec![1, 2]);
    assert_eq!(transport.disconnects(), vec![1]);
}

/// Test that no handshake is attempted without a principal
#[test]
fn test_no_anonymous_session() {
    let transport = StubTransport::new();
    let mut core = SyncCore::new(transport.clone(), ChatConfig::default());

    assert!(matches!(core.open(), Err(SyncError::Unauthenticated)));
    assert!(transport.connects().is_empty());
}

/// Test low stock notification lands unread in the store
#[test]
fn test_low_stock_notification_scenario() {
    let transport = StubTransport::new();
    let mut core = core_with(&transport);
    connect(&mut core);

    let signal = inbound(
        &mut core,
        "notification",
        json!({"title": "Low Stock", "message": "Widget X", "type": "warning"}),
        Instant::now(),
    );

    assert_eq!(signal, CoreSignal::Routed(RouteOutcome::Notification));
    let records: Vec<_> = core.notifications().records().collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Low Stock");
    assert!(!records[0].is_read());
    assert_eq!(core.notifications().unread_count(), 1);
}

/// Test commands issued while disconnected never reach the transport
#[test]
fn test_emit_while_disconnected_never_sends() {
    let transport = StubTransport::new();
    let mut core = core_with(&transport);
    let room = RoomId::new("support");

    assert_eq!(core.join(room.clone()), EmitOutcome::NotConnected);
    assert_eq!(core.emit_order_status("o-1", "shipped"), EmitOutcome::NotConnected);
    core.open().unwrap();
    assert_eq!(core.send_message(&room, "hello"), EmitOutcome::NotConnected);

    assert!(transport.sent().is_empty());
}

/// Test rooms joined while offline are subscribed once connected
#[test]
fn test_rooms_joined_offline_are_subscribed_on_connect() {
    let transport = StubTransport::new();
    let mut core = core_with(&transport);

    core.join(RoomId::new("support"));
    connect(&mut core);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name, "joinChat");
    assert_eq!(sent[0].payload, json!({"roomId": "support"}));
}

/// Test the typing indicator lifecycle for a remote user
#[test]
fn test_typing_scenario() {
    let transport = StubTransport::new();
    let mut core = core_with(&transport);
    connect(&mut core);
    let room = RoomId::new("support");
    core.join(room.clone());

    let start = Instant::now();
    let typing = |is_typing: bool| json!({"roomId": "support", "userId": "u1", "userName": "Ana", "isTyping": is_typing});

    assert_eq!(
        inbound(&mut core, "userTyping", typing(true), start),
        CoreSignal::Routed(RouteOutcome::Typing(TypingTransition::Started))
    );
    assert_eq!(
        inbound(&mut core, "userTyping", typing(true), start + Duration::from_millis(10)),
        CoreSignal::Routed(RouteOutcome::Typing(TypingTransition::Refreshed))
    );
    assert_eq!(core.chat().room(&room).unwrap().typing_users(), vec!["Ana".to_string()]);

    inbound(&mut core, "userTyping", typing(false), start + Duration::from_millis(20));
    assert!(core.chat().room(&room).unwrap().typing_entry(&UserId::new("u1")).is_none());

    // The defused expiry has no further effect.
    assert!(core.advance(start + Duration::from_secs(10)).is_empty());
}

/// Test sending a message, then receiving its broadcast
#[test]
fn test_send_message_with_server_echo() {
    let transport = StubTransport::new();
    let mut core = core_with(&transport);
    connect(&mut core);
    let room = RoomId::new("support");
    core.join(room.clone());
    transport.clear_sent();

    assert_eq!(core.send_message(&room, "Is order #1042 shipped?"), EmitOutcome::Sent);
    let sent = transport.sent();
    assert_eq!(sent[0].name, "sendMessage");
    assert_eq!(sent[0].payload["senderName"], "Me");
    let client_id = sent[0].payload["clientId"].clone();

    inbound(
        &mut core,
        "chatMessage",
        json!({"roomId": "support", "userId": "me", "userName": "Me", "message": "Is order #1042 shipped?", "clientId": client_id}),
        Instant::now(),
    );
    inbound(
        &mut core,
        "chatMessage",
        json!({"roomId": "support", "userId": "agent-7", "userName": "Sam", "message": "Yes, this morning."}),
        Instant::now(),
    );

    let bodies: Vec<_> = core
        .chat()
        .room(&room)
        .unwrap()
        .messages()
        .iter()
        .map(|m| m.body.clone())
        .collect();
    assert_eq!(bodies, vec!["Is order #1042 shipped?", "Yes, this morning."]);
}

/// Test mark-all-read keeps the counter at zero
#[test]
fn test_mark_all_read_holds_until_next_ingest() {
    let transport = StubTransport::new();
    let mut core = core_with(&transport);
    connect(&mut core);

    for i in 0..3 {
        inbound(&mut core, "notification", json!({"id": i, "title": "t", "message": "m"}), Instant::now());
    }
    let ids: Vec<_> = core.notifications().records().map(|r| r.id.clone()).collect();

    core.mark_all_read();
    for id in &ids {
        core.mark_read(id);
        assert_eq!(core.notifications().unread_count(), 0);
    }

    inbound(&mut core, "lowStockAlert", json!({"message": "Widget X below 5"}), Instant::now());
    assert_eq!(core.notifications().unread_count(), 1);
}

/// Ways the link can go away while typing timers are pending
#[derive(Debug, Clone, Copy)]
enum Teardown {
    Close,
    LinkClosed,
    ConnectFailed,
    Logout,
}

/// Join "support" and arm a remote expiry for Ana plus the local idle timer.
fn arm_typing_timers(core: &mut SyncCore<StubTransport>, now: Instant) {
    let room = RoomId::new("support");
    core.join(room.clone());
    inbound(
        core,
        "userTyping",
        json!({"roomId": "support", "userId": "u1", "userName": "Ana", "isTyping": true}),
        now,
    );
    assert_eq!(core.keystroke(&room, now), TypingTransition::Started);
    assert_eq!(core.chat().pending_timers(), 2);
    assert!(core.next_deadline().is_some());
}

/// Test that every teardown path cancels outstanding typing timers
#[test_case(Teardown::Close ; "close")]
#[test_case(Teardown::LinkClosed ; "link closed")]
#[test_case(Teardown::ConnectFailed ; "connect failed")]
#[test_case(Teardown::Logout ; "logout")]
fn test_teardown_cancels_typing_timers(teardown: Teardown) {
    let transport = StubTransport::new();
    let mut core = core_with(&transport);
    let start = Instant::now();

    connect(&mut core);
    arm_typing_timers(&mut core, start);

    match teardown {
        Teardown::Close => core.close(),
        Teardown::LinkClosed => {
            let link = core.session().link();
            let failure = TransportFailure::Closed("ping timeout".into());
            let signal = core.handle_transport(
                TransportEvent::Closed {
                    link,
                    failure: failure.clone(),
                },
                start,
                &mut Vec::<DomainEvent>::new(),
            );
            assert_eq!(signal, CoreSignal::Failed(failure));
        }
        Teardown::ConnectFailed => {
            core.close();
            let link = core.open().unwrap();
            assert_eq!(core.keystroke(&RoomId::new("support"), start), TypingTransition::Started);
            assert!(core.next_deadline().is_some());
            let signal = core.handle_transport(
                TransportEvent::ConnectFailed {
                    link,
                    failure: TransportFailure::Timeout,
                },
                start,
                &mut Vec::<DomainEvent>::new(),
            );
            assert_eq!(signal, CoreSignal::Failed(TransportFailure::Timeout));
        }
        Teardown::Logout => core.logout(),
    }

    assert!(core.next_deadline().is_none());
    assert_eq!(core.chat().pending_timers(), 0);
    let sent = transport.sent().len();
    assert!(core.advance(start + Duration::from_secs(60)).is_empty());
    assert_eq!(transport.sent().len(), sent);
}

/// Test that a new token for the same user keeps notifications and rooms
#[test]
fn test_credential_refresh_keeps_user_state() {
    let transport = StubTransport::new();
    let mut core = core_with(&transport);
    connect(&mut core);
    let room = RoomId::new("support");
    core.join(room.clone());
    inbound(&mut core, "notification", json!({"title": "Order shipped", "message": ""}), Instant::now());
    assert_eq!(core.notifications().unread_count(), 1);

    assert!(core.refresh_credential(principal_with_token("me", "Me", "fresh-token")));
    assert_eq!(core.state(), ConnectionState::Disconnected);
    assert_eq!(core.principal().unwrap().credential.expose(), "fresh-token");
    assert_eq!(core.notifications().unread_count(), 1);
    assert!(core.chat().is_joined(&room));

    transport.clear_sent();
    connect(&mut core);
    assert_eq!(transport.tokens(), vec!["test-token", "fresh-token"]);
    assert_eq!(transport.sent_names(), vec!["joinChat"]);

    assert!(!core.refresh_credential(principal("other", "Other")));
    assert_eq!(core.principal().unwrap().user_id, UserId::new("me"));
}
