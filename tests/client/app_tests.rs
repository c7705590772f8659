//! Event loop tests on paused tokio time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use storefront_realtime::config::Settings;
use storefront_realtime::domain::{
    ConnectionState, DomainEvent, NotificationHistory, NotificationId, NotificationKind,
    NotificationRecord, Principal, RoomId,
};
use storefront_realtime::infrastructure::reconnect::ReconnectPolicy;
use storefront_realtime::infrastructure::transport::TransportEvent;
use storefront_realtime::shared::error::{SyncError, TransportFailure};
use storefront_realtime::startup::{Application, ClientHandle, StatusSnapshot};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

use crate::common::{principal, principal_with_token, StubTransport};

struct Harness {
    transport: StubTransport,
    events: mpsc::UnboundedSender<TransportEvent>,
    principal: watch::Sender<Option<Principal>>,
    handle: ClientHandle,
    status: watch::Receiver<StatusSnapshot>,
    task: JoinHandle<Result<(), SyncError>>,
}

impl Harness {
    fn start(configure: impl FnOnce(Application<StubTransport>) -> Application<StubTransport>) -> Self {
        let settings = Settings::defaults().unwrap();
        let transport = StubTransport::new();
        let (events, events_rx) = mpsc::unbounded_channel();
        let (principal_tx, principal_rx) = watch::channel(Some(principal("me", "Me")));

        let app = configure(Application::with_transport(
            transport.clone(),
            events_rx,
            &settings,
            principal_rx,
        ));
        let handle = app.handle();
        let status = handle.watch_status();
        let task = tokio::spawn(app.run_until_stopped());

        Self {
            transport,
            events,
            principal: principal_tx,
            handle,
            status,
            task,
        }
    }

    async fn wait_for(&mut self, predicate: impl FnMut(&StatusSnapshot) -> bool) -> StatusSnapshot {
        *self.status.wait_for(predicate).await.unwrap()
    }

    fn link(&self) -> u64 {
        self.transport.connects().last().copied().unwrap_or_default()
    }

    fn emit(&self, event: TransportEvent) {
        self.events.send(event).unwrap();
    }

    async fn connect(&mut self) {
        self.wait_for(|s| s.connection == ConnectionState::Connecting).await;
        self.emit(TransportEvent::Connected { link: self.link() });
        self.wait_for(|s| s.connection == ConnectionState::Connected).await;
    }

    async fn stop(self) {
        assert_ok!(self.handle.shutdown());
        assert_ok!(self.task.await.unwrap());
    }
}

/// Test that a dropped link is retried after a backoff delay
#[tokio::test(start_paused = true)]
async fn test_closed_link_is_retried() {
    let mut h = Harness::start(|app| app);
    h.connect().await;

    h.emit(TransportEvent::Closed {
        link: 1,
        failure: TransportFailure::Closed("transport close".into()),
    });
    let status = h.wait_for(|s| s.connection == ConnectionState::Disconnected).await;
    assert_eq!(status.attempts, 1);

    // Paused time auto-advances through the backoff delay.
    h.wait_for(|s| s.connection == ConnectionState::Connecting).await;
    assert_eq!(h.transport.connects(), vec![1, 2]);

    h.connect().await;
    assert_eq!(h.handle.status().attempts, 0);
    h.stop().await;
}

/// Test that exhausted attempts surface a permanent failure
#[tokio::test(start_paused = true)]
async fn test_exhausted_attempts_are_permanent() {
    let mut h = Harness::start(|app| {
        app.with_policy(ReconnectPolicy {
            max_attempts: 2,
            ..ReconnectPolicy::default()
        })
    });

    for attempt in 1..=3u32 {
        h.wait_for(|s| s.connection == ConnectionState::Connecting).await;
        h.emit(TransportEvent::ConnectFailed {
            link: h.link(),
            failure: TransportFailure::Timeout,
        });
        h.wait_for(|s| s.connection == ConnectionState::Disconnected && s.attempts == attempt)
            .await;
    }

    let status = h.wait_for(|s| s.permanently_failed).await;
    assert_eq!(status.attempts, 3);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.connects(), vec![1, 2, 3]);

    // A manual retry starts over.
    h.handle.reconnect().unwrap();
    h.wait_for(|s| s.connection == ConnectionState::Connecting && !s.permanently_failed)
        .await;
    h.stop().await;
}

/// Test that inbound events update the published status and domain stream
#[tokio::test(start_paused = true)]
async fn test_events_reach_status_and_subscribers() {
    let mut h = Harness::start(|app| app);
    let mut domain = h.handle.subscribe();
    h.connect().await;

    h.emit(TransportEvent::Event {
        link: 1,
        name: "notification".into(),
        payload: json!({"title": "Order shipped", "message": "Order #1042 is on its way", "type": "order"}),
    });
    h.emit(TransportEvent::Event {
        link: 1,
        name: "onlineUsersCount".into(),
        payload: json!(12),
    });
    h.emit(TransportEvent::Event {
        link: 1,
        name: "stockUpdated".into(),
        payload: json!({"productId": "p-9", "newStock": 3}),
    });

    let status = h.wait_for(|s| s.online == 12).await;
    assert_eq!(status.unread, 1);
    assert!(matches!(domain.recv().await.unwrap(), DomainEvent::StockUpdated(p) if p.new_stock == 3));

    let records = h.handle.notifications().await.unwrap();
    assert_eq!(records[0].kind, NotificationKind::OrderUpdate);
    assert_eq!(records[0].order_reference().as_deref(), Some("1042"));

    h.handle.mark_all_read().unwrap();
    h.wait_for(|s| s.unread == 0).await;
    h.stop().await;
}

/// Test that the local typing indicator stops after the idle period
#[tokio::test(start_paused = true)]
async fn test_local_typing_stops_when_idle() {
    let mut h = Harness::start(|app| app);
    h.connect().await;
    let room = RoomId::new("support");
    assert!(h.handle.join(room.clone()).await.unwrap().is_sent());

    h.handle.keystroke(room.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    // Round-trip through the loop so every queued command has been applied.
    h.handle.typing_users(room).await.unwrap();

    let typing: Vec<_> = h
        .transport
        .sent()
        .into_iter()
        .filter(|frame| frame.name == "typing")
        .map(|frame| frame.payload["isTyping"].clone())
        .collect();
    assert_eq!(typing, vec![json!(true), json!(false)]);
    h.stop().await;
}

/// Test that a principal change tears down the old session
#[tokio::test(start_paused = true)]
async fn test_principal_change_starts_new_session() {
    let mut h = Harness::start(|app| app);
    h.connect().await;
    h.emit(TransportEvent::Event {
        link: 1,
        name: "notification".into(),
        payload: json!({"title": "For me", "message": ""}),
    });
    h.wait_for(|s| s.unread == 1).await;

    h.principal.send(Some(principal("other", "Other"))).unwrap();
    let status = h.wait_for(|s| s.connection == ConnectionState::Connecting && s.unread == 0).await;
    assert_eq!(status.online, 0);
    assert_eq!(h.transport.disconnects(), vec![1]);

    h.principal.send(None).unwrap();
    h.wait_for(|s| s.connection == ConnectionState::Disconnected).await;
    h.stop().await;
}

/// Test that a rejected credential is not retried
#[tokio::test(start_paused = true)]
async fn test_rejected_credential_is_not_retried() {
    let mut h = Harness::start(|app| app);
    h.wait_for(|s| s.connection == ConnectionState::Connecting).await;
    h.emit(TransportEvent::ConnectFailed {
        link: 1,
        failure: TransportFailure::Rejected("Authentication error".into()),
    });

    h.wait_for(|s| s.permanently_failed).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.connects(), vec![1]);
    h.stop().await;
}

struct FixedHistory(Vec<NotificationRecord>);

#[async_trait]
impl NotificationHistory for FixedHistory {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<NotificationRecord>, SyncError> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

/// Test that history is merged behind live notifications
#[tokio::test(start_paused = true)]
async fn test_history_is_hydrated_after_login() {
    let history = FixedHistory(vec![
        NotificationRecord::new(NotificationId::Server("h-2".into()), NotificationKind::Generic, "older", ""),
        NotificationRecord::new(NotificationId::Server("h-1".into()), NotificationKind::Generic, "oldest", ""),
    ]);
    let mut h = Harness::start(|app| app.with_history(Arc::new(history)));

    let status = h.wait_for(|s| s.unread == 2).await;
    assert_eq!(status.connection, ConnectionState::Connecting);
    let titles: Vec<_> = h
        .handle
        .notifications()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert_eq!(titles, vec!["older", "oldest"]);
    h.stop().await;
}

/// Answers the first fetch late with one record; later fetches are empty.
#[derive(Default)]
struct SlowFirstHistory {
    calls: AtomicUsize,
}

#[async_trait]
impl NotificationHistory for SlowFirstHistory {
    async fn fetch_recent(&self, _limit: usize) -> Result<Vec<NotificationRecord>, SyncError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return Ok(Vec::new());
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(vec![NotificationRecord::new(
            NotificationId::Server("h-77".into()),
            NotificationKind::OrderUpdate,
            "Your order #77 shipped",
            "",
        )])
    }
}

/// Test that history fetched for one principal never lands in the next one's store
#[tokio::test(start_paused = true)]
async fn test_history_from_previous_principal_is_discarded() {
    let mut h = Harness::start(|app| app.with_history(Arc::new(SlowFirstHistory::default())));
    h.wait_for(|s| s.connection == ConnectionState::Connecting).await;

    h.principal.send(None).unwrap();
    h.principal.send(Some(principal("other", "Other"))).unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert!(h.handle.notifications().await.unwrap().is_empty());
    assert_eq!(h.status.borrow().unread, 0);
    h.stop().await;
}

/// Test that a refreshed token for the same user keeps their data and reconnects
#[tokio::test(start_paused = true)]
async fn test_credential_refresh_keeps_notifications() {
    let mut h = Harness::start(|app| app);
    h.connect().await;
    h.emit(TransportEvent::Event {
        link: 1,
        name: "notification".into(),
        payload: json!({"title": "Still mine", "message": ""}),
    });
    h.wait_for(|s| s.unread == 1).await;

    h.principal
        .send(Some(principal_with_token("me", "Me", "fresh-token")))
        .unwrap();
    let status = h.wait_for(|s| s.connection == ConnectionState::Connecting).await;
    assert_eq!(status.unread, 1);
    assert_eq!(h.transport.disconnects(), vec![1]);
    assert_eq!(h.transport.connects(), vec![1, 2]);
    assert_eq!(h.transport.tokens(), vec!["test-token", "fresh-token"]);

    h.emit(TransportEvent::Connected { link: 2 });
    let status = h.wait_for(|s| s.connection == ConnectionState::Connected).await;
    assert_eq!(status.unread, 1);
    h.stop().await;
}
