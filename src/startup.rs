//! Application Startup
//!
//! Builds the client and runs its single event loop. The loop owns the
//! [`SyncCore`] and multiplexes transport events, handle commands, principal
//! changes, chat timers, and reconnect delays with `tokio::select!`.
//! Everything outside the loop talks to it through a [`ClientHandle`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};

use crate::application::services::{ChatConfig, EmitOutcome};
use crate::application::{CoreSignal, SyncCore};
use crate::config::Settings;
use crate::domain::{
    ChatMessage, ConnectionState, DomainEvent, NotificationHistory, NotificationId,
    NotificationRecord, Principal, RoomId,
};
use crate::infrastructure::metrics;
use crate::infrastructure::reconnect::ReconnectPolicy;
use crate::infrastructure::transport::{Transport, TransportEvent, WebSocketTransport};
use crate::shared::error::{SyncError, TransportFailure};

/// Capacity of the domain event broadcast channel
const DOMAIN_EVENT_CAPACITY: usize = 256;

/// Records requested from the history collaborator after login
const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Point-in-time view of the client, published after every loop turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusSnapshot {
    pub connection: ConnectionState,
    pub attempts: u32,
    /// Reconnect attempts exhausted or credential rejected
    pub permanently_failed: bool,
    pub unread: usize,
    pub online: u64,
}

/// Requests sent from a [`ClientHandle`] to the event loop
#[derive(Debug)]
pub enum ClientCommand {
    Join {
        room: RoomId,
        reply: oneshot::Sender<EmitOutcome>,
    },
    Leave {
        room: RoomId,
        reply: oneshot::Sender<EmitOutcome>,
    },
    TeardownRoom {
        room: RoomId,
    },
    SendMessage {
        room: RoomId,
        body: String,
        reply: oneshot::Sender<EmitOutcome>,
    },
    Keystroke {
        room: RoomId,
    },
    StopTyping {
        room: RoomId,
    },
    OrderStatus {
        order_id: String,
        new_status: String,
        reply: oneshot::Sender<EmitOutcome>,
    },
    MarkRead {
        id: NotificationId,
    },
    MarkAllRead,
    ClearNotifications,
    RefreshHistory {
        limit: usize,
    },
    Notifications {
        reply: oneshot::Sender<Vec<NotificationRecord>>,
    },
    Messages {
        room: RoomId,
        reply: oneshot::Sender<Vec<ChatMessage>>,
    },
    TypingUsers {
        room: RoomId,
        reply: oneshot::Sender<Vec<String>>,
    },
    /// Retry after a permanent failure
    Reconnect,
    Shutdown,
}

/// Cloneable handle to a running client
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    domain: broadcast::Sender<DomainEvent>,
    status: watch::Receiver<StatusSnapshot>,
}

impl ClientHandle {
    fn send(&self, command: ClientCommand) -> Result<(), SyncError> {
        self.commands.send(command).map_err(|_| SyncError::Stopped)
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> ClientCommand,
    ) -> Result<R, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await.map_err(|_| SyncError::Stopped)
    }

    pub async fn join(&self, room: RoomId) -> Result<EmitOutcome, SyncError> {
        self.request(|reply| ClientCommand::Join { room, reply }).await
    }

    pub async fn leave(&self, room: RoomId) -> Result<EmitOutcome, SyncError> {
        self.request(|reply| ClientCommand::Leave { room, reply }).await
    }

    pub fn teardown_room(&self, room: RoomId) -> Result<(), SyncError> {
        self.send(ClientCommand::TeardownRoom { room })
    }

    pub async fn send_message(
        &self,
        room: RoomId,
        body: impl Into<String>,
    ) -> Result<EmitOutcome, SyncError> {
        let body = body.into();
        self.request(|reply| ClientCommand::SendMessage { room, body, reply })
            .await
    }

    pub fn keystroke(&self, room: RoomId) -> Result<(), SyncError> {
        self.send(ClientCommand::Keystroke { room })
    }

    pub fn stop_typing(&self, room: RoomId) -> Result<(), SyncError> {
        self.send(ClientCommand::StopTyping { room })
    }

    pub async fn emit_order_status(
        &self,
        order_id: impl Into<String>,
        new_status: impl Into<String>,
    ) -> Result<EmitOutcome, SyncError> {
        let (order_id, new_status) = (order_id.into(), new_status.into());
        self.request(|reply| ClientCommand::OrderStatus {
            order_id,
            new_status,
            reply,
        })
        .await
    }

    pub fn mark_read(&self, id: NotificationId) -> Result<(), SyncError> {
        self.send(ClientCommand::MarkRead { id })
    }

    pub fn mark_all_read(&self) -> Result<(), SyncError> {
        self.send(ClientCommand::MarkAllRead)
    }

    pub fn clear_notifications(&self) -> Result<(), SyncError> {
        self.send(ClientCommand::ClearNotifications)
    }

    pub fn refresh_history(&self, limit: usize) -> Result<(), SyncError> {
        self.send(ClientCommand::RefreshHistory { limit })
    }

    /// Notification records, most recent first
    pub async fn notifications(&self) -> Result<Vec<NotificationRecord>, SyncError> {
        self.request(|reply| ClientCommand::Notifications { reply }).await
    }

    pub async fn messages(&self, room: RoomId) -> Result<Vec<ChatMessage>, SyncError> {
        self.request(|reply| ClientCommand::Messages { room, reply }).await
    }

    pub async fn typing_users(&self, room: RoomId) -> Result<Vec<String>, SyncError> {
        self.request(|reply| ClientCommand::TypingUsers { room, reply })
            .await
    }

    pub fn reconnect(&self) -> Result<(), SyncError> {
        self.send(ClientCommand::Reconnect)
    }

    pub fn shutdown(&self) -> Result<(), SyncError> {
        self.send(ClientCommand::Shutdown)
    }

    /// Subscribe to order and stock events
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.domain.subscribe()
    }

    pub fn status(&self) -> StatusSnapshot {
        *self.status.borrow()
    }

    /// Watch status snapshots as they change
    pub fn watch_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }
}

type HistoryResult = Result<Vec<NotificationRecord>, SyncError>;

/// Application instance
pub struct Application<T> {
    core: SyncCore<T>,
    policy: ReconnectPolicy,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    commands_tx: mpsc::UnboundedSender<ClientCommand>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    principal: watch::Receiver<Option<Principal>>,
    domain: broadcast::Sender<DomainEvent>,
    status: watch::Sender<StatusSnapshot>,
    history: Option<Arc<dyn NotificationHistory>>,
    history_tx: mpsc::UnboundedSender<(u64, HistoryResult)>,
    history_rx: mpsc::UnboundedReceiver<(u64, HistoryResult)>,
    /// Bumped whenever the principal's data is dropped; history fetched
    /// under an older epoch is discarded.
    session_epoch: u64,
    reconnect_at: Option<Instant>,
    permanently_failed: bool,
}

impl Application<WebSocketTransport> {
    /// Build the client on the WebSocket transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(
        settings: &Settings,
        principal: watch::Receiver<Option<Principal>>,
    ) -> Result<Self, SyncError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = WebSocketTransport::new(&settings.transport, events_tx)?;
        tracing::info!(endpoint = %transport.endpoint(), "WebSocket transport created");
        Ok(Self::with_transport(transport, events_rx, settings, principal))
    }
}

impl<T: Transport> Application<T> {
    /// Build the client on any transport reporting to `transport_events`.
    pub fn with_transport(
        transport: T,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        settings: &Settings,
        principal: watch::Receiver<Option<Principal>>,
    ) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (history_tx, history_rx) = mpsc::unbounded_channel();
        let (domain, _) = broadcast::channel(DOMAIN_EVENT_CAPACITY);
        let (status, _) = watch::channel(StatusSnapshot::default());

        Self {
            core: SyncCore::new(transport, ChatConfig::from_settings(&settings.chat)),
            policy: ReconnectPolicy::from_settings(&settings.reconnect),
            transport_events,
            commands_tx,
            commands,
            principal,
            domain,
            status,
            history: None,
            history_tx,
            history_rx,
            session_epoch: 0,
            reconnect_at: None,
            permanently_failed: false,
        }
    }

    /// Fetch notification history from `history` after every login.
    pub fn with_history(mut self, history: Arc<dyn NotificationHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Replace the reconnect policy.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            commands: self.commands_tx.clone(),
            domain: self.domain.clone(),
            status: self.status.subscribe(),
        }
    }

    /// Run the event loop until [`ClientHandle::shutdown`] is called.
    pub async fn run_until_stopped(mut self) -> Result<(), SyncError> {
        let initial = self.principal.borrow_and_update().clone();
        self.apply_principal(initial);
        let mut principal_open = true;

        loop {
            self.publish_status();
            let timer = self.core.next_deadline();
            let reconnect = self.reconnect_at;

            tokio::select! {
                Some(event) = self.transport_events.recv() => {
                    self.on_transport(event);
                }
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                changed = self.principal.changed(), if principal_open => match changed {
                    Ok(()) => {
                        let principal = self.principal.borrow_and_update().clone();
                        self.apply_principal(principal);
                    }
                    Err(_) => {
                        tracing::debug!("Principal source dropped; keeping current principal");
                        principal_open = false;
                    }
                },
                Some((epoch, result)) = self.history_rx.recv() => {
                    self.on_history(epoch, result);
                }
                _ = sleep_until_some(timer), if timer.is_some() => {
                    self.core.advance(Instant::now());
                }
                _ = sleep_until_some(reconnect), if reconnect.is_some() => {
                    self.reconnect_at = None;
                    self.open();
                }
            }
        }

        tracing::info!("Client shutting down");
        self.core.logout();
        self.publish_status();
        Ok(())
    }

    fn apply_principal(&mut self, principal: Option<Principal>) {
        if self.core.principal() == principal.as_ref() {
            return;
        }

        self.reconnect_at = None;
        self.permanently_failed = false;

        if let Some(principal) = &principal {
            if self.core.refresh_credential(principal.clone()) {
                self.open();
                return;
            }
        }

        self.session_epoch += 1;
        self.core.logout();

        if let Some(principal) = principal {
            self.core.login(principal);
            self.open();
            self.fetch_history(DEFAULT_HISTORY_LIMIT);
        }
    }

    fn open(&mut self) {
        match self.core.open() {
            Ok(link) => tracing::debug!(link, "Handshake started"),
            Err(SyncError::Unauthenticated) => {}
            Err(SyncError::Transport(failure)) => self.schedule_reconnect(&failure),
            Err(e) => tracing::error!(error = %e, "Failed to open transport session"),
        }
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match self.core.handle_transport(event, Instant::now(), &mut self.domain) {
            CoreSignal::Connected => {
                self.reconnect_at = None;
                self.permanently_failed = false;
            }
            CoreSignal::Failed(failure) => self.schedule_reconnect(&failure),
            CoreSignal::Routed(_) | CoreSignal::Ignored => {}
        }
    }

    fn schedule_reconnect(&mut self, failure: &TransportFailure) {
        if !failure.is_retryable() {
            tracing::error!(error = %failure, "Credential rejected; destroying session");
            self.session_epoch += 1;
            self.core.logout();
            self.permanently_failed = true;
            return;
        }

        let attempt = self.core.attempts();
        match self.policy.delay_for(attempt) {
            Some(delay) => {
                metrics::record_reconnect_attempt();
                tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
                self.reconnect_at = Some(Instant::now() + delay);
            }
            None => {
                tracing::error!(attempts = attempt, "Reconnect attempts exhausted");
                self.permanently_failed = true;
            }
        }
    }

    fn fetch_history(&self, limit: usize) {
        let Some(history) = self.history.clone() else {
            return;
        };
        let results = self.history_tx.clone();
        let epoch = self.session_epoch;
        tokio::spawn(async move {
            let _ = results.send((epoch, history.fetch_recent(limit).await));
        });
    }

    fn on_history(&mut self, epoch: u64, result: HistoryResult) {
        if epoch != self.session_epoch {
            tracing::debug!(
                epoch,
                current = self.session_epoch,
                "Discarding history from a previous session"
            );
            return;
        }
        match result {
            Ok(records) => {
                self.core.hydrate(records);
            }
            Err(e) => tracing::warn!(error = %e, "Notification history fetch failed"),
        }
    }

    fn on_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Join { room, reply } => {
                let _ = reply.send(self.core.join(room));
            }
            ClientCommand::Leave { room, reply } => {
                let _ = reply.send(self.core.leave(&room));
            }
            ClientCommand::TeardownRoom { room } => self.core.teardown_room(&room),
            ClientCommand::SendMessage { room, body, reply } => {
                let _ = reply.send(self.core.send_message(&room, &body));
            }
            ClientCommand::Keystroke { room } => {
                self.core.keystroke(&room, Instant::now());
            }
            ClientCommand::StopTyping { room } => {
                self.core.stop_typing(&room);
            }
            ClientCommand::OrderStatus {
                order_id,
                new_status,
                reply,
            } => {
                let _ = reply.send(self.core.emit_order_status(&order_id, &new_status));
            }
            ClientCommand::MarkRead { id } => {
                self.core.mark_read(&id);
            }
            ClientCommand::MarkAllRead => {
                self.core.mark_all_read();
            }
            ClientCommand::ClearNotifications => self.core.clear_notifications(),
            ClientCommand::RefreshHistory { limit } => self.fetch_history(limit),
            ClientCommand::Notifications { reply } => {
                let _ = reply.send(self.core.notifications().records().cloned().collect());
            }
            ClientCommand::Messages { room, reply } => {
                let messages = self
                    .core
                    .chat()
                    .room(&room)
                    .map(|room| room.messages().to_vec())
                    .unwrap_or_default();
                let _ = reply.send(messages);
            }
            ClientCommand::TypingUsers { room, reply } => {
                let users = self
                    .core
                    .chat()
                    .room(&room)
                    .map(|room| room.typing_users())
                    .unwrap_or_default();
                let _ = reply.send(users);
            }
            ClientCommand::Reconnect => {
                if self.core.principal().is_none() {
                    // A rejected credential destroyed the session; re-adopt the current one.
                    let principal = self.principal.borrow().clone();
                    if let Some(principal) = principal {
                        self.core.login(principal);
                    }
                }
                self.permanently_failed = false;
                self.reconnect_at = None;
                self.open();
            }
            ClientCommand::Shutdown => {}
        }
    }

    fn publish_status(&self) {
        let snapshot = StatusSnapshot {
            connection: self.core.state(),
            attempts: self.core.attempts(),
            permanently_failed: self.permanently_failed,
            unread: self.core.notifications().unread_count(),
            online: self.core.presence().get(),
        };
        self.status.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
