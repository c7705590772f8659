//! WebSocket Transport
//!
//! Socket.IO v4 over `tokio-tungstenite`. Each link runs in its own task:
//! the task performs the handshake, then multiplexes outbound frames,
//! inbound frames, and the server ping deadline with `tokio::select!`.
//! Everything it learns is reported on the shared event channel.

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::codec::{self, Frame};
use super::{LinkId, Transport, TransportEvent};
use crate::config::TransportSettings;
use crate::domain::Credential;
use crate::shared::error::TransportFailure;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Time a torn-down link gets to send its DISCONNECT before being aborted
const CLOSE_GRACE: Duration = Duration::from_millis(500);

struct ActiveLink {
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

/// WebSocket transport for the storefront Socket.IO endpoint
pub struct WebSocketTransport {
    endpoint: Url,
    handshake_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
    links: HashMap<LinkId, ActiveLink>,
}

impl WebSocketTransport {
    /// Create a transport reporting to `events`.
    ///
    /// Must be used from within a tokio runtime: `connect` spawns the link task.
    pub fn new(
        settings: &TransportSettings,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self, TransportFailure> {
        Ok(Self {
            endpoint: endpoint_url(&settings.url, &settings.path)?,
            handshake_timeout: Duration::from_millis(settings.handshake_timeout_ms),
            events,
            links: HashMap::new(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, link: LinkId, credential: &Credential) -> Result<(), TransportFailure> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(
            link,
            self.endpoint.clone(),
            credential.expose().to_string(),
            self.handshake_timeout,
            self.events.clone(),
            outbound_rx,
        ));
        self.links.insert(
            link,
            ActiveLink {
                outbound: outbound_tx,
                task,
            },
        );
        Ok(())
    }

    fn send(&mut self, link: LinkId, name: &str, payload: &Value) -> Result<(), TransportFailure> {
        let active = self
            .links
            .get(&link)
            .ok_or_else(|| TransportFailure::Closed("link is gone".to_string()))?;
        active
            .outbound
            .send(codec::encode_event(name, payload))
            .map_err(|_| TransportFailure::Closed("link task stopped".to_string()))
    }

    fn disconnect(&mut self, link: LinkId) {
        if let Some(active) = self.links.remove(&link) {
            // Dropping the sender lets the task say goodbye; abort covers a stuck handshake.
            drop(active.outbound);
            let task = active.task;
            tokio::spawn(async move {
                tokio::time::sleep(CLOSE_GRACE).await;
                task.abort();
            });
            tracing::debug!(link, "WebSocket link torn down");
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        for (_, active) in self.links.drain() {
            active.task.abort();
        }
    }
}

/// Build `{url}{path}?EIO=4&transport=websocket`
pub fn endpoint_url(base: &str, path: &str) -> Result<Url, TransportFailure> {
    let mut url = Url::parse(base)
        .map_err(|e| TransportFailure::Network(format!("Invalid URL: {}", e)))?;

    match url.scheme() {
        "http" => url.set_scheme("ws").ok(),
        "https" => url.set_scheme("wss").ok(),
        "ws" | "wss" => Some(()),
        other => {
            return Err(TransportFailure::Network(format!(
                "Unsupported URL scheme: {}",
                other
            )))
        }
    };

    url.set_path(path);
    url.query_pairs_mut()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");
    Ok(url)
}

async fn run_link(
    link: LinkId,
    endpoint: Url,
    token: String,
    handshake_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    tracing::debug!(link, endpoint = %endpoint, "Starting WebSocket handshake");

    let (mut ws, ping_window) = match timeout(handshake_timeout, handshake(&endpoint, &token)).await {
        Ok(Ok(established)) => established,
        Ok(Err(failure)) => {
            let _ = events.send(TransportEvent::ConnectFailed { link, failure });
            return;
        }
        Err(_) => {
            let _ = events.send(TransportEvent::ConnectFailed {
                link,
                failure: TransportFailure::Timeout,
            });
            return;
        }
    };

    if events.send(TransportEvent::Connected { link }).is_err() {
        return;
    }

    let mut ping_deadline = Instant::now() + ping_window;

    let failure = loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(text) => {
                        if let Err(e) = ws.send(Message::Text(text.into())).await {
                            break TransportFailure::Network(format!("send failed: {}", e));
                        }
                    }
                    None => {
                        // Link torn down locally.
                        let _ = ws.send(Message::Text(codec::encode_disconnect().into())).await;
                        let _ = ws.close(None).await;
                        tracing::debug!(link, "WebSocket link closed locally");
                        return;
                    }
                }
            }

            message = ws.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        break TransportFailure::Closed("server closed the connection".to_string());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break TransportFailure::Network(e.to_string()),
                };

                match codec::decode(text.as_str()) {
                    Ok(Frame::Ping) => {
                        ping_deadline = Instant::now() + ping_window;
                        if let Err(e) = ws.send(Message::Text(codec::encode_pong().into())).await {
                            break TransportFailure::Network(format!("pong failed: {}", e));
                        }
                    }
                    Ok(Frame::Event { name, payload }) => {
                        if events.send(TransportEvent::Event { link, name, payload }).is_err() {
                            return;
                        }
                    }
                    Ok(Frame::Disconnected) | Ok(Frame::Close) => {
                        break TransportFailure::Closed("server disconnected the socket".to_string());
                    }
                    Ok(other) => {
                        tracing::trace!(link, frame = ?other, "Ignoring control frame");
                    }
                    Err(failure) => {
                        tracing::debug!(link, error = %failure, "Undecodable frame dropped");
                    }
                }
            }

            _ = sleep_until(ping_deadline) => {
                break TransportFailure::Closed("ping timeout".to_string());
            }
        }
    };

    tracing::debug!(link, error = %failure, "WebSocket link lost");
    let _ = events.send(TransportEvent::Closed { link, failure });
}

/// Engine OPEN, then Socket.IO CONNECT with the credential.
/// Returns the stream and the server ping window.
async fn handshake(endpoint: &Url, token: &str) -> Result<(WsStream, Duration), TransportFailure> {
    let (mut ws, _) = connect_async(endpoint.as_str())
        .await
        .map_err(|e| TransportFailure::Network(format!("WebSocket connection error: {}", e)))?;

    let open = match next_frame(&mut ws).await? {
        Frame::Open(open) => open,
        other => {
            return Err(TransportFailure::Protocol(format!(
                "expected engine open, got {:?}",
                other
            )))
        }
    };
    let ping_window = Duration::from_millis(open.ping_interval + open.ping_timeout);

    ws.send(Message::Text(codec::encode_connect(token).into()))
        .await
        .map_err(|e| TransportFailure::Network(format!("send failed: {}", e)))?;

    loop {
        match next_frame(&mut ws).await? {
            Frame::Connected { sid } => {
                tracing::debug!(sid = ?sid, engine_sid = %open.sid, "Socket.IO namespace connected");
                return Ok((ws, ping_window));
            }
            Frame::ConnectError { message } => return Err(TransportFailure::Rejected(message)),
            Frame::Ping => {
                ws.send(Message::Text(codec::encode_pong().into()))
                    .await
                    .map_err(|e| TransportFailure::Network(format!("pong failed: {}", e)))?;
            }
            Frame::Close | Frame::Disconnected => {
                return Err(TransportFailure::Closed("closed during handshake".to_string()))
            }
            _ => continue,
        }
    }
}

async fn next_frame(ws: &mut WsStream) -> Result<Frame, TransportFailure> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return codec::decode(text.as_str()),
            Some(Ok(Message::Close(_))) | None => {
                return Err(TransportFailure::Closed("closed during handshake".to_string()))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportFailure::Network(e.to_string())),
        }
    }
}
