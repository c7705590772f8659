//! Socket.IO v4 Wire Codec
//!
//! Text frames of the Engine.IO v4 websocket transport, carrying Socket.IO
//! v4 packets for the default namespace.
//!
//! ```text
//! 0{"sid":..,"pingInterval":25000,"pingTimeout":20000}   engine OPEN
//! 2 / 3                                                  engine PING / PONG
//! 40{"token":"<credential>"}                             socket CONNECT (client)
//! 40{"sid":".."}                                         socket CONNECT (server ack)
//! 42["notification",{..}]                                socket EVENT
//! 44{"message":"Authentication error"}                   socket CONNECT_ERROR
//! ```

use serde::Deserialize;
use serde_json::{json, Value};

use crate::shared::error::TransportFailure;

/// Engine.IO packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineOp {
    Open = 0,
    Close = 1,
    Ping = 2,
    Pong = 3,
    Message = 4,
    Upgrade = 5,
    Noop = 6,
}

impl EngineOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Open),
            '1' => Some(Self::Close),
            '2' => Some(Self::Ping),
            '3' => Some(Self::Pong),
            '4' => Some(Self::Message),
            '5' => Some(Self::Upgrade),
            '6' => Some(Self::Noop),
            _ => None,
        }
    }
}

/// Socket.IO packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SocketOp {
    Connect = 0,
    Disconnect = 1,
    Event = 2,
    Ack = 3,
    ConnectError = 4,
    BinaryEvent = 5,
    BinaryAck = 6,
}

impl SocketOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Connect),
            '1' => Some(Self::Disconnect),
            '2' => Some(Self::Event),
            '3' => Some(Self::Ack),
            '4' => Some(Self::ConnectError),
            '5' => Some(Self::BinaryEvent),
            '6' => Some(Self::BinaryAck),
            _ => None,
        }
    }
}

/// Engine OPEN payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(OpenPayload),
    Close,
    Ping,
    Pong,
    Noop,
    Connected { sid: Option<String> },
    Disconnected,
    Event { name: String, payload: Value },
    ConnectError { message: String },
    /// Acks, binary packets, and packets for other namespaces
    Ignored,
}

/// Decode one text frame
pub fn decode(text: &str) -> Result<Frame, TransportFailure> {
    let mut chars = text.chars();
    let engine = chars
        .next()
        .and_then(EngineOp::from_char)
        .ok_or_else(|| protocol(format!("bad engine packet: {:?}", truncate(text))))?;
    let rest = chars.as_str();

    match engine {
        EngineOp::Open => {
            let open = serde_json::from_str(rest)
                .map_err(|e| protocol(format!("bad open payload: {}", e)))?;
            Ok(Frame::Open(open))
        }
        EngineOp::Close => Ok(Frame::Close),
        EngineOp::Ping => Ok(Frame::Ping),
        EngineOp::Pong => Ok(Frame::Pong),
        EngineOp::Noop | EngineOp::Upgrade => Ok(Frame::Noop),
        EngineOp::Message => decode_socket_packet(rest),
    }
}

fn decode_socket_packet(text: &str) -> Result<Frame, TransportFailure> {
    let mut chars = text.chars();
    let op = chars
        .next()
        .and_then(SocketOp::from_char)
        .ok_or_else(|| protocol(format!("bad socket packet: {:?}", truncate(text))))?;
    let mut rest = chars.as_str();

    // Namespace: "/admin," prefix; only the default namespace is ours.
    if rest.starts_with('/') {
        let (namespace, tail) = match rest.find(',') {
            Some(pos) => (&rest[..pos], &rest[pos + 1..]),
            None => (rest, ""),
        };
        if namespace != "/" {
            return Ok(Frame::Ignored);
        }
        rest = tail;
    }

    match op {
        SocketOp::Connect => {
            let sid = if rest.is_empty() {
                None
            } else {
                serde_json::from_str::<Value>(rest)
                    .ok()
                    .and_then(|v| v.get("sid").and_then(Value::as_str).map(String::from))
            };
            Ok(Frame::Connected { sid })
        }
        SocketOp::Disconnect => Ok(Frame::Disconnected),
        SocketOp::ConnectError => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| match v {
                    Value::String(s) => Some(s),
                    other => other.get("message").and_then(Value::as_str).map(String::from),
                })
                .unwrap_or_else(|| "connection refused".to_string());
            Ok(Frame::ConnectError { message })
        }
        SocketOp::Event => {
            // Optional ack id precedes the JSON array.
            let body = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let args: Vec<Value> = serde_json::from_str(body)
                .map_err(|e| protocol(format!("bad event payload: {}", e)))?;
            let mut args = args.into_iter();
            let name = match args.next() {
                Some(Value::String(name)) => name,
                _ => return Err(protocol("event without a name".to_string())),
            };
            let payload = args.next().unwrap_or(Value::Null);
            Ok(Frame::Event { name, payload })
        }
        SocketOp::Ack | SocketOp::BinaryEvent | SocketOp::BinaryAck => Ok(Frame::Ignored),
    }
}

/// Encode the CONNECT packet carrying the handshake credential
pub fn encode_connect(token: &str) -> String {
    format!(
        "{}{}{}",
        EngineOp::Message as u8,
        SocketOp::Connect as u8,
        json!({ "token": token })
    )
}

/// Encode an EVENT packet
pub fn encode_event(name: &str, payload: &Value) -> String {
    format!(
        "{}{}{}",
        EngineOp::Message as u8,
        SocketOp::Event as u8,
        json!([name, payload])
    )
}

/// Encode the client DISCONNECT packet
pub fn encode_disconnect() -> String {
    format!("{}{}", EngineOp::Message as u8, SocketOp::Disconnect as u8)
}

/// Encode an engine PONG
pub fn encode_pong() -> String {
    (EngineOp::Pong as u8).to_string()
}

fn protocol(message: String) -> TransportFailure {
    TransportFailure::Protocol(message)
}

fn truncate(text: &str) -> String {
    text.chars().take(32).collect()
}
