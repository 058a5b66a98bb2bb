/// Socket.IO (protocol 5) over Engine.IO v4, WebSocket transport only.
///
/// Every text frame is one Engine.IO packet: a type digit plus payload.
/// Socket.IO packets travel inside Engine.IO `4` (message) packets, so an
/// event on the default namespace reads `42["game_state",{...}]`.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::snapshot::Snapshot;

/// Engine.IO protocol revision sent in the handshake query.
pub const ENGINE_IO_VERSION: u8 = 4;
/// Socket.IO `CONNECT` for the default namespace.
pub const CONNECT_FRAME: &str = "40";
/// Socket.IO `DISCONNECT` for the default namespace.
pub const DISCONNECT_FRAME: &str = "41";

const EVENT_PREFIX: &str = "42";
const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed server frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode client frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed packet `{0}`")]
    Packet(String),
}

fn malformed(frame: &str) -> ProtocolError {
    ProtocolError::Packet(frame.chars().take(64).collect())
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

impl OpenInfo {
    /// Longest the server may stay silent before the link counts as dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    /// `upgrade` and `noop`; meaningless on a WebSocket-only link.
    Noop,
}

impl EnginePacket {
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or_else(|| malformed(frame))?;
        let body = chars.as_str();
        match kind {
            '0' => serde_json::from_str(body)
                .map(EnginePacket::Open)
                .map_err(ProtocolError::Decode),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_owned())),
            '3' => Ok(EnginePacket::Pong(body.to_owned())),
            '4' => SocketPacket::parse(body).map(EnginePacket::Message),
            '5' | '6' => Ok(EnginePacket::Noop),
            _ => Err(malformed(frame)),
        }
    }

    /// Reply to a server `ping`, echoing its payload.
    pub fn pong_frame(payload: &str) -> String {
        format!("3{payload}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace joined; carries `{"sid": ...}` from the server.
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value> },
    ConnectError(Value),
    /// Acks and binary packets, which the game never sends.
    Other(u32),
}

impl SocketPacket {
    fn parse(body: &str) -> Result<Self, ProtocolError> {
        let mut chars = body.chars();
        let kind = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| malformed(body))?;
        let rest = skip_namespace(chars.as_str());
        match kind {
            0 if rest.is_empty() => Ok(SocketPacket::Connect(None)),
            0 => serde_json::from_str(rest)
                .map(|v| SocketPacket::Connect(Some(v)))
                .map_err(ProtocolError::Decode),
            1 => Ok(SocketPacket::Disconnect),
            2 => {
                // An ack id may sit between the namespace and the array.
                let json = rest.trim_start_matches(|c: char| c.is_ascii_digit());
                let mut args: Vec<Value> = serde_json::from_str(json).map_err(ProtocolError::Decode)?;
                if args.is_empty() {
                    return Err(malformed(body));
                }
                match args.remove(0) {
                    Value::String(name) => Ok(SocketPacket::Event { name, args }),
                    _ => Err(malformed(body)),
                }
            }
            4 if rest.is_empty() => Ok(SocketPacket::ConnectError(Value::Null)),
            4 => serde_json::from_str(rest)
                .map(SocketPacket::ConnectError)
                .map_err(ProtocolError::Decode),
            3 | 5 | 6 => Ok(SocketPacket::Other(kind)),
            _ => Err(malformed(body)),
        }
    }
}

/// Drops a `/namespace,` prefix.
fn skip_namespace(rest: &str) -> &str {
    if !rest.starts_with('/') {
        return rest;
    }
    rest.find(',').map_or("", |i| &rest[i + 1..])
}

/// Server → client events the game understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    GameState(Box<Snapshot>),
}

impl ServerMessage {
    /// `Ok(None)` for events this client has no use for.
    pub fn from_event(name: &str, args: Vec<Value>) -> Result<Option<Self>, ProtocolError> {
        match name {
            "game_state" => {
                let data = args.into_iter().next().unwrap_or(Value::Null);
                let snapshot: Snapshot = serde_json::from_value(data).map_err(ProtocolError::Decode)?;
                Ok(Some(ServerMessage::GameState(Box::new(snapshot))))
            }
            _ => Ok(None),
        }
    }
}

/// Client → server events.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Input(InputEvent),
    NewGame,
}

impl ClientMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Input(_) => "input",
            ClientMessage::NewGame => "new_game",
        }
    }

    /// Socket.IO event frame on the default namespace.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        let args = match self {
            ClientMessage::Input(event) => serde_json::to_string(&(self.event_name(), event)),
            ClientMessage::NewGame => serde_json::to_string(&(self.event_name(),)),
        }
        .map_err(ProtocolError::Encode)?;
        Ok(format!("{EVENT_PREFIX}{args}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Keydown,
    Keyup,
}

/// A raw key event; `key` uses DOM `KeyboardEvent.key` names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    #[serde(rename = "type")]
    pub action: KeyAction,
    pub key: String,
}

impl InputEvent {
    pub fn keydown(key: impl Into<String>) -> Self {
        Self {
            action: KeyAction::Keydown,
            key: key.into(),
        }
    }

    pub fn keyup(key: impl Into<String>) -> Self {
        Self {
            action: KeyAction::Keyup,
            key: key.into(),
        }
    }
}
