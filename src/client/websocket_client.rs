/// Socket.IO transport to the game server, over a plain WebSocket.
///
/// One task owns the socket and reconnects per [`ReconnectPolicy`]; the rest
/// of the client only sees channels.
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::core::protocol::{
    ClientMessage, EnginePacket, InputEvent, ServerMessage, SocketPacket, CONNECT_FRAME, DISCONNECT_FRAME,
    ENGINE_IO_VERSION,
};
use crate::core::snapshot::Snapshot;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Engine.IO mount point when the server URL has no path.
pub const DEFAULT_SOCKET_IO_PATH: &str = "/socket.io/";

// Silence allowed before the server's `open` packet fixes the real window.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// Fixed pause before every retry.
    pub delay: Duration,
}

#[derive(Debug)]
pub enum TransportEvent {
    /// The default namespace was joined.
    Connected,
    Disconnected,
    Error(String),
    Snapshot(Box<Snapshot>),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid server url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Socket(#[from] tungstenite::Error),
    #[error("server refused the connection: {0}")]
    Rejected(String),
    #[error("no packet from server for {0:?}")]
    Timeout(Duration),
}

/// Cheap handle for queueing outbound events.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    outbox: mpsc::UnboundedSender<ClientMessage>,
}

impl TransportHandle {
    /// Handle over a caller-owned queue, with no connection task behind it.
    pub fn from_sender(outbox: mpsc::UnboundedSender<ClientMessage>) -> Self {
        Self { outbox }
    }

    /// Returns false when the connection task is gone.
    pub fn send_input(&self, event: InputEvent) -> bool {
        self.outbox.send(ClientMessage::Input(event)).is_ok()
    }

    pub fn request_new_game(&self) -> bool {
        self.outbox.send(ClientMessage::NewGame).is_ok()
    }

    pub fn is_available(&self) -> bool {
        !self.outbox.is_closed()
    }
}

/// WebSocket endpoint for a Socket.IO server URL.
///
/// `http`/`https` map onto `ws`/`wss`; an empty path becomes
/// [`DEFAULT_SOCKET_IO_PATH`]; the Engine.IO query is appended.
pub fn socket_io_url(base: &str) -> Result<String, TransportError> {
    let invalid = |reason: String| TransportError::InvalidUrl {
        url: base.to_owned(),
        reason,
    };
    let uri: Uri = base.parse().map_err(|e| invalid(format!("{e}")))?;
    let scheme = match uri.scheme_str() {
        Some("http" | "ws") => "ws",
        Some("https" | "wss") => "wss",
        Some(other) => return Err(invalid(format!("unsupported scheme `{other}`"))),
        None => return Err(invalid("missing scheme".into())),
    };
    let authority = uri.authority().ok_or_else(|| invalid("missing host".into()))?;
    let path = match uri.path() {
        "" | "/" => DEFAULT_SOCKET_IO_PATH.to_owned(),
        p if p.ends_with('/') => p.to_owned(),
        p => format!("{p}/"),
    };
    let engine_query = format!("EIO={ENGINE_IO_VERSION}&transport=websocket");
    let query = match uri.query().filter(|q| !q.is_empty()) {
        Some(extra) => format!("{extra}&{engine_query}"),
        None => engine_query,
    };
    Ok(format!("{scheme}://{authority}{path}?{query}"))
}

pub struct TransportAdapter;

impl TransportAdapter {
    /// Validates `url` and starts the connection task.
    pub fn spawn(
        url: &str,
        reconnect: ReconnectPolicy,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<(TransportHandle, JoinHandle<()>), TransportError> {
        let endpoint = socket_io_url(url)?;
        endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;

        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(endpoint, reconnect, outbox_rx, events));
        Ok((TransportHandle { outbox: outbox_tx }, task))
    }
}

enum SessionEnd {
    /// Every handle was dropped; nobody is left to talk to.
    Abandoned,
    Closed,
    Failed(TransportError),
}

async fn run_connection(
    url: String,
    reconnect: ReconnectPolicy,
    mut outbox: mpsc::UnboundedReceiver<ClientMessage>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                debug!(%url, "websocket open, waiting for handshake");
                match run_session(socket, &mut outbox, &events).await {
                    SessionEnd::Abandoned => {
                        debug!("transport handles dropped, closing connection task");
                        return;
                    }
                    SessionEnd::Closed => {
                        info!("disconnected from server");
                    }
                    SessionEnd::Failed(e) => {
                        warn!(error = %e, "socket error");
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                    }
                }
                let _ = events.send(TransportEvent::Disconnected);
            }
            Err(e) => {
                warn!(%url, error = %e, "connection failed");
                let _ = events.send(TransportEvent::Error(e.to_string()));
            }
        }

        if !reconnect.enabled || events.is_closed() {
            return;
        }
        tokio::time::sleep(reconnect.delay).await;
    }
}

async fn run_session(
    socket: Socket,
    outbox: &mut mpsc::UnboundedReceiver<ClientMessage>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();
    // Outbound events wait in the outbox until the namespace is joined.
    let mut joined = false;
    let mut window = HANDSHAKE_TIMEOUT;
    let silence = tokio::time::sleep(window);
    tokio::pin!(silence);

    loop {
        tokio::select! {
            outgoing = outbox.recv(), if joined => {
                let Some(message) = outgoing else {
                    let _ = sink.send(Message::text(DISCONNECT_FRAME.to_owned())).await;
                    let _ = sink.close().await;
                    return SessionEnd::Abandoned;
                };
                let frame = match message.to_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "dropping unencodable message");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::text(frame)).await {
                    return SessionEnd::Failed(e.into());
                }
            }

            incoming = stream.next() => {
                silence.as_mut().reset(Instant::now() + window);
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return SessionEnd::Failed(e.into()),
                };
                let packet = match EnginePacket::parse(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!(error = %e, "dropping server frame");
                        continue;
                    }
                };

                let reply = match packet {
                    EnginePacket::Open(open) => {
                        debug!(sid = %open.sid, ping_interval = open.ping_interval, "engine.io open");
                        window = open.liveness_window();
                        silence.as_mut().reset(Instant::now() + window);
                        Some(CONNECT_FRAME.to_owned())
                    }
                    EnginePacket::Ping(payload) => Some(EnginePacket::pong_frame(&payload)),
                    EnginePacket::Pong(_) | EnginePacket::Noop => None,
                    EnginePacket::Close => return SessionEnd::Closed,
                    EnginePacket::Message(SocketPacket::Connect(_)) => {
                        joined = true;
                        info!("connected to server");
                        if events.send(TransportEvent::Connected).is_err() {
                            let _ = sink.close().await;
                            return SessionEnd::Abandoned;
                        }
                        None
                    }
                    EnginePacket::Message(SocketPacket::Disconnect) => return SessionEnd::Closed,
                    EnginePacket::Message(SocketPacket::ConnectError(reason)) => {
                        return SessionEnd::Failed(TransportError::Rejected(reason.to_string()));
                    }
                    EnginePacket::Message(SocketPacket::Event { name, args }) => {
                        match ServerMessage::from_event(&name, args) {
                            Ok(Some(ServerMessage::GameState(snapshot))) => {
                                if events.send(TransportEvent::Snapshot(snapshot)).is_err() {
                                    let _ = sink.close().await;
                                    return SessionEnd::Abandoned;
                                }
                            }
                            Ok(None) => debug!(event = %name, "ignoring server event"),
                            Err(e) => warn!(event = %name, error = %e, "dropping server event"),
                        }
                        None
                    }
                    EnginePacket::Message(SocketPacket::Other(kind)) => {
                        debug!(kind, "ignoring socket.io packet");
                        None
                    }
                };

                if let Some(frame) = reply {
                    if let Err(e) = sink.send(Message::text(frame)).await {
                        return SessionEnd::Failed(e.into());
                    }
                }
            }

            _ = &mut silence => return SessionEnd::Failed(TransportError::Timeout(window)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: false,
            delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn server_urls_map_to_the_engine_io_endpoint() {
        assert_eq!(
            socket_io_url("http://127.0.0.1:5000").unwrap(),
            "ws://127.0.0.1:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_io_url("https://rally.example/").unwrap(),
            "wss://rally.example/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            socket_io_url("ws://host:9/custom?room=a").unwrap(),
            "ws://host:9/custom/?room=a&EIO=4&transport=websocket"
        );
    }

    #[tokio::test]
    async fn rejects_invalid_urls() {
        for url in ["not a url", "ftp://host/", "127.0.0.1:5000"] {
            let (tx, _rx) = mpsc::unbounded_channel();
            let err = TransportAdapter::spawn(url, policy(), tx).unwrap_err();
            assert!(matches!(err, TransportError::InvalidUrl { .. }), "{url}: {err}");
        }
    }

    #[tokio::test]
    async fn unreachable_server_without_reconnect_ends_the_task() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (handle, task) = TransportAdapter::spawn(&format!("http://127.0.0.1:{port}"), policy(), tx).unwrap();
        assert!(matches!(rx.recv().await, Some(TransportEvent::Error(_))));
        task.await.unwrap();
        assert!(!handle.is_available());
        assert!(!handle.request_new_game());
    }
}
