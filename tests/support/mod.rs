// In-process Socket.IO server (WebSocket transport) standing in for the game server.
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

// Upper bound for any single wait in these tests.
pub const STEP: Duration = Duration::from_secs(5);

const OPEN_PACKET: &str = r#"0{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

pub struct FakeServer {
    listener: TcpListener,
    url: String,
}

impl FakeServer {
    // Bind to an ephemeral port to avoid collisions with local services.
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral test port");
        let addr = listener.local_addr().expect("get local addr");
        Self {
            listener,
            url: format!("http://{addr}"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // Next client after the WebSocket upgrade, before any Engine.IO traffic.
    pub async fn accept_raw(&self) -> Peer {
        let (stream, _) = tokio::time::timeout(STEP, self.listener.accept())
            .await
            .expect("client should connect")
            .expect("accept tcp");
        let mut request_uri = String::new();
        let socket = accept_hdr_async(stream, |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            request_uri = req.uri().to_string();
            Ok(resp)
        })
        .await
        .expect("websocket handshake");
        Peer { socket, request_uri }
    }

    // Next client with the Engine.IO open and namespace connect done.
    pub async fn accept(&self) -> Peer {
        let mut peer = self.accept_raw().await;
        peer.send_text(OPEN_PACKET).await;
        assert_eq!(peer.recv_text().await, "40", "client joins the default namespace");
        peer.send_text(r#"40{"sid":"ns-sid"}"#).await;
        peer
    }
}

pub struct Peer {
    socket: WebSocketStream<TcpStream>,
    pub request_uri: String,
}

impl Peer {
    pub async fn send_text(&mut self, text: &str) {
        self.socket
            .send(Message::text(text.to_owned()))
            .await
            .expect("send frame");
    }

    // Socket.IO event on the default namespace.
    pub async fn emit(&mut self, event: &str, data: Value) {
        let frame = format!("42{}", Value::Array(vec![Value::String(event.to_owned()), data]));
        self.send_text(&frame).await;
    }

    // Next text frame; panics on close or timeout.
    pub async fn recv_text(&mut self) -> String {
        loop {
            let frame = tokio::time::timeout(STEP, self.socket.next())
                .await
                .expect("frame should arrive")
                .expect("socket open")
                .expect("valid frame");
            if let Message::Text(text) = frame {
                return text.to_string();
            }
        }
    }

    // Next `42[...]` event as its JSON array, skipping pongs.
    pub async fn recv_event(&mut self) -> Value {
        loop {
            let text = self.recv_text().await;
            if let Some(array) = text.strip_prefix("42") {
                return serde_json::from_str(array).expect("client sends json arrays");
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}
