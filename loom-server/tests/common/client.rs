//! Minimal WebSocket test client for the Subscription Composer.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::SplitStream;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
pub struct WireEvent {
    pub event: serde_json::Value,
    pub offset: i64,
}

/// A subscriber connection to one session's replay-then-live stream.
pub struct Subscriber {
    stream: SplitStream<WsStream>,
}

impl Subscriber {
    pub async fn connect(addr: SocketAddr, session_id: &str, from_offset_exclusive: i64) -> Self {
        let url = format!(
            "ws://{addr}/api/sessions/{session_id}/subscribe?from_offset_exclusive={from_offset_exclusive}"
        );
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("failed to connect to subscription endpoint");
        let (_sink, stream) = ws.split();
        Self { stream }
    }

    pub async fn recv_event(&mut self) -> WireEvent {
        self.recv_event_timeout(Duration::from_secs(2))
            .await
            .expect("timed out waiting for an event")
    }

    pub async fn recv_event_timeout(&mut self, timeout: Duration) -> Option<WireEvent> {
        tokio::time::timeout(timeout, async {
            loop {
                match self.stream.next().await {
                    Some(Ok(tokio_tungstenite::tungstenite::Message::Text(text))) => {
                        return serde_json::from_str(&text).expect("failed to parse wire event");
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => panic!("websocket error: {e}"),
                    None => panic!("websocket closed before an event arrived"),
                }
            }
        })
        .await
        .ok()
    }
}
