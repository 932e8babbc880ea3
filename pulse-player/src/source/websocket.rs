//! WebSocket ingestion
//!
//! One connection per session. After the socket opens, an optional subscribe
//! payload is sent, then every inbound text frame is forwarded raw. Any
//! stream error terminates the session; a server-initiated close ends it
//! cleanly. There is no reconnect.

use super::RawEvent;
use futures::{SinkExt, StreamExt};
use pulse_common::{Error, Result};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct WebSocketSource {
    url: String,
    subscribe_payload: Option<String>,
}

impl WebSocketSource {
    pub fn new(url: String, subscribe_payload: Option<String>) -> Self {
        Self {
            url,
            subscribe_payload,
        }
    }

    pub async fn run(self, tx: mpsc::Sender<RawEvent>, cancel: CancellationToken) -> Result<()> {
        let (mut socket, _response) = tokio::select! {
            connected = connect_async(self.url.as_str()) => connected
                .map_err(|e| Error::Transport(format!("WebSocket connect to {} failed: {e}", self.url)))?,
            _ = cancel.cancelled() => return Ok(()),
        };
        info!(url = self.url.as_str(), "WebSocket connected");

        if let Some(payload) = &self.subscribe_payload {
            debug!("sending subscription payload");
            socket
                .send(Message::Text(payload.clone()))
                .await
                .map_err(|e| Error::Transport(format!("failed to send subscribe payload: {e}")))?;
        }

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                frame = socket.next() => match frame {
                    None => {
                        debug!("WebSocket stream ended");
                        break Ok(());
                    }
                    Some(Ok(Message::Text(text))) => {
                        if tx.send(RawEvent::new(text)).await.is_err() {
                            break Ok(());
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket closed by server");
                        break Ok(());
                    }
                    // binary, ping and pong frames carry no events
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        break Err(Error::Transport(format!("WebSocket stream error: {e}")));
                    }
                }
            }
        };

        let _ = socket.close(None).await;
        result
    }
}
