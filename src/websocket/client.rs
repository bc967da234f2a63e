//! WebSocket client for the Binance diff stream
//!
//! Handles connection and message reception for a single stream URL.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::error::{ReplicaError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client for a single connection
pub struct WebSocketClient {
    stream: Option<WsStream>,
    url: String,
}

impl WebSocketClient {
    /// Create a new WebSocket client
    pub fn new(url: &str) -> Self {
        Self {
            stream: None,
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect to the WebSocket endpoint
    pub async fn connect(&mut self) -> Result<()> {
        info!(url = %self.url, "Connecting to Binance WebSocket");

        let (ws_stream, response) = connect_async(self.url.as_str()).await.map_err(|e| {
            ReplicaError::WebSocketConnection(format!("Failed to connect: {}", e))
        })?;

        info!(status = ?response.status(), "WebSocket connected");
        self.stream = Some(ws_stream);

        Ok(())
    }

    /// Next text payload from the stream.
    ///
    /// `Ok(None)` means a control frame was consumed. A close frame, the end
    /// of the stream or a transport error drops the connection and returns
    /// [`ReplicaError::Disconnected`].
    pub async fn next_text(&mut self) -> Result<Option<String>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ReplicaError::Disconnected("not connected".to_string()))?;

        let reason = match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Some(text)),
            Some(Ok(Message::Ping(_))) => {
                // tungstenite queues the pong until the next flush
                if let Err(e) = stream.flush().await {
                    debug!(error = %e, "Failed to flush pong");
                }
                return Ok(None);
            }
            Some(Ok(Message::Binary(data))) => {
                debug!(len = data.len(), "Ignoring binary frame");
                return Ok(None);
            }
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => return Ok(None),
            Some(Ok(Message::Close(Some(frame)))) => {
                format!("close frame {}: {}", u16::from(frame.code), frame.reason)
            }
            Some(Ok(Message::Close(None))) => "close frame".to_string(),
            Some(Err(e)) => format!("transport error: {}", e),
            None => "stream ended".to_string(),
        };

        Err(self.drop_connection(reason))
    }

    /// Probe an idle connection
    pub async fn keepalive(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ReplicaError::Disconnected("not connected".to_string()))?;

        if let Err(e) = stream.send(Message::Ping(Vec::new())).await {
            return Err(self.drop_connection(format!("keepalive failed: {}", e)));
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Send a close frame and forget the connection
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!(url = %self.url, error = %e, "Close handshake failed");
            }
        }
    }

    fn drop_connection(&mut self, reason: String) -> ReplicaError {
        warn!(url = %self.url, reason = %reason, "WebSocket connection lost");
        self.stream = None;
        ReplicaError::Disconnected(reason)
    }
}
