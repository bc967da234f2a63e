//! Reconnecting diff stream
//!
//! Wraps [`WebSocketClient`] as a [`StreamSource`]: reconnects with backoff
//! and reports every lost connection before resuming delivery.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::WebSocketClient;
use crate::backoff::Backoff;
use crate::config::Config;
use crate::error::{ReplicaError, Result};
use crate::parser::ParsedMessage;
use crate::sync::{StreamEvent, StreamSource};

/// Binance `{symbol}@depth` stream with automatic reconnection
pub struct BinanceStream {
    client: WebSocketClient,
    backoff: Backoff,
    max_reconnect_attempts: u32,
    recv_timeout: Duration,
    failed_attempts: u32,
}

impl BinanceStream {
    pub fn new(config: &Config) -> Self {
        Self {
            client: WebSocketClient::new(&config.stream_url()),
            backoff: Backoff::new(config.reconnect_delay(), config.max_backoff()),
            max_reconnect_attempts: config.max_reconnect_attempts,
            recv_timeout: config.recv_timeout(),
            failed_attempts: 0,
        }
    }

    /// Connect, backing off between failures
    async fn ensure_connected(&mut self) -> Result<()> {
        while !self.client.is_connected() {
            match self.client.connect().await {
                Ok(()) => {
                    if self.failed_attempts > 0 {
                        info!(
                            previous_attempts = self.failed_attempts,
                            "WebSocket reconnected, resetting reconnect counter"
                        );
                    }
                    self.failed_attempts = 0;
                    self.backoff.reset();
                }
                Err(e) => {
                    self.failed_attempts += 1;
                    if self.failed_attempts >= self.max_reconnect_attempts {
                        error!(
                            url = %self.client.url(),
                            attempts = self.failed_attempts,
                            error = %e,
                            "Giving up on WebSocket connection"
                        );
                        return Err(ReplicaError::MaxReconnectAttemptsExceeded(
                            self.failed_attempts,
                        ));
                    }

                    let delay = self.backoff.next_delay();
                    warn!(
                        attempt = self.failed_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Reconnecting after error..."
                    );
                    sleep(delay).await;
                }
            }
        }
        Ok(())
    }

    /// Close the socket and produce the disconnect notification
    async fn disconnect(&mut self, reason: String) -> StreamEvent {
        self.client.close().await;
        StreamEvent::Disconnected { reason }
    }

    pub async fn close(&mut self) {
        self.client.close().await;
    }
}

#[async_trait]
impl StreamSource for BinanceStream {
    async fn next_event(&mut self) -> Result<StreamEvent> {
        self.ensure_connected().await?;
        let mut last_message = Instant::now();

        loop {
            match timeout(self.recv_timeout, self.client.next_text()).await {
                Ok(Ok(Some(text))) => {
                    last_message = Instant::now();
                    match ParsedMessage::parse(&text)? {
                        ParsedMessage::DepthUpdate(update) => {
                            return Ok(StreamEvent::Diff(update.into()));
                        }
                        ParsedMessage::Unknown(msg) => {
                            debug!(msg = %msg, "Ignoring non-depth message");
                        }
                    }
                }
                Ok(Ok(None)) => continue,
                Ok(Err(ReplicaError::Disconnected(reason))) => {
                    return Ok(StreamEvent::Disconnected { reason });
                }
                Ok(Err(e)) => {
                    return Ok(self.disconnect(e.to_string()).await);
                }
                Err(_) => {
                    warn!(
                        last_message_secs = last_message.elapsed().as_secs(),
                        "No message received within timeout, sending keepalive"
                    );
                    if let Err(e) = self.client.keepalive().await {
                        return Ok(self
                            .disconnect(format!("{} ({})", ReplicaError::ConnectionTimeout, e))
                            .await);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::Message;

    fn test_config(ws_endpoint: String) -> Config {
        Config {
            ws_endpoint,
            reconnect_delay_ms: 1,
            max_backoff_ms: 2,
            max_reconnect_attempts: 2,
            ..Config::default()
        }
    }

    /// Accept one connection per batch, send the batch, then close it
    async fn serve(batches: Vec<Vec<&'static str>>) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            for batch in batches {
                let (tcp, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                for text in batch {
                    ws.send(Message::Text(text.to_string())).await.unwrap();
                }
                let _ = ws.close(None).await;
                // Wait for the client's close reply
                while let Some(Ok(_)) = ws.next().await {}
            }
        });
        (format!("ws://{}", addr), handle)
    }

    fn diff_ids(event: StreamEvent) -> (u64, u64) {
        match event {
            StreamEvent::Diff(diff) => (diff.first_update_id, diff.last_update_id),
            other => panic!("Expected Diff, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_reported_before_reconnected_events() {
        let (endpoint, server) = serve(vec![
            vec![
                r#"{"result": null, "id": 1}"#,
                r#"{"e": "depthUpdate", "E": 1, "s": "BTCUSDT", "U": 1, "u": 2, "b": [["100", "1"]], "a": []}"#,
                r#"{"U": 3, "u": "x", "b": [], "a": []}"#,
            ],
            vec![r#"{"U": 10, "u": 12, "b": [], "a": [["101", "0"]]}"#],
        ])
        .await;
        let mut stream = BinanceStream::new(&test_config(endpoint));

        assert_eq!(diff_ids(stream.next_event().await.unwrap()), (1, 2));

        let err = stream.next_event().await.unwrap_err();
        assert!(matches!(err, ReplicaError::Protocol(_)));
        assert!(err.is_recoverable());

        assert_eq!(
            stream.next_event().await.unwrap(),
            StreamEvent::Disconnected {
                reason: "close frame".to_string()
            }
        );

        assert_eq!(diff_ids(stream.next_event().await.unwrap()), (10, 12));

        stream.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_max_reconnect_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);
        let mut stream = BinanceStream::new(&test_config(endpoint));

        let err = stream.next_event().await.unwrap_err();
        assert!(matches!(err, ReplicaError::MaxReconnectAttemptsExceeded(2)));
        assert!(!err.is_recoverable());
    }
}
