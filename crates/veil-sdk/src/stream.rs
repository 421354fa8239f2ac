//! WebSocket event feed from a remote network.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use veil_core::{ComputeEvent, ComputeId, Result, ResultBindings, VeilError};
use veil_events::EventSource;

/// Frames buffered between the socket reader and the consumer.
const CHANNEL_CAPACITY: usize = 100;

/// WebSocket message from the network.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    ComputeFinished {
        compute_id: ComputeId,
        #[serde(default)]
        results: ResultBindings,
    },
    ComputeFailed {
        compute_id: ComputeId,
        cause: String,
    },
    Ping,
}

/// Decode one text frame. Pings decode to `None`.
pub fn parse_frame(text: &str) -> Result<Option<ComputeEvent>> {
    let event = match serde_json::from_str::<WsMessage>(text)? {
        WsMessage::ComputeFinished {
            compute_id,
            results,
        } => Some(ComputeEvent::Finished {
            compute_id,
            results,
        }),
        WsMessage::ComputeFailed { compute_id, cause } => {
            Some(ComputeEvent::Failed { compute_id, cause })
        }
        WsMessage::Ping => None,
    };
    Ok(event)
}

/// Event feed URL for a network's HTTP base URL.
pub fn events_url(base_url: &str) -> String {
    format!(
        "{}/ws/events",
        base_url
            .trim_end_matches('/')
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1)
    )
}

/// Compute events read from a WebSocket.
///
/// A background task reads frames into a channel, so `next_event` is
/// cancel-safe. The source reports `StreamClosed` once the socket closes
/// and every received event has been consumed.
pub struct WsEventSource {
    receiver: mpsc::Receiver<ComputeEvent>,
    handle: tokio::task::JoinHandle<()>,
}

impl WsEventSource {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| VeilError::ConnectionError(e.to_string()))?;
        tracing::info!(url = ws_url, "event stream connected");

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            let (_, mut read) = ws_stream.split();

            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match parse_frame(&text) {
                        Ok(Some(event)) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!(error = %e, "skipping malformed event frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "event stream failed");
                        break;
                    }
                    _ => {}
                }
            }
            tracing::debug!("event stream reader finished");
        });

        Ok(Self {
            receiver: rx,
            handle,
        })
    }
}

impl Drop for WsEventSource {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[async_trait]
impl EventSource for WsEventSource {
    async fn next_event(&mut self) -> Result<ComputeEvent> {
        self.receiver.recv().await.ok_or(VeilError::StreamClosed)
    }
}
