//! Order event stream for real-time updates.

use futures::StreamExt;
use serde::Deserialize;
use stockroom_core::{FulfillmentError, Result};
use stockroom_state::OrderEvent;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

/// WebSocket message from server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    Connected { version: u64 },
    Event(OrderEvent),
}

/// Stream of order events from a node.
pub struct OrderEventStream {
    /// Store version when the stream connected.
    version: u64,
    receiver: mpsc::Receiver<OrderEvent>,
    _handle: tokio::task::JoinHandle<()>,
}

impl OrderEventStream {
    /// Connect to a node's order stream and wait for its greeting.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| FulfillmentError::ConnectionError(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        // The node greets every subscriber before any event.
        let version = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsMessage>(&text) {
                    Ok(WsMessage::Connected { version }) => break version,
                    Ok(WsMessage::Event(_)) => continue,
                    Err(e) => return Err(e.into()),
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(FulfillmentError::ConnectionError(
                        "order stream closed before greeting".to_string(),
                    ))
                }
                Some(Err(e)) => return Err(FulfillmentError::ConnectionError(e.to_string())),
                Some(Ok(_)) => continue,
            }
        };

        let (tx, rx) = mpsc::channel(100);

        let handle = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<WsMessage>(&text) {
                        Ok(WsMessage::Event(event)) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Ok(WsMessage::Connected { .. }) => {}
                        Err(e) => debug!(error = %e, "skipping unreadable stream message"),
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
        });

        Ok(Self {
            version,
            receiver: rx,
            _handle: handle,
        })
    }

    /// Store version when the stream connected.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get the next event. `None` once the node closes the stream.
    pub async fn next(&mut self) -> Option<OrderEvent> {
        self.receiver.recv().await
    }

    /// Consume into a [`futures::Stream`].
    pub fn into_stream(self) -> ReceiverStream<OrderEvent> {
        ReceiverStream::new(self.receiver)
    }
}
