//! Order event stream.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use stockroom_state::{OrderEvent, SubscriptionFilter};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Query parameters for `/ws/orders`.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    /// Only events for this order.
    pub order_id: Option<Uuid>,
}

/// Message sent over the order stream.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// First message after connecting.
    Connected { version: u64 },
    /// An order changed.
    Event(OrderEvent),
}

/// Order event stream.
pub async fn order_stream(
    ws: WebSocketUpgrade,
    Query(params): Query<StreamParams>,
    State(state): State<AppState>,
) -> Response {
    let filter = SubscriptionFilter {
        order_id: params.order_id,
        ..Default::default()
    };
    ws.on_upgrade(move |socket| handle_order_stream(socket, filter, state))
}

async fn handle_order_stream(mut socket: WebSocket, filter: SubscriptionFilter, state: AppState) {
    let bus = state.fulfillment.bus().clone();
    let mut subscription = bus.subscribe(filter).await;

    let hello = StreamMessage::Connected {
        version: state.fulfillment.version().await,
    };
    if !send(&mut socket, &hello).await {
        bus.unsubscribe(subscription.id).await;
        return;
    }

    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else { break };
                if !send(&mut socket, &StreamMessage::Event(event)).await {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "order stream closed by client error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    bus.unsubscribe(subscription.id).await;
}

/// False once the client is gone.
async fn send(socket: &mut WebSocket, message: &StreamMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "could not encode stream message");
            true
        }
    }
}
