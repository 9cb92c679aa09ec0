//! Order event subscriptions.
//!
//! Every state transition is published here, so workstations can react to
//! changes instead of waiting for the next poll of the full listing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use stockroom_core::{Order, OrderStatus, ShippingStatus};
use tokio::sync::{broadcast, RwLock};
use tracing::warn;
use uuid::Uuid;

/// An order change event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: Uuid,

    pub order_code: String,

    /// What changed.
    pub change: OrderChange,

    /// Store version after the change.
    pub version: u64,

    /// Staff id that caused the change, if any.
    pub actor: Option<String>,

    /// Timestamp of the change.
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    /// Event describing `change` to `order` (taken after the write).
    pub fn new(order: &Order, change: OrderChange, actor: Option<&str>) -> Self {
        Self {
            order_id: order.id,
            order_code: order.code.clone(),
            change,
            version: order.version,
            actor: actor.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// The change carried by an [`OrderEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderChange {
    Created,
    StatusChanged {
        from: OrderStatus,
        to: OrderStatus,
    },
    ShippingStatusChanged {
        from: Option<ShippingStatus>,
        to: ShippingStatus,
    },
    TrackingUpdated {
        courier: Option<String>,
        tracking_number: Option<String>,
    },
    EtaUpdated {
        estimated_delivery: Option<NaiveDate>,
    },
    LineItemsEnriched {
        filled: usize,
    },
    PickingProgress {
        line_id: String,
        scanned: u32,
        required: u32,
    },
    PickingAbandoned,
    Refunded {
        restocked: bool,
    },
    Deleted,
}

impl OrderChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            OrderChange::Created => ChangeKind::Created,
            OrderChange::StatusChanged { .. } => ChangeKind::Status,
            OrderChange::ShippingStatusChanged { .. } => ChangeKind::Shipping,
            OrderChange::TrackingUpdated { .. } | OrderChange::EtaUpdated { .. } => {
                ChangeKind::Shipping
            }
            OrderChange::LineItemsEnriched { .. }
            | OrderChange::PickingProgress { .. }
            | OrderChange::PickingAbandoned => ChangeKind::Picking,
            OrderChange::Refunded { .. } => ChangeKind::Status,
            OrderChange::Deleted => ChangeKind::Deleted,
        }
    }
}

/// Coarse grouping of changes, for filtering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Status,
    Shipping,
    Picking,
    Deleted,
}

/// Filter for subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    /// Only events for this order.
    pub order_id: Option<Uuid>,

    /// Change kinds to watch.
    pub kinds: Option<Vec<ChangeKind>>,
}

impl SubscriptionFilter {
    /// Create a filter for a single order.
    pub fn order(order_id: Uuid) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    /// Create a filter for specific change kinds.
    pub fn kinds(kinds: Vec<ChangeKind>) -> Self {
        Self {
            kinds: Some(kinds),
            ..Default::default()
        }
    }

    /// Check if an event matches this filter.
    pub fn matches(&self, event: &OrderEvent) -> bool {
        if let Some(order_id) = self.order_id {
            if event.order_id != order_id {
                return false;
            }
        }

        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.change.kind()) {
                return false;
            }
        }

        true
    }
}

/// A subscription to order events.
pub struct OrderSubscription {
    /// Unique ID for this subscription.
    pub id: Uuid,

    /// Filter for this subscription.
    pub filter: SubscriptionFilter,

    /// Receiver for events.
    pub receiver: broadcast::Receiver<OrderEvent>,
}

impl OrderSubscription {
    /// Next event matching the filter. `None` once the bus is gone.
    ///
    /// A subscriber that falls behind skips the events it missed; the next
    /// snapshot poll reconciles it.
    pub async fn next(&mut self) -> Option<OrderEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subscription = %self.id, skipped, "order event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Fan-out bus for order events.
pub struct EventBus {
    /// Sender for broadcasting events.
    sender: broadcast::Sender<OrderEvent>,

    /// Active subscriptions.
    subscriptions: Arc<RwLock<HashMap<Uuid, SubscriptionFilter>>>,
}

impl EventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    /// Create a bus that buffers up to `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to order events with a filter.
    pub async fn subscribe(&self, filter: SubscriptionFilter) -> OrderSubscription {
        let id = Uuid::new_v4();
        let receiver = self.sender.subscribe();

        let mut subs = self.subscriptions.write().await;
        subs.insert(id, filter.clone());

        OrderSubscription {
            id,
            filter,
            receiver,
        }
    }

    /// Unsubscribe from order events.
    pub async fn unsubscribe(&self, id: Uuid) {
        let mut subs = self.subscriptions.write().await;
        subs.remove(&id);
    }

    /// Publish an order event.
    pub fn publish(&self, event: OrderEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscriptions.
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::OrderDraft;

    fn event(order: &Order, change: OrderChange) -> OrderEvent {
        OrderEvent::new(order, change, Some("ana"))
    }

    #[test]
    fn test_filter_order() {
        let a = Order::from_draft(OrderDraft::new("MA-1")).unwrap();
        let b = Order::from_draft(OrderDraft::new("MA-2")).unwrap();
        let filter = SubscriptionFilter::order(a.id);

        assert!(filter.matches(&event(&a, OrderChange::Created)));
        assert!(!filter.matches(&event(&b, OrderChange::Created)));
    }

    #[test]
    fn test_filter_kinds() {
        let order = Order::from_draft(OrderDraft::new("MA-1")).unwrap();
        let filter = SubscriptionFilter::kinds(vec![ChangeKind::Shipping]);

        assert!(filter.matches(&event(
            &order,
            OrderChange::ShippingStatusChanged {
                from: Some(ShippingStatus::Shipped),
                to: ShippingStatus::InTransit,
            }
        )));
        assert!(!filter.matches(&event(
            &order,
            OrderChange::StatusChanged {
                from: OrderStatus::Paid,
                to: OrderStatus::Fetching,
            }
        )));
    }

    #[tokio::test]
    async fn test_subscribe_receives_matching_events() {
        let bus = EventBus::new();
        let a = Order::from_draft(OrderDraft::new("MA-1")).unwrap();
        let b = Order::from_draft(OrderDraft::new("MA-2")).unwrap();

        let mut sub = bus.subscribe(SubscriptionFilter::order(b.id)).await;
        assert_eq!(bus.subscription_count().await, 1);

        bus.publish(event(&a, OrderChange::Created));
        bus.publish(event(&b, OrderChange::Deleted));

        let received = sub.next().await.unwrap();
        assert_eq!(received.order_id, b.id);
        assert_eq!(received.change, OrderChange::Deleted);

        bus.unsubscribe(sub.id).await;
        assert_eq!(bus.subscription_count().await, 0);
    }

    #[test]
    fn test_event_wire_shape() {
        let order = Order::from_draft(OrderDraft::new("MA-1")).unwrap();
        let json = serde_json::to_value(event(
            &order,
            OrderChange::StatusChanged {
                from: OrderStatus::Fetching,
                to: OrderStatus::Packaging,
            },
        ))
        .unwrap();
        assert_eq!(json["change"]["type"], "status_changed");
        assert_eq!(json["change"]["to"], "packaging");
        assert_eq!(json["actor"], "ana");
    }
}
