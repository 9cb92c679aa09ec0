//! Point-in-time views of the order store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockroom_core::Order;
use uuid::Uuid;

/// A point-in-time snapshot of every order.
///
/// This is what the dashboard polls: a full listing stamped with the store
/// version, so a client can skip re-rendering when nothing changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// Unique ID for this snapshot.
    pub id: Uuid,

    /// Version of the store at snapshot time.
    pub version: u64,

    /// Timestamp when the snapshot was taken.
    pub taken_at: DateTime<Utc>,

    /// Current revision of every order, newest first.
    pub orders: Vec<Order>,
}

impl OrderSnapshot {
    /// Get an order from the snapshot.
    pub fn get(&self, id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.matches_code(code))
    }

    /// Get the number of orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// True if the store has moved on since `version`.
    pub fn is_newer_than(&self, version: u64) -> bool {
        self.version > version
    }
}
