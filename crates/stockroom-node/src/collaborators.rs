//! In-process collaborator implementations.
//!
//! The node ships with a catalog seeded at startup, and a notifier and an
//! inventory that only log. Real integrations plug in through the same
//! traits.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use stockroom_core::{Catalog, Inventory, Notification, Notifier, RestockLine, Result};
use tokio::sync::RwLock;
use tracing::info;

/// How many recent calls the logging collaborators keep for inspection.
pub const RECENT_LIMIT: usize = 256;

fn remember<T>(recent: &mut VecDeque<T>, item: T) {
    if recent.len() == RECENT_LIMIT {
        recent.pop_front();
    }
    recent.push_back(item);
}

/// Product catalog held in memory: product id -> SKU.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    skus: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, product_id: impl Into<String>, sku: impl Into<String>) {
        let mut skus = self.skus.write().await;
        skus.insert(product_id.into(), sku.into());
    }

    pub async fn extend(&self, entries: impl IntoIterator<Item = (String, String)>) {
        let mut skus = self.skus.write().await;
        skus.extend(entries);
    }

    pub async fn len(&self) -> usize {
        self.skus.read().await.len()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn sku_for_product(&self, product_id: &str) -> Result<Option<String>> {
        Ok(self.skus.read().await.get(product_id).cloned())
    }
}

/// Notifier that logs each notification and remembers the most recent ones.
#[derive(Clone, Default)]
pub struct LogNotifier {
    sent: Arc<RwLock<VecDeque<Notification>>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last [`RECENT_LIMIT`] notifications, oldest first.
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        info!(
            recipient = %notification.recipient,
            template = notification.template.as_str(),
            order_code = %notification.order_code,
            "📧 notification sent"
        );
        remember(&mut *self.sent.write().await, notification);
        Ok(())
    }
}

/// A restock request as received by [`LogInventory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestockRequest {
    pub order_code: String,
    pub lines: Vec<RestockLine>,
}

/// Inventory that logs restock requests and remembers the most recent ones.
#[derive(Clone, Default)]
pub struct LogInventory {
    requests: Arc<RwLock<VecDeque<RestockRequest>>>,
}

impl LogInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn requests(&self) -> Vec<RestockRequest> {
        self.requests.read().await.iter().cloned().collect()
    }
}

#[async_trait]
impl Inventory for LogInventory {
    async fn restock(&self, order_code: &str, lines: &[RestockLine]) -> Result<()> {
        let units: u32 = lines.iter().map(|l| l.quantity).sum();
        info!(order_code, lines = lines.len(), units, "📦 restock requested");
        let request = RestockRequest {
            order_code: order_code.to_string(),
            lines: lines.to_vec(),
        };
        remember(&mut *self.requests.write().await, request);
        Ok(())
    }
}
