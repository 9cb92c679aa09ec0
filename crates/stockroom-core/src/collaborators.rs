//! Interfaces to the systems the fulfillment core talks to but does not own.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Product catalog, queried for the live SKU of a product.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// `Ok(None)` when the product exists but has no SKU, or is unknown.
    async fn sku_for_product(&self, product_id: &str) -> Result<Option<String>>;
}

/// Customer notification sender (email, SMS, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}

/// Inventory system, told to take stock back on refund.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn restock(&self, order_code: &str, lines: &[RestockLine]) -> Result<()>;
}

/// Source of "today". Injected so every date decision is reproducible.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the running host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Message templates known to the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    OrderShipped,
}

impl NotificationTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::OrderShipped => "order_shipped",
        }
    }
}

/// A notification to send to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub template: NotificationTemplate,
    pub order_id: Uuid,
    pub order_code: String,
}

/// Quantity to return to stock for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockLine {
    pub product_id: String,
    pub sku: Option<String>,
    pub quantity: u32,
}
