//! Order and line-item types.
//!
//! An [`Order`] is the persisted source of truth for both status axes. Its
//! line items are fixed at checkout; the only later mutation allowed is
//! filling in a SKU that was unknown.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::delay::{classify, DelayCategory};
use crate::error::{FulfillmentError, Result};
use crate::tracking::TrackingProjection;
use crate::types::{OrderStatus, ShippingStatus, SourceChannel};

/// Placeholder stored by legacy checkouts when the SKU was not known.
pub const SKU_SENTINEL: &str = "unknown";

/// Returns true if `sku` carries no usable value.
pub fn is_sku_sentinel(sku: &str) -> bool {
    let sku = sku.trim();
    sku.is_empty() || sku.eq_ignore_ascii_case(SKU_SENTINEL)
}

/// One line of the order manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Internal line id, unique within the order.
    #[serde(default)]
    pub id: String,

    pub product_id: String,

    /// `None` and the sentinel both mean "unknown".
    #[serde(default)]
    pub sku: Option<String>,

    pub name: String,

    /// Size/colour descriptor, free-form.
    #[serde(default)]
    pub variant: Option<String>,

    /// Units required to fulfil this line. Always positive.
    pub quantity: u32,

    /// Price of one unit, in `Order::currency`.
    #[serde(default)]
    pub unit_price: Decimal,

    #[serde(default)]
    pub image: Option<String>,
}

impl LineItem {
    pub fn new(
        id: impl Into<String>,
        product_id: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            sku: None,
            name: name.into(),
            variant: None,
            quantity,
            unit_price: Decimal::ZERO,
            image: None,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_unit_price(mut self, price: Decimal) -> Self {
        self.unit_price = price;
        self
    }

    /// The SKU if it is set and not the sentinel.
    pub fn known_sku(&self) -> Option<&str> {
        self.sku.as_deref().filter(|s| !is_sku_sentinel(s))
    }

    pub fn has_known_sku(&self) -> bool {
        self.known_sku().is_some()
    }

    /// Fill the SKU if it is currently unknown. Never overwrites a known SKU.
    ///
    /// Returns true if the SKU was filled.
    pub fn fill_sku(&mut self, sku: &str) -> bool {
        if self.has_known_sku() || is_sku_sentinel(sku) {
            return false;
        }
        self.sku = Some(sku.trim().to_string());
        true
    }

    /// Parse a line-item collection from its stored JSON form.
    ///
    /// Accepts an array, or a string holding a JSON array (legacy records were
    /// sometimes double-encoded). Lines without an `id` get
    /// `"{product_id}-{position}"`.
    pub fn parse_collection(
        raw: &serde_json::Value,
    ) -> std::result::Result<Vec<LineItem>, LineItemParseError> {
        let decoded;
        let raw = match raw {
            serde_json::Value::String(text) => {
                decoded = serde_json::from_str::<serde_json::Value>(text)
                    .map_err(|e| LineItemParseError::Malformed {
                        line: None,
                        message: e.to_string(),
                    })?;
                &decoded
            }
            other => other,
        };

        let elements = match raw {
            serde_json::Value::Array(elements) => elements,
            serde_json::Value::Null => return Err(LineItemParseError::Missing),
            other => return Err(LineItemParseError::NotAnArray(json_kind(other))),
        };

        let mut items: Vec<LineItem> = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let line = index + 1;
            let mut item: LineItem = serde_json::from_value(element.clone()).map_err(|e| {
                LineItemParseError::Malformed {
                    line: Some(line),
                    message: e.to_string(),
                }
            })?;

            if item.product_id.trim().is_empty() {
                return Err(LineItemParseError::MissingProductId { line });
            }
            if item.quantity == 0 {
                return Err(LineItemParseError::InvalidQuantity { line });
            }
            if item.id.trim().is_empty() {
                item.id = format!("{}-{}", item.product_id, line);
            }
            if items.iter().any(|existing| existing.id == item.id) {
                return Err(LineItemParseError::DuplicateLineId(item.id));
            }
            items.push(item);
        }

        Ok(items)
    }
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" {l}")).unwrap_or_default()
}

fn json_kind(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
    .to_string()
}

/// Why a stored line-item collection could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineItemParseError {
    #[error("line items are missing")]
    Missing,

    #[error("line items must be an array, got {0}")]
    NotAnArray(String),

    #[error("malformed line item{}: {message}", line_suffix(.line))]
    Malformed { line: Option<usize>, message: String },

    #[error("line item {line} has no product id")]
    MissingProductId { line: usize },

    #[error("line item {line} has a non-positive quantity")]
    InvalidQuantity { line: usize },

    #[error("duplicate line id {0}")]
    DuplicateLineId(String),
}

/// Shipping destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Destination {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    /// Province or state.
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: Option<String>,
}

/// Reference to the customer who placed the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CustomerRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Record of a refund. The payment-gateway refund itself is performed by
/// hand outside the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub refunded_at: DateTime<Utc>,
    pub refunded_by: String,
    pub restocked: bool,
    pub previous_status: OrderStatus,
}

/// A customer order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Internal identifier.
    pub id: Uuid,

    /// External, customer-facing order code.
    pub code: String,

    /// Manifest, in checkout order.
    pub line_items: Vec<LineItem>,

    pub status: OrderStatus,

    /// Only set once the order has shipped.
    pub shipping_status: Option<ShippingStatus>,

    /// Free-form label, e.g. "Standard" or "Local Hand-Delivery".
    pub shipping_method: String,

    pub courier: Option<String>,

    pub tracking_number: Option<String>,

    pub estimated_delivery: Option<NaiveDate>,

    pub shipped_on: Option<NaiveDate>,

    pub channel: SourceChannel,

    pub total: Decimal,

    pub currency: String,

    pub created_at: DateTime<Utc>,

    pub destination: Destination,

    pub customer: CustomerRef,

    /// Set when the stored line items could not be parsed and were replaced
    /// by an empty manifest.
    #[serde(default)]
    pub line_items_malformed: bool,

    #[serde(default)]
    pub refund: Option<RefundRecord>,

    /// Store version of the last write.
    #[serde(default)]
    pub version: u64,

    pub updated_at: DateTime<Utc>,

    /// Staff id of the last mutation.
    #[serde(default)]
    pub updated_by: Option<String>,
}

impl Order {
    /// Build an order from an ingested draft.
    ///
    /// A shipping status is only accepted on shipped (or refunded) orders; a
    /// shipped draft without one starts at [`ShippingStatus::Shipped`].
    ///
    /// A line-item collection that fails to parse becomes an empty manifest
    /// with [`Order::line_items_malformed`] set, so picking on a corrupted
    /// legacy order starts with nothing to scan instead of failing.
    pub fn from_draft(draft: OrderDraft) -> Result<Self> {
        let code = draft.code.trim().to_string();
        if code.is_empty() {
            return Err(FulfillmentError::Validation(
                "order code must not be empty".to_string(),
            ));
        }

        let (line_items, line_items_malformed) = match LineItem::parse_collection(&draft.line_items)
        {
            Ok(items) => (items, false),
            Err(e) => {
                warn!(
                    order_code = %code,
                    error = %e,
                    "line items unreadable, using empty manifest"
                );
                (Vec::new(), true)
            }
        };

        let shipping_status = match (draft.status, draft.shipping_status) {
            (OrderStatus::Shipped, None) => Some(ShippingStatus::Shipped),
            (OrderStatus::Shipped | OrderStatus::Refunded, status) => status,
            (_, None) => None,
            (status, Some(shipping)) => {
                return Err(FulfillmentError::Validation(format!(
                    "order {} is {} and cannot carry shipping status {}",
                    code, status, shipping
                )));
            }
        };

        let now = Utc::now();
        Ok(Self {
            id: draft.id.unwrap_or_else(Uuid::new_v4),
            code,
            line_items,
            status: draft.status,
            shipping_status,
            shipping_method: draft.shipping_method,
            courier: draft.courier,
            tracking_number: draft.tracking_number,
            estimated_delivery: draft.estimated_delivery,
            shipped_on: draft.shipped_on,
            channel: draft.channel,
            total: draft.total,
            currency: draft.currency,
            created_at: draft.created_at.unwrap_or(now),
            destination: draft.destination,
            customer: draft.customer,
            line_items_malformed,
            refund: None,
            version: 0,
            updated_at: now,
            updated_by: None,
        })
    }

    /// Calendar date the order was placed.
    pub fn placed_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    /// Total units across the manifest.
    pub fn required_units(&self) -> u32 {
        self.line_items.iter().map(|item| item.quantity).sum()
    }

    pub fn line_item(&self, line_id: &str) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.id == line_id)
    }

    /// Case-insensitive match on the external order code.
    pub fn matches_code(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code.trim())
    }

    /// Delay category as of `today`. Never stored.
    pub fn delay(&self, today: NaiveDate) -> DelayCategory {
        classify(self.shipping_status, self.estimated_delivery, today)
    }

    /// Read-only projection served to the public tracker.
    pub fn tracking_projection(&self, today: NaiveDate) -> TrackingProjection {
        TrackingProjection {
            order_code: self.code.clone(),
            placed_on: self.placed_on(),
            shipping_status: self.shipping_status,
            shipping_method: self.shipping_method.clone(),
            estimated_delivery: self.estimated_delivery,
            destination_city: self.destination.city.clone(),
            destination_region: self.destination.region.clone(),
            tracking_number: self.tracking_number.clone(),
            courier: self.courier.clone(),
            delay: self.delay(today),
        }
    }
}

/// An order as handed over by checkout or a legacy import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Keep an existing id when importing; a fresh one is assigned otherwise.
    #[serde(default)]
    pub id: Option<Uuid>,

    pub code: String,

    /// Raw line-item collection as stored by checkout.
    #[serde(default)]
    pub line_items: serde_json::Value,

    #[serde(default = "default_status")]
    pub status: OrderStatus,

    #[serde(default)]
    pub shipping_status: Option<ShippingStatus>,

    #[serde(default = "default_shipping_method")]
    pub shipping_method: String,

    #[serde(default)]
    pub courier: Option<String>,

    #[serde(default)]
    pub tracking_number: Option<String>,

    #[serde(default)]
    pub estimated_delivery: Option<NaiveDate>,

    #[serde(default)]
    pub shipped_on: Option<NaiveDate>,

    #[serde(default)]
    pub channel: SourceChannel,

    #[serde(default)]
    pub total: Decimal,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub destination: Destination,

    #[serde(default)]
    pub customer: CustomerRef,
}

fn default_status() -> OrderStatus {
    OrderStatus::Paid
}

fn default_shipping_method() -> String {
    "Standard".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

impl OrderDraft {
    /// A paid online order with no line items.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            line_items: serde_json::Value::Array(Vec::new()),
            status: default_status(),
            shipping_status: None,
            shipping_method: default_shipping_method(),
            courier: None,
            tracking_number: None,
            estimated_delivery: None,
            shipped_on: None,
            channel: SourceChannel::default(),
            total: Decimal::ZERO,
            currency: default_currency(),
            created_at: None,
            destination: Destination::default(),
            customer: CustomerRef::default(),
        }
    }

    pub fn with_line_items(mut self, items: Vec<LineItem>) -> Self {
        self.line_items = serde_json::to_value(items).unwrap_or_default();
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_customer(mut self, customer: CustomerRef) -> Self {
        self.customer = customer;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_estimated_delivery(mut self, eta: NaiveDate) -> Self {
        self.estimated_delivery = Some(eta);
        self
    }
}
