//! # Stockroom Core
//!
//! Core types for the Stockroom fulfillment pipeline.
//!
//! This crate provides the fundamental building blocks:
//! - [`Order`] and [`LineItem`] - the persisted order record and its manifest
//! - [`OrderStatus`] / [`ShippingStatus`] - the two independent status axes
//! - [`classify`] - the delay classifier
//! - [`EtaPolicy`] - business-day ETA defaults
//! - [`FulfillmentError`] - error types

pub mod calendar;
pub mod collaborators;
pub mod delay;
pub mod error;
pub mod order;
pub mod principal;
pub mod tracking;
pub mod types;

// Re-exports for convenience
pub use calendar::EtaPolicy;
pub use collaborators::{
    Catalog, Clock, FixedClock, Inventory, Notification, NotificationTemplate, Notifier,
    RestockLine, SystemClock,
};
pub use delay::{classify, DelayCategory, DelaySummary};
pub use error::{FulfillmentError, Result};
pub use order::{
    is_sku_sentinel, CustomerRef, Destination, LineItem, LineItemParseError, Order, OrderDraft,
    RefundRecord, SKU_SENTINEL,
};
pub use principal::Principal;
pub use tracking::TrackingProjection;
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::delay::{DelayCategory, DelaySummary};
    pub use crate::error::{FulfillmentError, Result};
    pub use crate::order::{LineItem, Order, OrderDraft};
    pub use crate::principal::Principal;
    pub use crate::tracking::TrackingProjection;
    pub use crate::types::{OrderStatus, ShippingStatus, SourceChannel};
}
