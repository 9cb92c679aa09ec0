//! # Stockroom SDK
//!
//! Client SDK for Stockroom fulfillment nodes.

pub mod client;
pub mod stream;

pub use client::{
    DelayDashboard, HealthResponse, OrderListing, OrderRecord, PickingStarted, ScanResult,
    StockroomClient,
};
pub use stream::OrderEventStream;

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::client::StockroomClient;
    pub use crate::stream::OrderEventStream;
    pub use stockroom_core::prelude::*;
}
