//! Public order-tracking projection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::delay::DelayCategory;
use crate::types::ShippingStatus;

/// What a customer sees when looking up an order code.
///
/// Carries no internal ids, customer details or line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingProjection {
    pub order_code: String,
    pub placed_on: NaiveDate,
    pub shipping_status: Option<ShippingStatus>,
    pub shipping_method: String,
    pub estimated_delivery: Option<NaiveDate>,
    pub destination_city: String,
    pub destination_region: String,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
    pub delay: DelayCategory,
}
