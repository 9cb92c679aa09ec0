//! Status axes and small enums shared across the fulfillment pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fulfillment-stage axis of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, payment not yet confirmed.
    Pending,
    /// Payment confirmed, waiting for a picker.
    Paid,
    /// Items are being picked and verified.
    Fetching,
    /// All items verified, being packed.
    Packaging,
    /// Packed and waiting for the courier.
    ReadyForShipping,
    /// Handed to the courier. Shipping status takes over from here.
    Shipped,
    /// Cancelled before picking started.
    Cancelled,
    /// Refunded by an operator.
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Fetching,
        OrderStatus::Packaging,
        OrderStatus::ReadyForShipping,
        OrderStatus::Shipped,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Fetching => "fetching",
            OrderStatus::Packaging => "packaging",
            OrderStatus::ReadyForShipping => "ready_for_shipping",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Returns true if picking may be started from this state.
    pub fn awaits_picking(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }

    /// Returns true if the order may be handed to the courier.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Packaging | OrderStatus::ReadyForShipping)
    }

    /// Whether `self -> next` is a legal order-status transition.
    ///
    /// Exposed so callers can disable actions up front instead of relying on
    /// the write being rejected.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (*self, next) {
            (Pending | Paid, Fetching) => true,
            (Pending | Paid, Cancelled) => true,
            (Fetching, Packaging) => true,
            (Packaging, ReadyForShipping) => true,
            (Packaging | ReadyForShipping, Shipped) => true,
            (from, Refunded) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Every status reachable from this one in a single step.
    pub fn next_statuses(&self) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .into_iter()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-shipment delivery-progress axis.
///
/// Operators may set any value directly: carriers do not always report
/// progress linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    /// Carrier reported a delay. Only an operator moves the order out of it.
    Delayed,
    /// Delivery problem (lost, damaged, returned). Operator-cleared only.
    Issue,
}

impl ShippingStatus {
    pub const ALL: [ShippingStatus; 6] = [
        ShippingStatus::Shipped,
        ShippingStatus::InTransit,
        ShippingStatus::OutForDelivery,
        ShippingStatus::Delivered,
        ShippingStatus::Delayed,
        ShippingStatus::Issue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Shipped => "shipped",
            ShippingStatus::InTransit => "in_transit",
            ShippingStatus::OutForDelivery => "out_for_delivery",
            ShippingStatus::Delivered => "delivered",
            ShippingStatus::Delayed => "delayed",
            ShippingStatus::Issue => "issue",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShippingStatus::Delivered)
    }

    /// Side-branch states that need manual attention.
    pub fn is_exception(&self) -> bool {
        matches!(self, ShippingStatus::Delayed | ShippingStatus::Issue)
    }
}

impl fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the order was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceChannel {
    /// In-store point of sale.
    Pos,
    /// Online storefront.
    #[default]
    Online,
}
