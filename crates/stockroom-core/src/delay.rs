//! Delay classification.
//!
//! Pure and deterministic: the same `(shipping status, eta, today)` always
//! yields the same category. Nothing here is cached or stored, because
//! "today" moves; callers classify on every read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::order::Order;
use crate::types::ShippingStatus;

/// Delay category shown on the dashboard and the public tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum DelayCategory {
    /// No estimated delivery date is set.
    NoEta,
    /// Delivered; date math no longer applies.
    Delivered,
    /// Past the estimated delivery date.
    Delayed { days_overdue: u32 },
    /// Due today or tomorrow.
    AtRisk { days_remaining: u32 },
    /// Two or more days left.
    OnTime { days_remaining: u32 },
}

impl DelayCategory {
    /// Short badge label.
    pub fn label(&self) -> &'static str {
        match self {
            DelayCategory::NoEta => "no_eta",
            DelayCategory::Delivered => "delivered",
            DelayCategory::Delayed { .. } => "delayed",
            DelayCategory::AtRisk { .. } => "at_risk",
            DelayCategory::OnTime { .. } => "on_time",
        }
    }
}

/// Classify an order's delivery against `today`.
///
/// Rules, in order:
/// 1. no ETA: [`DelayCategory::NoEta`]
/// 2. delivered: [`DelayCategory::Delivered`], whatever the dates say
/// 3. `diff = eta - today` in days
/// 4. `diff < 0`: delayed by `|diff|`
/// 5. `diff` is 0 or 1: at risk
/// 6. otherwise on time
pub fn classify(
    shipping_status: Option<ShippingStatus>,
    eta: Option<NaiveDate>,
    today: NaiveDate,
) -> DelayCategory {
    let Some(eta) = eta else {
        return DelayCategory::NoEta;
    };
    if shipping_status == Some(ShippingStatus::Delivered) {
        return DelayCategory::Delivered;
    }

    // Both sides are whole calendar dates, so the day count is already the
    // ceiling of the difference.
    let diff = eta.signed_duration_since(today).num_days();
    let days = u32::try_from(diff.unsigned_abs()).unwrap_or(u32::MAX);
    match diff {
        d if d < 0 => DelayCategory::Delayed { days_overdue: days },
        0 | 1 => DelayCategory::AtRisk {
            days_remaining: days,
        },
        _ => DelayCategory::OnTime {
            days_remaining: days,
        },
    }
}

/// Per-category counters for the operations dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelaySummary {
    pub no_eta: usize,
    pub delivered: usize,
    pub delayed: usize,
    pub at_risk: usize,
    pub on_time: usize,
}

impl DelaySummary {
    /// Count every shipped order in `orders` as of `today`.
    ///
    /// Orders that have not shipped carry no delivery promise yet and are
    /// left out.
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>, today: NaiveDate) -> Self {
        let mut summary = Self::default();
        for order in orders {
            if order.shipping_status.is_some() {
                summary.record(order.delay(today));
            }
        }
        summary
    }

    pub fn record(&mut self, category: DelayCategory) {
        match category {
            DelayCategory::NoEta => self.no_eta += 1,
            DelayCategory::Delivered => self.delivered += 1,
            DelayCategory::Delayed { .. } => self.delayed += 1,
            DelayCategory::AtRisk { .. } => self.at_risk += 1,
            DelayCategory::OnTime { .. } => self.on_time += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.no_eta + self.delivered + self.delayed + self.at_risk + self.on_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderDraft;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_no_eta() {
        let today = date(2026, 3, 10);
        assert_eq!(classify(None, None, today), DelayCategory::NoEta);
        assert_eq!(
            classify(Some(ShippingStatus::Delivered), None, today),
            DelayCategory::NoEta
        );
    }

    #[test]
    fn test_delivered_overrides_dates() {
        let today = date(2026, 3, 10);
        for eta in [date(2026, 1, 1), today, date(2026, 12, 31)] {
            assert_eq!(
                classify(Some(ShippingStatus::Delivered), Some(eta), today),
                DelayCategory::Delivered
            );
        }
    }

    #[test]
    fn test_boundaries() {
        let today = date(2026, 3, 10);
        let status = Some(ShippingStatus::InTransit);

        assert_eq!(
            classify(status, Some(date(2026, 3, 9)), today),
            DelayCategory::Delayed { days_overdue: 1 }
        );
        assert_eq!(
            classify(status, Some(today), today),
            DelayCategory::AtRisk { days_remaining: 0 }
        );
        assert_eq!(
            classify(status, Some(date(2026, 3, 11)), today),
            DelayCategory::AtRisk { days_remaining: 1 }
        );
        assert_eq!(
            classify(status, Some(date(2026, 3, 12)), today),
            DelayCategory::OnTime { days_remaining: 2 }
        );
    }

    #[test]
    fn test_overdue_magnitude_across_months() {
        let today = date(2026, 3, 2);
        assert_eq!(
            classify(Some(ShippingStatus::Delayed), Some(date(2026, 2, 20)), today),
            DelayCategory::Delayed { days_overdue: 10 }
        );
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(DelayCategory::Delayed { days_overdue: 3 }).unwrap();
        assert_eq!(json["category"], "delayed");
        assert_eq!(json["days_overdue"], 3);
    }

    #[test]
    fn test_summary_skips_unshipped() {
        let today = date(2026, 3, 10);
        let mut shipped = Order::from_draft(OrderDraft::new("MA-1")).unwrap();
        shipped.shipping_status = Some(ShippingStatus::InTransit);
        shipped.estimated_delivery = Some(date(2026, 3, 8));

        let mut delivered = Order::from_draft(OrderDraft::new("MA-2")).unwrap();
        delivered.shipping_status = Some(ShippingStatus::Delivered);
        delivered.estimated_delivery = Some(date(2026, 3, 1));

        let unshipped = Order::from_draft(OrderDraft::new("MA-3")).unwrap();

        let summary = DelaySummary::from_orders([&shipped, &delivered, &unshipped], today);
        assert_eq!(summary.delayed, 1);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.total(), 2);
    }
}
