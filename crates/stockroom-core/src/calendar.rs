//! Business-day arithmetic for default delivery estimates.
//!
//! Deterministic, pure logic. No IO, no wall-clock.
//!
//! Weekends are never business days. Holidays are whatever the operator
//! configures; there is no built-in holiday table.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Policy used to assign an ETA when an order ships without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtaPolicy {
    /// Business days between shipping and the estimated delivery.
    pub business_days: u32,

    /// Extra non-business days.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

impl Default for EtaPolicy {
    fn default() -> Self {
        Self {
            business_days: 5,
            holidays: Vec::new(),
        }
    }
}

impl EtaPolicy {
    pub fn with_business_days(mut self, days: u32) -> Self {
        self.business_days = days;
        self
    }

    pub fn with_holidays(mut self, holidays: Vec<NaiveDate>) -> Self {
        self.holidays = holidays;
        self
    }

    /// Monday to Friday, excluding configured holidays.
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// `shipped_on` plus [`EtaPolicy::business_days`] business days.
    pub fn default_eta(&self, shipped_on: NaiveDate) -> NaiveDate {
        add_business_days(shipped_on, self.business_days, |d| self.is_business_day(d))
    }
}

// ---------------------------------------------------------------------------
// Counting
// ---------------------------------------------------------------------------

/// Walk forward from `start` until `days` business days have passed.
///
/// `start` itself is never counted, so shipping on a Friday with 5 days lands
/// on the following Friday. Saturates at the end of the calendar.
pub fn add_business_days(
    start: NaiveDate,
    days: u32,
    is_business_day: impl Fn(NaiveDate) -> bool,
) -> NaiveDate {
    let mut date = start;
    let mut counted = 0;
    while counted < days {
        let Some(next) = date.succ_opt() else {
            break;
        };
        date = next;
        if is_business_day(date) {
            counted += 1;
        }
    }
    date
}
