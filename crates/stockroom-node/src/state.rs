//! Application state.

use std::sync::Arc;

use chrono::NaiveDate;
use stockroom_core::{Clock, EtaPolicy, FixedClock, SystemClock};

use crate::collaborators::{InMemoryCatalog, LogInventory, LogNotifier};
use crate::config::NodeConfig;
use crate::engine::{Collaborators, Fulfillment};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The fulfillment service.
    pub fulfillment: Arc<Fulfillment>,

    /// Catalog the enricher reads from.
    pub catalog: InMemoryCatalog,

    pub notifier: LogNotifier,

    pub inventory: LogInventory,
}

impl AppState {
    /// State for a node running on the system clock.
    pub fn new(config: &NodeConfig) -> Self {
        Self::with_clock(Arc::new(SystemClock), config.eta_policy.clone())
    }

    pub fn with_clock(clock: Arc<dyn Clock>, eta_policy: EtaPolicy) -> Self {
        let catalog = InMemoryCatalog::new();
        let notifier = LogNotifier::new();
        let inventory = LogInventory::new();

        let fulfillment = Fulfillment::new(
            Collaborators {
                catalog: Arc::new(catalog.clone()),
                notifier: Arc::new(notifier.clone()),
                inventory: Arc::new(inventory.clone()),
                clock,
            },
            eta_policy,
        );

        Self {
            fulfillment: Arc::new(fulfillment),
            catalog,
            notifier,
            inventory,
        }
    }

    /// State pinned to `today`, with the default ETA policy.
    pub fn fixed(today: NaiveDate) -> Self {
        Self::with_clock(Arc::new(FixedClock(today)), EtaPolicy::default())
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::fixed(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap())
    }
}
