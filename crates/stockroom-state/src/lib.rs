//! # Stockroom State
//!
//! Versioned order store with change subscriptions.

pub mod snapshot;
pub mod store;
pub mod subscription;

pub use snapshot::OrderSnapshot;
pub use store::{InMemoryOrderStore, Mutation, OrderStore};
pub use subscription::{
    ChangeKind, EventBus, OrderChange, OrderEvent, OrderSubscription, SubscriptionFilter,
};
