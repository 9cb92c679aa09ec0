//! Order store implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use stockroom_core::{FulfillmentError, Order, Result};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::snapshot::OrderSnapshot;

/// A mutation applied to one order while the store holds its write lock.
///
/// Mutations only touch the fields they set, so concurrent writers to
/// different fields of the same order do not clobber each other. Writers to
/// the same field: last write wins.
pub type Mutation<'a> = Box<dyn FnOnce(&mut Order) -> Result<()> + Send + 'a>;

/// Trait for order stores.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Get the current revision of an order.
    async fn get(&self, id: Uuid) -> Result<Option<Order>>;

    /// Look an order up by its external code (case-insensitive).
    async fn find_by_code(&self, code: &str) -> Result<Option<Order>>;

    /// All orders, newest first.
    async fn list(&self) -> Result<Vec<Order>>;

    /// Insert a new order. Fails if the id or code is taken.
    async fn insert(&self, order: Order) -> Result<Order>;

    /// Apply `mutation` to the current revision and store the result.
    async fn update<'a>(&self, id: Uuid, mutation: Mutation<'a>) -> Result<Order>;

    /// Remove an order and its history. Irrecoverable.
    async fn delete(&self, id: Uuid) -> Result<Option<Order>>;

    /// Every stored revision of an order, oldest first.
    async fn history(&self, id: Uuid) -> Result<Vec<Order>>;

    /// Consistent view of all current orders.
    async fn snapshot(&self) -> Result<OrderSnapshot>;

    /// Get the current version of the store.
    async fn version(&self) -> u64;
}

/// In-memory implementation of [`OrderStore`].
pub struct InMemoryOrderStore {
    /// order id -> revisions (append-only).
    orders: Arc<RwLock<HashMap<Uuid, Vec<Order>>>>,

    /// Upper-cased order code -> order id.
    codes: Arc<RwLock<HashMap<String, Uuid>>>,

    /// Global version counter.
    version: Arc<RwLock<u64>>,
}

impl InMemoryOrderStore {
    /// Create a new in-memory order store.
    pub fn new() -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
            codes: Arc::new(RwLock::new(HashMap::new())),
            version: Arc::new(RwLock::new(0)),
        }
    }

    /// Get the next version number.
    async fn next_version(&self) -> u64 {
        let mut version = self.version.write().await;
        *version += 1;
        *version
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

fn code_key(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id).and_then(|revisions| revisions.last().cloned()))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Order>> {
        let id = {
            let codes = self.codes.read().await;
            match codes.get(&code_key(code)) {
                Some(id) => *id,
                None => return Ok(None),
            }
        };
        self.get(id).await
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut current: Vec<Order> = orders
            .values()
            .filter_map(|revisions| revisions.last().cloned())
            .collect();
        current.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.code.cmp(&b.code)));
        Ok(current)
    }

    async fn insert(&self, mut order: Order) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let mut codes = self.codes.write().await;

        let key = code_key(&order.code);
        if codes.contains_key(&key) {
            return Err(FulfillmentError::Validation(format!(
                "order code {} already exists",
                order.code
            )));
        }
        if orders.contains_key(&order.id) {
            return Err(FulfillmentError::Validation(format!(
                "order id {} already exists",
                order.id
            )));
        }

        order.version = self.next_version().await;
        order.updated_at = Utc::now();

        codes.insert(key, order.id);
        orders.insert(order.id, vec![order.clone()]);

        Ok(order)
    }

    async fn update<'a>(&self, id: Uuid, mutation: Mutation<'a>) -> Result<Order> {
        let mut orders = self.orders.write().await;

        let revisions = orders
            .get_mut(&id)
            .ok_or_else(|| FulfillmentError::order_not_found(id))?;
        let mut next = revisions
            .last()
            .cloned()
            .ok_or_else(|| FulfillmentError::StateError {
                message: format!("order {} has no revisions", id),
            })?;

        // A failed mutation leaves the stored revision untouched.
        mutation(&mut next)?;

        // Identity is not mutable.
        next.id = id;
        next.version = self.next_version().await;
        next.updated_at = Utc::now();

        revisions.push(next.clone());
        Ok(next)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Order>> {
        let mut orders = self.orders.write().await;
        let Some(revisions) = orders.remove(&id) else {
            return Ok(None);
        };
        let last = revisions.last().cloned();

        if let Some(order) = &last {
            let mut codes = self.codes.write().await;
            codes.remove(&code_key(&order.code));
        }
        self.next_version().await;

        Ok(last)
    }

    async fn history(&self, id: Uuid) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id).cloned().unwrap_or_default())
    }

    async fn snapshot(&self) -> Result<OrderSnapshot> {
        let version = *self.version.read().await;
        let orders = self.list().await?;

        Ok(OrderSnapshot {
            id: Uuid::new_v4(),
            version,
            taken_at: Utc::now(),
            orders,
        })
    }

    async fn version(&self) -> u64 {
        *self.version.read().await
    }
}
