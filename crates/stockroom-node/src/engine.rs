//! Fulfillment service.
//!
//! Every status change an order goes through is made here: the order store
//! only applies the mutation, this layer decides whether it is legal and
//! publishes what happened.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use stockroom_core::{
    Catalog, Clock, DelayCategory, DelaySummary, EtaPolicy, FulfillmentError, Inventory,
    Notification, NotificationTemplate, Notifier, Order, OrderDraft, OrderStatus, Principal,
    RefundRecord, RestockLine, Result, ShippingStatus, TrackingProjection,
};
use stockroom_picking::{
    EnrichmentReport, LineItemEnricher, PickProgress, PickSession, ScanOutcome, SessionRegistry,
};
use stockroom_state::{EventBus, InMemoryOrderStore, OrderChange, OrderEvent, OrderStore};
use tracing::{info, warn};
use uuid::Uuid;

/// Systems the service talks to but does not own.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub notifier: Arc<dyn Notifier>,
    pub inventory: Arc<dyn Inventory>,
    pub clock: Arc<dyn Clock>,
}

/// An order together with what is derived from it at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,

    /// Delay category as of today. Never stored.
    pub delay: DelayCategory,

    /// Order statuses reachable in one step, so clients can disable
    /// actions that would be rejected.
    pub next_statuses: Vec<OrderStatus>,
}

impl OrderView {
    pub fn new(order: Order, today: NaiveDate) -> Self {
        Self {
            delay: order.delay(today),
            next_statuses: order.status.next_statuses(),
            order,
        }
    }
}

/// Full order listing, stamped with the store version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderListing {
    pub version: u64,
    pub taken_at: DateTime<Utc>,
    pub orders: Vec<OrderView>,
}

/// Result of starting (or resuming) picking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickingStarted {
    pub order: OrderView,
    pub session: PickSession,
    /// True if an open session was handed back instead of a new one.
    pub resumed: bool,
    pub enrichment: EnrichmentReport,
}

/// Result of one scan or manual verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub outcome: ScanOutcome,
    pub progress: PickProgress,
    pub session: PickSession,
}

/// The order fulfillment service.
pub struct Fulfillment {
    store: Arc<dyn OrderStore>,
    bus: Arc<EventBus>,
    sessions: SessionRegistry,
    enricher: LineItemEnricher,
    notifier: Arc<dyn Notifier>,
    inventory: Arc<dyn Inventory>,
    clock: Arc<dyn Clock>,
    eta_policy: EtaPolicy,
}

impl Fulfillment {
    /// Create a service over a fresh in-memory store.
    pub fn new(collaborators: Collaborators, eta_policy: EtaPolicy) -> Self {
        Self::with_store(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(EventBus::new()),
            collaborators,
            eta_policy,
        )
    }

    pub fn with_store(
        store: Arc<dyn OrderStore>,
        bus: Arc<EventBus>,
        collaborators: Collaborators,
        eta_policy: EtaPolicy,
    ) -> Self {
        Self {
            store,
            bus,
            sessions: SessionRegistry::new(),
            enricher: LineItemEnricher::new(collaborators.catalog),
            notifier: collaborators.notifier,
            inventory: collaborators.inventory,
            clock: collaborators.clock,
            eta_policy,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn version(&self) -> u64 {
        self.store.version().await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Every order with its delay category, newest first.
    pub async fn list_orders(&self) -> Result<OrderListing> {
        let today = self.today();
        let snapshot = self.store.snapshot().await?;
        Ok(OrderListing {
            version: snapshot.version,
            taken_at: snapshot.taken_at,
            orders: snapshot
                .orders
                .into_iter()
                .map(|order| OrderView::new(order, today))
                .collect(),
        })
    }

    pub async fn get_order(&self, id: Uuid) -> Result<OrderView> {
        let order = self.require(id).await?;
        Ok(OrderView::new(order, self.today()))
    }

    /// Public tracking lookup by order code.
    pub async fn track_order(&self, code: &str) -> Result<TrackingProjection> {
        let order = self
            .store
            .find_by_code(code)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound {
                resource_type: "Order".to_string(),
                id: code.trim().to_string(),
            })?;
        Ok(order.tracking_projection(self.today()))
    }

    pub async fn delay_summary(&self) -> Result<DelaySummary> {
        let orders = self.store.list().await?;
        Ok(DelaySummary::from_orders(&orders, self.today()))
    }

    // ------------------------------------------------------------------
    // Ingestion and removal
    // ------------------------------------------------------------------

    /// Ingest an order handed over by checkout or a legacy import.
    pub async fn create_order(
        &self,
        principal: &Principal,
        draft: OrderDraft,
    ) -> Result<OrderView> {
        let mut order = Order::from_draft(draft)?;
        order.updated_by = Some(principal.staff_id().to_string());

        let stored = self.store.insert(order).await?;
        info!(order_code = %stored.code, staff = %principal, "order created");
        self.publish(&stored, OrderChange::Created, principal);
        Ok(OrderView::new(stored, self.today()))
    }

    /// Seed an order without a principal. Used at startup.
    pub async fn import_order(&self, draft: OrderDraft) -> Result<Order> {
        self.store.insert(Order::from_draft(draft)?).await
    }

    /// Remove an order for good. Any picking session goes with it.
    pub async fn delete_order(&self, principal: &Principal, id: Uuid) -> Result<Order> {
        let removed = self
            .store
            .delete(id)
            .await?
            .ok_or_else(|| FulfillmentError::order_not_found(id))?;
        self.sessions.discard(id).await;

        info!(order_code = %removed.code, staff = %principal, "🗑️ order deleted");
        self.publish(&removed, OrderChange::Deleted, principal);
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Picking
    // ------------------------------------------------------------------

    /// Move a paid order into picking and open its session.
    ///
    /// On an order that is already being picked, the open session is handed
    /// back; if there is none, a fresh one is opened.
    pub async fn start_picking(&self, principal: &Principal, id: Uuid) -> Result<PickingStarted> {
        let order = self.require(id).await?;

        if order.status == OrderStatus::Fetching {
            if let Some(session) = self.sessions.get(id).await.filter(|s| s.is_open()) {
                return Ok(PickingStarted {
                    order: OrderView::new(order, self.today()),
                    session,
                    resumed: true,
                    enrichment: EnrichmentReport::default(),
                });
            }
        } else if !order.status.awaits_picking() {
            return Err(FulfillmentError::InvalidTransition {
                order_id: id,
                from: order.status,
                to: OrderStatus::Fetching,
            });
        }

        let enrichment = self.enricher.enrich(&order.line_items).await;

        let report = enrichment.clone();
        let actor = principal.staff_id().to_string();
        let mut previous = order.status;
        let mut filled = 0;
        let updated = self
            .store
            .update(
                id,
                Box::new(|o: &mut Order| {
                    previous = o.status;
                    if o.status.awaits_picking() {
                        o.status = OrderStatus::Fetching;
                    } else if o.status != OrderStatus::Fetching {
                        return Err(FulfillmentError::InvalidTransition {
                            order_id: o.id,
                            from: o.status,
                            to: OrderStatus::Fetching,
                        });
                    }
                    filled = report.apply(&mut o.line_items);
                    o.updated_by = Some(actor);
                    Ok(())
                }),
            )
            .await?;

        if filled > 0 {
            self.publish(&updated, OrderChange::LineItemsEnriched { filled }, principal);
        }
        if previous != updated.status {
            info!(order_code = %updated.code, staff = %principal, "order moved to picking");
            self.publish(
                &updated,
                OrderChange::StatusChanged {
                    from: previous,
                    to: updated.status,
                },
                principal,
            );
        }

        let (session, resumed) = self.sessions.open_or_resume(&updated, principal).await;
        Ok(PickingStarted {
            order: OrderView::new(updated, self.today()),
            session,
            resumed,
            enrichment,
        })
    }

    pub async fn get_session(&self, id: Uuid) -> Result<PickSession> {
        self.sessions
            .get(id)
            .await
            .ok_or(FulfillmentError::NoActiveSession { order_id: id })
    }

    pub async fn picking_progress(&self, id: Uuid) -> Result<PickProgress> {
        Ok(self.get_session(id).await?.progress())
    }

    /// Feed one scanned token into the order's session.
    pub async fn scan(&self, principal: &Principal, id: Uuid, token: &str) -> Result<ScanResult> {
        let (outcome, session) = self.sessions.scan(id, token).await?;
        self.after_scan(principal, outcome, session).await
    }

    /// Verify one unit of a line by hand.
    pub async fn verify_manually(
        &self,
        principal: &Principal,
        id: Uuid,
        line_id: &str,
    ) -> Result<ScanResult> {
        let (outcome, session) = self.sessions.verify_manually(id, line_id).await?;
        self.after_scan(principal, outcome, session).await
    }

    async fn after_scan(
        &self,
        principal: &Principal,
        outcome: ScanOutcome,
        session: PickSession,
    ) -> Result<ScanResult> {
        if let ScanOutcome::Verified {
            line_id,
            scanned,
            required,
            ..
        } = &outcome
        {
            if let Some(order) = self.store.get(session.order_id).await? {
                self.publish(
                    &order,
                    OrderChange::PickingProgress {
                        line_id: line_id.clone(),
                        scanned: *scanned,
                        required: *required,
                    },
                    principal,
                );
            }
        }

        Ok(ScanResult {
            progress: session.progress(),
            outcome,
            session,
        })
    }

    /// Drop the session and its progress. The order stays in picking.
    pub async fn abandon_picking(&self, principal: &Principal, id: Uuid) -> Result<PickSession> {
        let session = self.sessions.abandon(id).await?;
        info!(order_code = %session.order_code, staff = %principal, "picking session abandoned");

        if let Some(order) = self.store.get(id).await? {
            self.publish(&order, OrderChange::PickingAbandoned, principal);
        }
        Ok(session)
    }

    /// Close a fully verified session and move the order to packaging.
    pub async fn finalize_picking(&self, principal: &Principal, id: Uuid) -> Result<OrderView> {
        let session = self.sessions.complete(id).await?;

        match self
            .transition(principal, id, OrderStatus::Fetching, OrderStatus::Packaging)
            .await
        {
            Ok(order) => Ok(order),
            Err(e) => {
                self.sessions.reinstate(session).await;
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Packing and shipping
    // ------------------------------------------------------------------

    pub async fn finalize_pack(&self, principal: &Principal, id: Uuid) -> Result<OrderView> {
        self.transition(principal, id, OrderStatus::Packaging, OrderStatus::ReadyForShipping)
            .await
    }

    /// Hand the order to the courier.
    ///
    /// Sets the shipping status, the shipped date and, if none was set, a
    /// default ETA. The customer notification is best-effort.
    pub async fn mark_shipped(&self, principal: &Principal, id: Uuid) -> Result<OrderView> {
        let today = self.today();
        let eta = self.eta_policy.default_eta(today);
        let actor = principal.staff_id().to_string();
        let mut previous = None;

        let updated = self
            .store
            .update(
                id,
                Box::new(|o: &mut Order| {
                    if !o.status.can_ship() {
                        return Err(FulfillmentError::InvalidTransition {
                            order_id: o.id,
                            from: o.status,
                            to: OrderStatus::Shipped,
                        });
                    }
                    previous = Some(o.status);
                    o.status = OrderStatus::Shipped;
                    o.shipping_status = Some(ShippingStatus::Shipped);
                    o.shipped_on = Some(today);
                    if o.estimated_delivery.is_none() {
                        o.estimated_delivery = Some(eta);
                    }
                    o.updated_by = Some(actor);
                    Ok(())
                }),
            )
            .await?;

        info!(
            order_code = %updated.code,
            staff = %principal,
            eta = ?updated.estimated_delivery,
            "🚚 order shipped"
        );
        if let Some(from) = previous {
            self.publish(
                &updated,
                OrderChange::StatusChanged {
                    from,
                    to: OrderStatus::Shipped,
                },
                principal,
            );
        }

        self.notify_shipped(&updated).await;
        Ok(OrderView::new(updated, today))
    }

    async fn notify_shipped(&self, order: &Order) {
        let Some(recipient) = order.customer.email.clone().filter(|e| !e.trim().is_empty()) else {
            info!(order_code = %order.code, "no customer email, shipment notification skipped");
            return;
        };

        let notification = Notification {
            recipient,
            template: NotificationTemplate::OrderShipped,
            order_id: order.id,
            order_code: order.code.clone(),
        };
        if let Err(e) = self.notifier.notify(notification).await {
            warn!(order_code = %order.code, error = %e, "shipment notification failed");
        }
    }

    /// Set the delivery-progress status directly. Any value may be set.
    pub async fn update_shipping_status(
        &self,
        principal: &Principal,
        id: Uuid,
        status: ShippingStatus,
    ) -> Result<OrderView> {
        let actor = principal.staff_id().to_string();
        let mut previous = None;

        let updated = self
            .store
            .update(
                id,
                Box::new(|o: &mut Order| {
                    if o.status != OrderStatus::Shipped {
                        return Err(FulfillmentError::NotShipped {
                            order_id: o.id,
                            status: o.status,
                        });
                    }
                    previous = o.shipping_status;
                    o.shipping_status = Some(status);
                    o.updated_by = Some(actor);
                    Ok(())
                }),
            )
            .await?;

        info!(
            order_code = %updated.code,
            staff = %principal,
            shipping_status = %status,
            "shipping status updated"
        );
        self.publish(
            &updated,
            OrderChange::ShippingStatusChanged {
                from: previous,
                to: status,
            },
            principal,
        );
        Ok(OrderView::new(updated, self.today()))
    }

    /// Record courier and tracking number. Blank values clear the field.
    pub async fn update_tracking(
        &self,
        principal: &Principal,
        id: Uuid,
        courier: Option<String>,
        tracking_number: Option<String>,
    ) -> Result<OrderView> {
        let courier = non_blank(courier);
        let tracking_number = non_blank(tracking_number);
        let change = OrderChange::TrackingUpdated {
            courier: courier.clone(),
            tracking_number: tracking_number.clone(),
        };
        let actor = principal.staff_id().to_string();

        let updated = self
            .store
            .update(
                id,
                Box::new(move |o: &mut Order| {
                    o.courier = courier;
                    o.tracking_number = tracking_number;
                    o.updated_by = Some(actor);
                    Ok(())
                }),
            )
            .await?;

        info!(order_code = %updated.code, staff = %principal, "tracking updated");
        self.publish(&updated, change, principal);
        Ok(OrderView::new(updated, self.today()))
    }

    pub async fn update_estimated_delivery(
        &self,
        principal: &Principal,
        id: Uuid,
        estimated_delivery: Option<NaiveDate>,
    ) -> Result<OrderView> {
        let actor = principal.staff_id().to_string();

        let updated = self
            .store
            .update(
                id,
                Box::new(move |o: &mut Order| {
                    o.estimated_delivery = estimated_delivery;
                    o.updated_by = Some(actor);
                    Ok(())
                }),
            )
            .await?;

        info!(
            order_code = %updated.code,
            staff = %principal,
            eta = ?estimated_delivery,
            "estimated delivery updated"
        );
        self.publish(
            &updated,
            OrderChange::EtaUpdated { estimated_delivery },
            principal,
        );
        Ok(OrderView::new(updated, self.today()))
    }

    // ------------------------------------------------------------------
    // Cancellation and refunds
    // ------------------------------------------------------------------

    /// Cancel an order that has not been picked yet.
    pub async fn cancel_order(&self, principal: &Principal, id: Uuid) -> Result<OrderView> {
        let order = self
            .transition_from_any(principal, id, OrderStatus::Cancelled)
            .await?;
        self.sessions.discard(id).await;
        Ok(order)
    }

    /// Mark an order refunded.
    ///
    /// The payment refund itself is done by hand outside the system. With
    /// `restock`, the inventory is told to take the units back; a failure
    /// there is logged and does not undo the refund.
    pub async fn refund_order(
        &self,
        principal: &Principal,
        id: Uuid,
        restock: bool,
    ) -> Result<OrderView> {
        let actor = principal.staff_id().to_string();
        let mut previous = None;

        let updated = self
            .store
            .update(
                id,
                Box::new(|o: &mut Order| {
                    if !o.status.can_transition_to(OrderStatus::Refunded) {
                        return Err(FulfillmentError::InvalidTransition {
                            order_id: o.id,
                            from: o.status,
                            to: OrderStatus::Refunded,
                        });
                    }
                    previous = Some(o.status);
                    o.refund = Some(RefundRecord {
                        refunded_at: Utc::now(),
                        refunded_by: actor.clone(),
                        restocked: restock,
                        previous_status: o.status,
                    });
                    o.status = OrderStatus::Refunded;
                    o.updated_by = Some(actor);
                    Ok(())
                }),
            )
            .await?;
        self.sessions.discard(id).await;

        info!(order_code = %updated.code, staff = %principal, restock, "💸 order refunded");
        if let Some(from) = previous {
            self.publish(
                &updated,
                OrderChange::StatusChanged {
                    from,
                    to: OrderStatus::Refunded,
                },
                principal,
            );
        }
        self.publish(&updated, OrderChange::Refunded { restocked: restock }, principal);

        if restock {
            let lines: Vec<RestockLine> = updated
                .line_items
                .iter()
                .map(|item| RestockLine {
                    product_id: item.product_id.clone(),
                    sku: item.known_sku().map(str::to_string),
                    quantity: item.quantity,
                })
                .collect();
            if let Err(e) = self.inventory.restock(&updated.code, &lines).await {
                warn!(order_code = %updated.code, error = %e, "restock failed");
            }
        }

        Ok(OrderView::new(updated, self.today()))
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn require(&self, id: Uuid) -> Result<Order> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| FulfillmentError::order_not_found(id))
    }

    /// Move `id` from exactly `from` to `to`.
    async fn transition(
        &self,
        principal: &Principal,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<OrderView> {
        let actor = principal.staff_id().to_string();
        let updated = self
            .store
            .update(
                id,
                Box::new(move |o: &mut Order| {
                    if o.status != from || !from.can_transition_to(to) {
                        return Err(FulfillmentError::InvalidTransition {
                            order_id: o.id,
                            from: o.status,
                            to,
                        });
                    }
                    o.status = to;
                    o.updated_by = Some(actor);
                    Ok(())
                }),
            )
            .await?;

        info!(order_code = %updated.code, staff = %principal, %from, %to, "order status changed");
        self.publish(&updated, OrderChange::StatusChanged { from, to }, principal);
        Ok(OrderView::new(updated, self.today()))
    }

    /// Move `id` to `to` from whatever status allows it.
    async fn transition_from_any(
        &self,
        principal: &Principal,
        id: Uuid,
        to: OrderStatus,
    ) -> Result<OrderView> {
        let order = self.require(id).await?;
        self.transition(principal, id, order.status, to).await
    }

    fn publish(&self, order: &Order, change: OrderChange, principal: &Principal) {
        self.bus
            .publish(OrderEvent::new(order, change, Some(principal.staff_id())));
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryCatalog, LogInventory, LogNotifier};
    use async_trait::async_trait;
    use stockroom_core::{CustomerRef, FixedClock, LineItem};
    use stockroom_state::SubscriptionFilter;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notification: Notification) -> Result<()> {
            Err(FulfillmentError::Collaborator {
                collaborator: "notifier".to_string(),
                message: "smtp down".to_string(),
            })
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Harness {
        service: Fulfillment,
        catalog: InMemoryCatalog,
        notifier: LogNotifier,
        inventory: LogInventory,
    }

    fn harness(today: NaiveDate) -> Harness {
        let catalog = InMemoryCatalog::new();
        let notifier = LogNotifier::new();
        let inventory = LogInventory::new();
        let service = Fulfillment::new(
            Collaborators {
                catalog: Arc::new(catalog.clone()),
                notifier: Arc::new(notifier.clone()),
                inventory: Arc::new(inventory.clone()),
                clock: Arc::new(FixedClock(today)),
            },
            EtaPolicy::default(),
        );
        Harness {
            service,
            catalog,
            notifier,
            inventory,
        }
    }

    fn staff() -> Principal {
        Principal::new("ana").unwrap()
    }

    fn draft() -> OrderDraft {
        OrderDraft::new("MA-10234")
            .with_line_items(vec![
                LineItem::new("li-1", "prod-scarf", "Scarf", 2).with_sku("SCF-01"),
                LineItem::new("li-2", "prod-hat", "Hat", 1).with_sku("unknown"),
            ])
            .with_customer(CustomerRef {
                id: Some("c-1".to_string()),
                name: "Mina".to_string(),
                email: Some("mina@example.com".to_string()),
            })
    }

    #[tokio::test]
    async fn test_pick_pack_ship() {
        let h = harness(date(2024, 3, 8));
        let order = h.service.create_order(&staff(), draft()).await.unwrap().order;

        let started = h.service.start_picking(&staff(), order.id).await.unwrap();
        assert_eq!(started.order.order.status, OrderStatus::Fetching);
        assert!(!started.resumed);
        assert!(!started.session.is_complete());

        // Finalize is rejected until every unit is verified.
        let early = h.service.finalize_picking(&staff(), order.id).await;
        assert!(matches!(early, Err(FulfillmentError::PickingIncomplete { .. })));

        h.service.scan(&staff(), order.id, "SCF-01").await.unwrap();
        h.service.scan(&staff(), order.id, "SCF-01").await.unwrap();
        let last = h.service.scan(&staff(), order.id, "hat").await.unwrap();
        assert!(last.progress.is_complete());

        let packed = h.service.finalize_picking(&staff(), order.id).await.unwrap();
        assert_eq!(packed.order.status, OrderStatus::Packaging);
        assert!(h.service.get_session(order.id).await.is_err());

        let ready = h.service.finalize_pack(&staff(), order.id).await.unwrap();
        assert_eq!(ready.order.status, OrderStatus::ReadyForShipping);

        // Friday + 5 business days = next Friday.
        let shipped = h.service.mark_shipped(&staff(), order.id).await.unwrap();
        assert_eq!(shipped.order.status, OrderStatus::Shipped);
        assert_eq!(shipped.order.shipping_status, Some(ShippingStatus::Shipped));
        assert_eq!(shipped.order.shipped_on, Some(date(2024, 3, 8)));
        assert_eq!(shipped.order.estimated_delivery, Some(date(2024, 3, 15)));
        assert_eq!(shipped.order.updated_by.as_deref(), Some("ana"));

        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "mina@example.com");
    }

    #[tokio::test]
    async fn test_start_picking_enriches_skus() {
        let h = harness(date(2024, 3, 8));
        h.catalog.insert("prod-hat", "HAT-RED").await;
        let order = h.service.create_order(&staff(), draft()).await.unwrap().order;

        let started = h.service.start_picking(&staff(), order.id).await.unwrap();
        assert_eq!(started.enrichment.filled_count(), 1);
        assert_eq!(
            started.order.order.line_item("li-2").unwrap().known_sku(),
            Some("HAT-RED")
        );
        assert_eq!(
            started.session.line("li-2").unwrap().known_sku(),
            Some("HAT-RED")
        );

        // The scarf already had a SKU; it is never overwritten.
        assert_eq!(
            started.order.order.line_item("li-1").unwrap().known_sku(),
            Some("SCF-01")
        );
    }

    #[tokio::test]
    async fn test_start_picking_resumes_open_session() {
        let h = harness(date(2024, 3, 8));
        let order = h.service.create_order(&staff(), draft()).await.unwrap().order;

        let first = h.service.start_picking(&staff(), order.id).await.unwrap();
        h.service.scan(&staff(), order.id, "SCF-01").await.unwrap();

        let other = Principal::new("ben").unwrap();
        let second = h.service.start_picking(&other, order.id).await.unwrap();
        assert!(second.resumed);
        assert_eq!(second.session.id, first.session.id);
        assert_eq!(second.session.progress().scanned, 1);

        h.service.abandon_picking(&other, order.id).await.unwrap();
        let current = h.service.get_order(order.id).await.unwrap();
        assert_eq!(current.order.status, OrderStatus::Fetching);

        let third = h.service.start_picking(&staff(), order.id).await.unwrap();
        assert!(!third.resumed);
        assert_eq!(third.session.progress().scanned, 0);
    }

    #[tokio::test]
    async fn test_mark_shipped_keeps_existing_eta_and_survives_notifier_failure() {
        let today = date(2024, 3, 8);
        let service = Fulfillment::new(
            Collaborators {
                catalog: Arc::new(InMemoryCatalog::new()),
                notifier: Arc::new(FailingNotifier),
                inventory: Arc::new(LogInventory::new()),
                clock: Arc::new(FixedClock(today)),
            },
            EtaPolicy::default(),
        );

        let order = service
            .create_order(
                &staff(),
                draft()
                    .with_status(OrderStatus::ReadyForShipping)
                    .with_estimated_delivery(date(2024, 3, 20)),
            )
            .await
            .unwrap()
            .order;

        let shipped = service.mark_shipped(&staff(), order.id).await.unwrap();
        assert_eq!(shipped.order.status, OrderStatus::Shipped);
        assert_eq!(shipped.order.estimated_delivery, Some(date(2024, 3, 20)));
    }

    #[tokio::test]
    async fn test_illegal_transitions_are_rejected() {
        let h = harness(date(2024, 3, 8));
        let order = h.service.create_order(&staff(), draft()).await.unwrap().order;

        assert!(matches!(
            h.service.mark_shipped(&staff(), order.id).await,
            Err(FulfillmentError::InvalidTransition { .. })
        ));
        assert!(matches!(
            h.service.finalize_pack(&staff(), order.id).await,
            Err(FulfillmentError::InvalidTransition { .. })
        ));
        assert!(matches!(
            h.service
                .update_shipping_status(&staff(), order.id, ShippingStatus::Delivered)
                .await,
            Err(FulfillmentError::NotShipped { .. })
        ));
        assert!(matches!(
            h.service.finalize_picking(&staff(), order.id).await,
            Err(FulfillmentError::NoActiveSession { .. })
        ));
    }

    #[tokio::test]
    async fn test_shipping_status_is_free_form() {
        let h = harness(date(2024, 3, 8));
        let order = h
            .service
            .create_order(&staff(), draft().with_status(OrderStatus::Packaging))
            .await
            .unwrap()
            .order;
        h.service.mark_shipped(&staff(), order.id).await.unwrap();

        for status in [
            ShippingStatus::Delivered,
            ShippingStatus::InTransit,
            ShippingStatus::Issue,
            ShippingStatus::Shipped,
        ] {
            let view = h
                .service
                .update_shipping_status(&staff(), order.id, status)
                .await
                .unwrap();
            assert_eq!(view.order.shipping_status, Some(status));
            assert_eq!(view.order.status, OrderStatus::Shipped);
        }
    }

    #[tokio::test]
    async fn test_update_tracking_touches_only_tracking() {
        let h = harness(date(2024, 3, 8));
        let before = h.service.create_order(&staff(), draft()).await.unwrap().order;

        let after = h
            .service
            .update_tracking(
                &staff(),
                before.id,
                Some(" DHL ".to_string()),
                Some("JD0146".to_string()),
            )
            .await
            .unwrap()
            .order;

        assert_eq!(after.courier.as_deref(), Some("DHL"));
        assert_eq!(after.tracking_number.as_deref(), Some("JD0146"));
        assert_eq!(after.status, before.status);
        assert_eq!(after.shipping_status, before.shipping_status);
        assert_eq!(after.estimated_delivery, before.estimated_delivery);
        assert_eq!(after.line_items, before.line_items);
        assert!(after.version > before.version);
    }

    #[tokio::test]
    async fn test_refund_with_restock() {
        let h = harness(date(2024, 3, 8));
        let order = h.service.create_order(&staff(), draft()).await.unwrap().order;
        h.service.start_picking(&staff(), order.id).await.unwrap();

        let refunded = h.service.refund_order(&staff(), order.id, true).await.unwrap();
        assert_eq!(refunded.order.status, OrderStatus::Refunded);
        let record = refunded.order.refund.unwrap();
        assert_eq!(record.previous_status, OrderStatus::Fetching);
        assert!(record.restocked);
        assert!(h.service.get_session(order.id).await.is_err());

        let requests = h.inventory.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].lines.iter().map(|l| l.quantity).sum::<u32>(), 3);

        assert!(matches!(
            h.service.refund_order(&staff(), order.id, false).await,
            Err(FulfillmentError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_only_before_picking() {
        let h = harness(date(2024, 3, 8));
        let paid = h.service.create_order(&staff(), draft()).await.unwrap().order;
        let cancelled = h.service.cancel_order(&staff(), paid.id).await.unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);

        let packing = h
            .service
            .create_order(
                &staff(),
                OrderDraft::new("MA-2").with_status(OrderStatus::Packaging),
            )
            .await
            .unwrap()
            .order;
        assert!(h.service.cancel_order(&staff(), packing.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_is_final() {
        let h = harness(date(2024, 3, 8));
        let order = h.service.create_order(&staff(), draft()).await.unwrap().order;
        h.service.start_picking(&staff(), order.id).await.unwrap();

        h.service.delete_order(&staff(), order.id).await.unwrap();
        assert!(matches!(
            h.service.get_order(order.id).await,
            Err(FulfillmentError::NotFound { .. })
        ));
        assert!(h.service.track_order("MA-10234").await.is_err());
        assert_eq!(h.service.sessions().active_count().await, 0);
    }

    #[tokio::test]
    async fn test_track_order_projection() {
        let h = harness(date(2024, 3, 8));
        let order = h
            .service
            .create_order(&staff(), draft().with_estimated_delivery(date(2024, 3, 9)))
            .await
            .unwrap()
            .order;

        let tracked = h.service.track_order(" ma-10234 ").await.unwrap();
        assert_eq!(tracked.order_code, order.code);
        assert_eq!(tracked.delay, DelayCategory::AtRisk { days_remaining: 1 });

        assert!(matches!(
            h.service.track_order("MA-0").await,
            Err(FulfillmentError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_transitions_are_published() {
        let h = harness(date(2024, 3, 8));
        let mut sub = h.service.bus().subscribe(SubscriptionFilter::default()).await;

        let order = h.service.create_order(&staff(), draft()).await.unwrap().order;
        h.service.start_picking(&staff(), order.id).await.unwrap();

        assert_eq!(sub.next().await.unwrap().change, OrderChange::Created);
        let moved = sub.next().await.unwrap();
        assert_eq!(
            moved.change,
            OrderChange::StatusChanged {
                from: OrderStatus::Paid,
                to: OrderStatus::Fetching
            }
        );
        assert_eq!(moved.actor.as_deref(), Some("ana"));
    }
}
