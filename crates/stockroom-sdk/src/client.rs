//! Stockroom client implementation.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stockroom_core::{
    DelayCategory, DelaySummary, FulfillmentError, Order, OrderDraft, OrderStatus, Principal,
    Result, ShippingStatus, TrackingProjection,
};
use stockroom_picking::{EnrichmentReport, PickProgress, PickSession, ScanOutcome};
use tracing::debug;
use uuid::Uuid;

use crate::stream::OrderEventStream;

const STAFF_HEADER: &str = "x-staff-id";

/// Client for a Stockroom node.
#[derive(Clone)]
pub struct StockroomClient {
    /// Base URL of the node.
    base_url: String,

    /// HTTP client.
    http_client: reqwest::Client,

    /// Staff member sent with mutating requests.
    staff: Option<Principal>,
}

/// An order with its read-time delay category.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    #[serde(flatten)]
    pub order: Order,
    pub delay: DelayCategory,
    pub next_statuses: Vec<OrderStatus>,
}

/// Full order listing.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderListing {
    pub version: u64,
    pub taken_at: DateTime<Utc>,
    pub orders: Vec<OrderRecord>,
}

/// Response from starting picking.
#[derive(Debug, Clone, Deserialize)]
pub struct PickingStarted {
    pub order: OrderRecord,
    pub session: PickSession,
    pub resumed: bool,
    pub enrichment: EnrichmentReport,
}

/// Response from a scan or manual verification.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanResult {
    pub outcome: ScanOutcome,
    pub progress: PickProgress,
    pub session: PickSession,
}

/// Delay counters as of a date.
#[derive(Debug, Clone, Deserialize)]
pub struct DelayDashboard {
    pub as_of: NaiveDate,
    #[serde(flatten)]
    pub summary: DelaySummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store_version: u64,
    pub open_sessions: usize,
}

/// Error body returned by the node.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DeletedResponse {
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct ScanRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    line_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ShippingStatusRequest {
    status: ShippingStatus,
}

#[derive(Debug, Serialize)]
struct TrackingRequest<'a> {
    courier: Option<&'a str>,
    tracking_number: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct EtaRequest {
    estimated_delivery: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct RefundRequest {
    restock: bool,
}

impl StockroomClient {
    /// Connect to a Stockroom node.
    pub async fn connect(url: &str) -> Result<Self> {
        let base_url = url.trim_end_matches('/').to_string();
        let http_client = reqwest::Client::new();

        // Verify connection with health check
        let health_url = format!("{}/health", base_url);
        http_client
            .get(&health_url)
            .send()
            .await
            .map_err(|e| FulfillmentError::ConnectionError(e.to_string()))?
            .error_for_status()
            .map_err(|e| FulfillmentError::ConnectionError(e.to_string()))?;

        Ok(Self {
            base_url,
            http_client,
            staff: None,
        })
    }

    /// Act as `staff` on mutating requests.
    pub fn as_staff(mut self, staff: Principal) -> Self {
        self.staff = Some(staff);
        self
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let request = self.http_client.get(self.url("/health"));
        self.send(request, "Node", "health").await
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    pub async fn list_orders(&self) -> Result<OrderListing> {
        let request = self.http_client.get(self.url("/api/v1/orders"));
        self.send(request, "Orders", "all").await
    }

    pub async fn get_order(&self, id: Uuid) -> Result<OrderRecord> {
        let request = self.http_client.get(self.order_url(id, ""));
        self.send(request, "Order", &id.to_string()).await
    }

    pub async fn create_order(&self, draft: &OrderDraft) -> Result<OrderRecord> {
        let request = self.staff(self.http_client.post(self.url("/api/v1/orders")))?;
        self.send(request.json(draft), "Order", &draft.code).await
    }

    /// Delete an order. There is no undo.
    pub async fn delete_order(&self, id: Uuid) -> Result<()> {
        let request = self.staff(self.http_client.delete(self.order_url(id, "")))?;
        let response: DeletedResponse = self.send(request, "Order", &id.to_string()).await?;
        if !response.deleted {
            return Err(FulfillmentError::Internal(format!(
                "node did not delete order {}",
                id
            )));
        }
        Ok(())
    }

    pub async fn cancel_order(&self, id: Uuid) -> Result<OrderRecord> {
        self.post_order(id, "/cancel").await
    }

    pub async fn refund_order(&self, id: Uuid, restock: bool) -> Result<OrderRecord> {
        let request = self.staff(self.http_client.post(self.order_url(id, "/refund")))?;
        self.send(request.json(&RefundRequest { restock }), "Order", &id.to_string())
            .await
    }

    // ------------------------------------------------------------------
    // Picking
    // ------------------------------------------------------------------

    /// Start picking, or resume the open session.
    pub async fn start_picking(&self, id: Uuid) -> Result<PickingStarted> {
        let request = self.staff(self.http_client.post(self.order_url(id, "/picking")))?;
        self.send(request, "Order", &id.to_string()).await
    }

    pub async fn get_session(&self, id: Uuid) -> Result<PickSession> {
        let request = self.http_client.get(self.order_url(id, "/picking"));
        self.send(request, "PickSession", &id.to_string()).await
    }

    pub async fn scan(&self, id: Uuid, token: &str) -> Result<ScanResult> {
        let request = self.staff(self.http_client.post(self.order_url(id, "/picking/scan")))?;
        self.send(request.json(&ScanRequest { token }), "PickSession", &id.to_string())
            .await
    }

    pub async fn verify_manually(&self, id: Uuid, line_id: &str) -> Result<ScanResult> {
        let request = self.staff(self.http_client.post(self.order_url(id, "/picking/verify")))?;
        self.send(
            request.json(&VerifyRequest { line_id }),
            "PickSession",
            &id.to_string(),
        )
        .await
    }

    pub async fn finalize_picking(&self, id: Uuid) -> Result<OrderRecord> {
        self.post_order(id, "/picking/finalize").await
    }

    pub async fn abandon_picking(&self, id: Uuid) -> Result<PickSession> {
        let request = self.staff(self.http_client.delete(self.order_url(id, "/picking")))?;
        self.send(request, "PickSession", &id.to_string()).await
    }

    // ------------------------------------------------------------------
    // Packing and shipping
    // ------------------------------------------------------------------

    pub async fn finalize_pack(&self, id: Uuid) -> Result<OrderRecord> {
        self.post_order(id, "/pack").await
    }

    pub async fn mark_shipped(&self, id: Uuid) -> Result<OrderRecord> {
        self.post_order(id, "/ship").await
    }

    pub async fn update_shipping_status(
        &self,
        id: Uuid,
        status: ShippingStatus,
    ) -> Result<OrderRecord> {
        let request = self.staff(self.http_client.put(self.order_url(id, "/shipping-status")))?;
        self.send(
            request.json(&ShippingStatusRequest { status }),
            "Order",
            &id.to_string(),
        )
        .await
    }

    pub async fn update_tracking(
        &self,
        id: Uuid,
        courier: Option<&str>,
        tracking_number: Option<&str>,
    ) -> Result<OrderRecord> {
        let request = self.staff(self.http_client.put(self.order_url(id, "/tracking")))?;
        self.send(
            request.json(&TrackingRequest {
                courier,
                tracking_number,
            }),
            "Order",
            &id.to_string(),
        )
        .await
    }

    pub async fn update_estimated_delivery(
        &self,
        id: Uuid,
        estimated_delivery: Option<NaiveDate>,
    ) -> Result<OrderRecord> {
        let request = self.staff(self.http_client.put(self.order_url(id, "/eta")))?;
        self.send(
            request.json(&EtaRequest { estimated_delivery }),
            "Order",
            &id.to_string(),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Public tracking lookup. No staff header is sent.
    pub async fn track_order(&self, code: &str) -> Result<TrackingProjection> {
        let request = self
            .http_client
            .get(self.url(&format!("/api/v1/track/{}", code.trim())));
        self.send(request, "Order", code.trim()).await
    }

    pub async fn delay_dashboard(&self) -> Result<DelayDashboard> {
        let request = self.http_client.get(self.url("/api/v1/dashboard/delays"));
        self.send(request, "Dashboard", "delays").await
    }

    /// Subscribe to order events, optionally for a single order.
    pub async fn subscribe(&self, order_id: Option<Uuid>) -> Result<OrderEventStream> {
        let mut ws_url = format!(
            "{}/ws/orders",
            self.base_url
                .replace("http://", "ws://")
                .replace("https://", "wss://")
        );
        if let Some(id) = order_id {
            ws_url.push_str(&format!("?order_id={}", id));
        }

        OrderEventStream::connect(&ws_url).await
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn order_url(&self, id: Uuid, suffix: &str) -> String {
        format!("{}/api/v1/orders/{}{}", self.base_url, id, suffix)
    }

    fn staff(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let staff = self.staff.as_ref().ok_or_else(|| {
            FulfillmentError::Unauthorized("client has no staff principal".to_string())
        })?;
        Ok(request.header(STAFF_HEADER, staff.staff_id()))
    }

    async fn post_order(&self, id: Uuid, suffix: &str) -> Result<OrderRecord> {
        let request = self.staff(self.http_client.post(self.order_url(id, suffix)))?;
        self.send(request, "Order", &id.to_string()).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource_type: &str,
        id: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| FulfillmentError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| FulfillmentError::SerializationError(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        debug!(%status, body = %body, "node rejected request");
        Err(error_from_response(status, &body, resource_type, id))
    }
}

/// Turn a non-success response back into a [`FulfillmentError`].
fn error_from_response(
    status: StatusCode,
    body: &str,
    resource_type: &str,
    id: &str,
) -> FulfillmentError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();

    match status {
        StatusCode::NOT_FOUND => FulfillmentError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        },
        StatusCode::UNAUTHORIZED => FulfillmentError::Unauthorized(
            parsed.map(|b| b.message).unwrap_or_else(|| body.to_string()),
        ),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => FulfillmentError::Validation(
            parsed.map(|b| b.message).unwrap_or_else(|| body.to_string()),
        ),
        _ => match parsed {
            Some(b) => FulfillmentError::Rejected {
                kind: b.error,
                message: b.message,
            },
            None => FulfillmentError::Internal(format!("node returned {}: {}", status, body)),
        },
    }
}
