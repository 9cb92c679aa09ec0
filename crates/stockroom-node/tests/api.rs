//! HTTP API tests.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::NaiveDate;
use serde_json::{json, Value};
use stockroom_node::api::error::ErrorBody;
use stockroom_node::{create_router, AppState, OrderView, PickingStarted, ScanResult};

const STAFF: &str = "x-staff-id";

fn friday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()
}

fn server() -> (TestServer, AppState) {
    let state = AppState::fixed(friday());
    let server = TestServer::new(create_router(state.clone())).unwrap();
    (server, state)
}

fn staff() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(STAFF),
        HeaderValue::from_static("ana"),
    )
}

fn order_body(code: &str) -> Value {
    json!({
        "code": code,
        "line_items": [
            {"id": "li-1", "product_id": "prod-tote", "sku": "TOTE-NAT", "name": "Tote", "quantity": 3},
            {"id": "li-2", "product_id": "prod-pin", "sku": "unknown", "name": "Enamel pin", "quantity": 2}
        ],
        "customer": {"name": "Mina", "email": "mina@example.com"},
        "destination": {"city": "Halifax", "region": "NS"}
    })
}

async fn create(server: &TestServer, code: &str) -> OrderView {
    let (name, value) = staff();
    let response = server
        .post("/api/v1/orders")
        .add_header(name, value)
        .json(&order_body(code))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<OrderView>()
}

#[tokio::test]
async fn test_health() {
    let (server, _) = server();
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_mutations_require_staff_header() {
    let (server, _) = server();
    let response = server
        .post("/api/v1/orders")
        .json(&order_body("MA-1"))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<ErrorBody>().error, "unauthorized");
}

#[tokio::test]
async fn test_full_pick_pack_ship_flow() {
    let (server, state) = server();
    let order = create(&server, "MA-10234").await;
    let id = order.order.id;
    let (name, value) = staff();

    let started = server
        .post(&format!("/api/v1/orders/{id}/picking"))
        .add_header(name.clone(), value.clone())
        .await
        .json::<PickingStarted>();
    assert_eq!(started.order.order.status.as_str(), "fetching");

    for _ in 0..4 {
        server
            .post(&format!("/api/v1/orders/{id}/picking/scan"))
            .add_header(name.clone(), value.clone())
            .json(&json!({"token": "tote-nat"}))
            .await;
    }
    for _ in 0..2 {
        server
            .post(&format!("/api/v1/orders/{id}/picking/verify"))
            .add_header(name.clone(), value.clone())
            .json(&json!({"line_id": "li-2"}))
            .await;
    }

    let session = server
        .get(&format!("/api/v1/orders/{id}/picking"))
        .await
        .json::<Value>();
    assert_eq!(session["lines"][0]["scanned"], 3);
    assert_eq!(session["lines"][1]["scanned"], 2);

    let packed = server
        .post(&format!("/api/v1/orders/{id}/picking/finalize"))
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(packed.status_code(), StatusCode::OK);
    assert_eq!(packed.json::<OrderView>().order.status.as_str(), "packaging");

    server
        .post(&format!("/api/v1/orders/{id}/pack"))
        .add_header(name.clone(), value.clone())
        .await;

    let shipped = server
        .post(&format!("/api/v1/orders/{id}/ship"))
        .add_header(name, value)
        .await
        .json::<Value>();
    assert_eq!(shipped["status"], "shipped");
    assert_eq!(shipped["shipping_status"], "shipped");
    assert_eq!(shipped["shipped_on"], "2024-03-08");
    assert_eq!(shipped["estimated_delivery"], "2024-03-15");
    assert_eq!(shipped["delay"]["category"], "on_time");

    assert_eq!(state.notifier.sent().await.len(), 1);
}

#[tokio::test]
async fn test_scan_mismatch_is_not_an_error() {
    let (server, _) = server();
    let id = create(&server, "MA-2").await.order.id;
    let (name, value) = staff();

    server
        .post(&format!("/api/v1/orders/{id}/picking"))
        .add_header(name.clone(), value.clone())
        .await;

    let response = server
        .post(&format!("/api/v1/orders/{id}/picking/scan"))
        .add_header(name, value)
        .json(&json!({"token": "NOT-ON-ORDER"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let result = response.json::<ScanResult>();
    assert_eq!(result.progress.scanned, 0);
    assert_eq!(
        serde_json::to_value(&result.outcome).unwrap()["outcome"],
        "no_match"
    );
}

#[tokio::test]
async fn test_precondition_failures_are_conflicts() {
    let (server, _) = server();
    let id = create(&server, "MA-3").await.order.id;
    let (name, value) = staff();

    let ship = server
        .post(&format!("/api/v1/orders/{id}/ship"))
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(ship.status_code(), StatusCode::CONFLICT);
    assert_eq!(ship.json::<ErrorBody>().error, "invalid_transition");

    server
        .post(&format!("/api/v1/orders/{id}/picking"))
        .add_header(name.clone(), value.clone())
        .await;
    let finalize = server
        .post(&format!("/api/v1/orders/{id}/picking/finalize"))
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(finalize.status_code(), StatusCode::CONFLICT);
    assert_eq!(finalize.json::<ErrorBody>().error, "picking_incomplete");

    let shipping = server
        .put(&format!("/api/v1/orders/{id}/shipping-status"))
        .add_header(name, value)
        .json(&json!({"status": "delivered"}))
        .await;
    assert_eq!(shipping.status_code(), StatusCode::CONFLICT);
    assert_eq!(shipping.json::<ErrorBody>().error, "not_shipped");
}

#[tokio::test]
async fn test_unshipped_order_cannot_carry_shipping_status() {
    let (server, _) = server();
    let (name, value) = staff();

    let mut body = order_body("MA-X");
    body["shipping_status"] = json!("in_transit");
    body["estimated_delivery"] = json!("2024-03-01");
    let response = server
        .post("/api/v1/orders")
        .add_header(name, value)
        .json(&body)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorBody>().error, "validation");

    let tracked = server.get("/api/v1/track/MA-X").await;
    assert_eq!(tracked.status_code(), StatusCode::NOT_FOUND);

    let dashboard = server.get("/api/v1/dashboard/delays").await.json::<Value>();
    assert_eq!(dashboard["delayed"], 0);
}

#[tokio::test]
async fn test_update_tracking_round_trip() {
    let (server, _) = server();
    let before = create(&server, "MA-4").await.order;
    let id = before.id;
    let (name, value) = staff();

    server
        .put(&format!("/api/v1/orders/{id}/tracking"))
        .add_header(name, value)
        .json(&json!({"courier": "Canada Post", "tracking_number": "CP123456789CA"}))
        .await;

    let after = server
        .get(&format!("/api/v1/orders/{id}"))
        .await
        .json::<OrderView>()
        .order;
    assert_eq!(after.courier.as_deref(), Some("Canada Post"));
    assert_eq!(after.tracking_number.as_deref(), Some("CP123456789CA"));

    assert_eq!(after.code, before.code);
    assert_eq!(after.status, before.status);
    assert_eq!(after.shipping_status, before.shipping_status);
    assert_eq!(after.estimated_delivery, before.estimated_delivery);
    assert_eq!(after.line_items, before.line_items);
    assert_eq!(after.destination, before.destination);
    assert_eq!(after.customer, before.customer);
}

#[tokio::test]
async fn test_track_unknown_order_is_not_found() {
    let (server, _) = server();
    let response = server.get("/api/v1/track/MA-UNKNOWN").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "not_found");
    assert!(body.get("order_code").is_none());
}

#[tokio::test]
async fn test_track_order_projection() {
    let (server, _) = server();
    let id = create(&server, "MA-5").await.order.id;
    let (name, value) = staff();

    server
        .put(&format!("/api/v1/orders/{id}/eta"))
        .add_header(name, value)
        .json(&json!({"estimated_delivery": "2024-03-06"}))
        .await;

    let tracked = server.get("/api/v1/track/ma-5").await.json::<Value>();
    assert_eq!(tracked["order_code"], "MA-5");
    assert_eq!(tracked["destination_city"], "Halifax");
    assert_eq!(tracked["delay"]["category"], "delayed");
    assert_eq!(tracked["delay"]["days_overdue"], 2);
    assert!(tracked.get("customer").is_none());
}

#[tokio::test]
async fn test_delay_dashboard_counts_shipped_orders() {
    let (server, _) = server();
    let (name, value) = staff();

    for code in ["MA-6", "MA-7"] {
        let mut body = order_body(code);
        body["status"] = json!("ready_for_shipping");
        server
            .post("/api/v1/orders")
            .add_header(name.clone(), value.clone())
            .json(&body)
            .await;
    }
    create(&server, "MA-8").await;

    let listing = server.get("/api/v1/orders").await.json::<Value>();
    for order in listing["orders"].as_array().unwrap() {
        if order["status"] == "ready_for_shipping" {
            let id = order["id"].as_str().unwrap();
            server
                .post(&format!("/api/v1/orders/{id}/ship"))
                .add_header(name.clone(), value.clone())
                .await;
        }
    }

    let dashboard = server.get("/api/v1/dashboard/delays").await.json::<Value>();
    assert_eq!(dashboard["as_of"], "2024-03-08");
    assert_eq!(dashboard["on_time"], 2);
    assert_eq!(dashboard["delayed"], 0);
}

#[tokio::test]
async fn test_refund_and_delete() {
    let (server, state) = server();
    let id = create(&server, "MA-9").await.order.id;
    let (name, value) = staff();

    let refunded = server
        .post(&format!("/api/v1/orders/{id}/refund"))
        .add_header(name.clone(), value.clone())
        .json(&json!({"restock": true}))
        .await
        .json::<Value>();
    assert_eq!(refunded["status"], "refunded");
    assert_eq!(refunded["refund"]["refunded_by"], "ana");
    assert_eq!(state.inventory.requests().await.len(), 1);

    let deleted = server
        .delete(&format!("/api/v1/orders/{id}"))
        .add_header(name, value)
        .await;
    assert_eq!(deleted.status_code(), StatusCode::OK);

    let gone = server.get(&format!("/api/v1/orders/{id}")).await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);
}
