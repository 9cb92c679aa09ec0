//! Order endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use stockroom_core::{Order, OrderDraft};
use uuid::Uuid;

use super::{ApiResult, Staff};
use crate::engine::{OrderListing, OrderView};
use crate::state::AppState;

/// List every order with its delay category.
pub async fn list_orders(State(state): State<AppState>) -> ApiResult<Json<OrderListing>> {
    Ok(Json(state.fulfillment.list_orders().await?))
}

/// Ingest an order.
pub async fn create_order(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Json(draft): Json<OrderDraft>,
) -> ApiResult<(StatusCode, Json<OrderView>)> {
    let view = state.fulfillment.create_order(&staff, draft).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(state.fulfillment.get_order(id).await?))
}

/// Response after deleting an order.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub id: Uuid,
    pub code: String,
    pub deleted: bool,
}

/// Delete an order. There is no undo.
pub async fn delete_order(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    let removed: Order = state.fulfillment.delete_order(&staff, id).await?;
    Ok(Json(DeletedResponse {
        id: removed.id,
        code: removed.code,
        deleted: true,
    }))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(state.fulfillment.cancel_order(&staff, id).await?))
}

/// Request to refund an order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RefundRequest {
    /// Return the units to inventory.
    #[serde(default)]
    pub restock: bool,
}

pub async fn refund_order(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
    Json(req): Json<RefundRequest>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(
        state.fulfillment.refund_order(&staff, id, req.restock).await?,
    ))
}
