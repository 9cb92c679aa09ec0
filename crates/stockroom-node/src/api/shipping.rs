//! Packing and shipping endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stockroom_core::ShippingStatus;
use uuid::Uuid;

use super::{ApiResult, Staff};
use crate::engine::OrderView;
use crate::state::AppState;

pub async fn finalize_pack(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(state.fulfillment.finalize_pack(&staff, id).await?))
}

pub async fn mark_shipped(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(state.fulfillment.mark_shipped(&staff, id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShippingStatusRequest {
    pub status: ShippingStatus,
}

pub async fn update_shipping_status(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
    Json(req): Json<ShippingStatusRequest>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(
        state
            .fulfillment
            .update_shipping_status(&staff, id, req.status)
            .await?,
    ))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TrackingRequest {
    #[serde(default)]
    pub courier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

pub async fn update_tracking(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
    Json(req): Json<TrackingRequest>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(
        state
            .fulfillment
            .update_tracking(&staff, id, req.courier, req.tracking_number)
            .await?,
    ))
}

/// `null` clears the estimate.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EtaRequest {
    #[serde(default)]
    pub estimated_delivery: Option<NaiveDate>,
}

pub async fn update_estimated_delivery(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
    Json(req): Json<EtaRequest>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(
        state
            .fulfillment
            .update_estimated_delivery(&staff, id, req.estimated_delivery)
            .await?,
    ))
}
