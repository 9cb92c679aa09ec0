//! Pick-and-verify endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use stockroom_picking::PickSession;
use uuid::Uuid;

use super::{ApiResult, Staff};
use crate::engine::{OrderView, PickingStarted, ScanResult};
use crate::state::AppState;

/// Start picking, or resume the open session.
pub async fn start_picking(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PickingStarted>> {
    Ok(Json(state.fulfillment.start_picking(&staff, id).await?))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PickSession>> {
    Ok(Json(state.fulfillment.get_session(id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanRequest {
    pub token: String,
}

pub async fn scan(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
    Json(req): Json<ScanRequest>,
) -> ApiResult<Json<ScanResult>> {
    Ok(Json(state.fulfillment.scan(&staff, id, &req.token).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub line_id: String,
}

/// Verify one unit of a line by hand.
pub async fn verify(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<ScanResult>> {
    Ok(Json(
        state
            .fulfillment
            .verify_manually(&staff, id, &req.line_id)
            .await?,
    ))
}

pub async fn finalize(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderView>> {
    Ok(Json(state.fulfillment.finalize_picking(&staff, id).await?))
}

/// Abandon the session. Progress is lost; the order stays in picking.
pub async fn abandon(
    State(state): State<AppState>,
    Staff(staff): Staff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PickSession>> {
    Ok(Json(state.fulfillment.abandon_picking(&staff, id).await?))
}
