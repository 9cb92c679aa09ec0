//! Public order tracking.
//!
//! Read-only and unauthenticated. Customers look their order up by code.

use axum::{
    extract::{Path, State},
    Json,
};
use stockroom_core::TrackingProjection;

use super::ApiResult;
use crate::state::AppState;

pub async fn track_order(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<TrackingProjection>> {
    Ok(Json(state.fulfillment.track_order(&code).await?))
}
