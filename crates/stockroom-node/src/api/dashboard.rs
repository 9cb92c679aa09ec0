//! Operations dashboard counters.

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stockroom_core::DelaySummary;

use super::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct DelayDashboard {
    pub as_of: NaiveDate,
    #[serde(flatten)]
    pub summary: DelaySummary,
}

/// Delay counts across shipped orders, as of today.
pub async fn delay_summary(State(state): State<AppState>) -> ApiResult<Json<DelayDashboard>> {
    Ok(Json(DelayDashboard {
        as_of: state.fulfillment.today(),
        summary: state.fulfillment.delay_summary().await?,
    }))
}
