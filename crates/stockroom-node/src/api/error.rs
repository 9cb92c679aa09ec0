//! Mapping of service errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use stockroom_core::FulfillmentError;
use tracing::error;

/// JSON error body: `{"error": <kind>, "message": <text>}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// A [`FulfillmentError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub FulfillmentError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            FulfillmentError::NotFound { .. } => StatusCode::NOT_FOUND,
            FulfillmentError::InvalidTransition { .. }
            | FulfillmentError::PickingIncomplete { .. }
            | FulfillmentError::NoActiveSession { .. }
            | FulfillmentError::SessionClosed { .. }
            | FulfillmentError::NotShipped { .. } => StatusCode::CONFLICT,
            FulfillmentError::Validation(_) | FulfillmentError::SerializationError(_) => {
                StatusCode::BAD_REQUEST
            }
            FulfillmentError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
