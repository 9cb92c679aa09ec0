//! Staff principal extraction.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use stockroom_core::{FulfillmentError, Principal};

use super::ApiError;

/// Header carrying the staff id of the caller.
pub const STAFF_HEADER: &str = "x-staff-id";

/// The staff member making the request. Rejects with 401 when the header is
/// missing or blank.
#[derive(Debug, Clone)]
pub struct Staff(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for Staff
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(STAFF_HEADER)
            .ok_or_else(|| {
                FulfillmentError::Unauthorized(format!("missing {} header", STAFF_HEADER))
            })?
            .to_str()
            .map_err(|_| {
                FulfillmentError::Unauthorized(format!("{} header is not text", STAFF_HEADER))
            })?;

        Ok(Staff(Principal::new(value)?))
    }
}
