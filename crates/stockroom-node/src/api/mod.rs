//! HTTP and WebSocket endpoints.

pub mod dashboard;
pub mod error;
pub mod health;
pub mod orders;
pub mod picking;
pub mod shipping;
pub mod staff;
pub mod track;
pub mod ws;

pub use error::ApiError;
pub use staff::Staff;

/// Result type for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
