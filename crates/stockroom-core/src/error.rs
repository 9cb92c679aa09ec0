//! Error types for fulfillment operations.

use thiserror::Error;
use uuid::Uuid;

use crate::types::OrderStatus;

/// Main error type for fulfillment operations.
#[derive(Error, Debug, Clone)]
pub enum FulfillmentError {
    /// The order is not in a state that allows the requested transition.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Picking cannot be finalized until every unit is verified.
    #[error("Picking incomplete for order {order_id}: {scanned}/{required} units verified")]
    PickingIncomplete {
        order_id: Uuid,
        scanned: u32,
        required: u32,
    },

    /// No open pick-verify session exists for the order.
    #[error("No open picking session for order {order_id}")]
    NoActiveSession { order_id: Uuid },

    /// The session was already completed or abandoned.
    #[error("Picking session {session_id} is {state}")]
    SessionClosed { session_id: Uuid, state: String },

    /// Shipping status only exists once the order has shipped.
    #[error("Order {order_id} has not shipped (status {status})")]
    NotShipped { order_id: Uuid, status: OrderStatus },

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No principal was supplied for a staff operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// An external collaborator (catalog, notifier, inventory) failed.
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: String,
        message: String,
    },

    /// Order store error.
    #[error("State store error: {message}")]
    StateError { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A remote node refused the request.
    #[error("Rejected by node ({kind}): {message}")]
    Rejected { kind: String, message: String },

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FulfillmentError {
    /// Shorthand for a missing order.
    pub fn order_not_found(id: impl ToString) -> Self {
        FulfillmentError::NotFound {
            resource_type: "Order".to_string(),
            id: id.to_string(),
        }
    }

    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentError::InvalidTransition { .. } => "invalid_transition",
            FulfillmentError::PickingIncomplete { .. } => "picking_incomplete",
            FulfillmentError::NoActiveSession { .. } => "no_active_session",
            FulfillmentError::SessionClosed { .. } => "session_closed",
            FulfillmentError::NotShipped { .. } => "not_shipped",
            FulfillmentError::Validation(_) => "validation",
            FulfillmentError::Unauthorized(_) => "unauthorized",
            FulfillmentError::NotFound { .. } => "not_found",
            FulfillmentError::Collaborator { .. } => "collaborator",
            FulfillmentError::StateError { .. } => "state",
            FulfillmentError::SerializationError(_) => "serialization",
            FulfillmentError::ConnectionError(_) => "connection",
            FulfillmentError::Rejected { .. } => "rejected",
            FulfillmentError::Internal(_) => "internal",
        }
    }

    /// Returns true if the error reflects a precondition the caller can
    /// observe beforehand (the action should have been disabled).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            FulfillmentError::InvalidTransition { .. }
                | FulfillmentError::PickingIncomplete { .. }
                | FulfillmentError::NoActiveSession { .. }
                | FulfillmentError::SessionClosed { .. }
                | FulfillmentError::NotShipped { .. }
        )
    }

    /// Returns the order ID if available.
    pub fn order_id(&self) -> Option<Uuid> {
        match self {
            FulfillmentError::InvalidTransition { order_id, .. } => Some(*order_id),
            FulfillmentError::PickingIncomplete { order_id, .. } => Some(*order_id),
            FulfillmentError::NoActiveSession { order_id } => Some(*order_id),
            FulfillmentError::NotShipped { order_id, .. } => Some(*order_id),
            _ => None,
        }
    }
}

/// Convenience Result type for fulfillment operations.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

impl From<serde_json::Error> for FulfillmentError {
    fn from(err: serde_json::Error) -> Self {
        FulfillmentError::SerializationError(err.to_string())
    }
}
