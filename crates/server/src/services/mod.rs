//! The two engines at the heart of the broker.
//!
//! - [`OrderService`] owns the order status state machine and the
//!   chat-closure gate.
//! - [`ChatService`] owns message append and room closure.
//!
//! Every operation runs as an independent unit of work; correctness under
//! concurrent access to the same order or room comes from the gateway's
//! conditional writes, not from in-process locking. A caller dropping the
//! future cancels the operation at its next await point; already-committed
//! writes (including enqueued notifications) stand.

pub mod chat;
pub mod orders;

use thiserror::Error;

use atelier_core::OrderStatus;

use crate::db::RepositoryError;

pub use chat::ChatService;
pub use orders::{CreateOrder, OrderService};

/// Failures surfaced by the engines.
///
/// Each kind maps to a distinct response code at the transport boundary;
/// none of them is ever collapsed into a generic error.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// An entity ID did not resolve.
    #[error("{0}")]
    NotFound(String),

    /// The access policy denied the operation, or a hard gate (closed room,
    /// non-admin closure) rejected it.
    #[error("{0}")]
    Forbidden(String),

    /// The requested status edge is not in the transition table.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the order is currently in.
        from: OrderStatus,
        /// Status the caller asked for.
        to: OrderStatus,
    },

    /// PROCESSING was requested while the order's chat room is still open.
    #[error("chat room must be closed before moving to PROCESSING")]
    GatingViolation,

    /// A conditional write lost a race twice in a row.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed input (empty description, non-positive quantity, ...).
    #[error("{0}")]
    Validation(String),

    /// The backing store failed; not a domain outcome.
    #[error("storage error: {0}")]
    Storage(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("resource not found".to_string()),
            RepositoryError::Conflict(reason) => Self::Conflict(reason),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_conflict_maps_to_conflict() {
        let err: ServiceError = RepositoryError::Conflict("lost the race".to_string()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let err: ServiceError = RepositoryError::NotFound.into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn test_database_errors_map_to_storage() {
        let err: ServiceError = RepositoryError::DataCorruption("bad row".to_string()).into();
        assert!(matches!(err, ServiceError::Storage(_)));
    }

    #[test]
    fn test_gating_violation_message() {
        assert_eq!(
            ServiceError::GatingViolation.to_string(),
            "chat room must be closed before moving to PROCESSING"
        );
    }

    #[test]
    fn test_invalid_transition_message_names_both_ends() {
        let err = ServiceError::InvalidTransition {
            from: OrderStatus::Completed,
            to: OrderStatus::Processing,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition: COMPLETED -> PROCESSING"
        );
    }
}
