//! Unified error handling for the HTTP surface.
//!
//! Every [`ServiceError`] kind maps to its own response code and a stable
//! machine-readable `error` tag, so clients can distinguish a gating
//! violation from a plain conflict without parsing prose.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::ServiceError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// An engine rejected or failed the operation.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The request carried no usable actor identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// JSON body returned for every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable machine-readable error kind.
    error: &'static str,
    /// Human-readable reason.
    message: String,
}

impl AppError {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Service(service) => match service {
                ServiceError::NotFound(_) => "not_found",
                ServiceError::Forbidden(_) => "forbidden",
                ServiceError::InvalidTransition { .. } => "invalid_transition",
                ServiceError::GatingViolation => "gating_violation",
                ServiceError::Conflict(_) => "conflict",
                ServiceError::Validation(_) => "validation",
                ServiceError::Storage(_) => "internal",
            },
            Self::Unauthorized(_) => "unauthorized",
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::Service(service) => match service {
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                ServiceError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ServiceError::GatingViolation | ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Service(ServiceError::Storage(_))) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request failed with storage error"
            );
        }

        let status = self.status();
        let kind = self.kind();

        // Don't expose internal error details to clients
        let message = if matches!(self, Self::Service(ServiceError::Storage(_))) {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                error: kind,
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use atelier_core::OrderStatus;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_each_service_error_kind_gets_its_own_code() {
        assert_eq!(
            get_status(ServiceError::NotFound("Order not found".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(ServiceError::Forbidden("nope".to_string()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(
                ServiceError::InvalidTransition {
                    from: OrderStatus::Completed,
                    to: OrderStatus::Review,
                }
                .into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(ServiceError::GatingViolation.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(ServiceError::Conflict("raced".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(ServiceError::Validation("bad quantity".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unauthorized_status() {
        assert_eq!(
            get_status(AppError::Unauthorized("missing identity".to_string())),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_kind_distinguishes_gating_from_conflict() {
        let gating: AppError = ServiceError::GatingViolation.into();
        let conflict: AppError = ServiceError::Conflict("raced".to_string()).into();
        assert_eq!(gating.kind(), "gating_violation");
        assert_eq!(conflict.kind(), "conflict");
    }
}
