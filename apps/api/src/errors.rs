use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::delivery::DeliveryError;
use crate::mailer::EmailError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Send cap error: {0}")]
    SendCap(#[from] EmailError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Delivery(e) => match e {
                DeliveryError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                DeliveryError::Render(_) => {
                    tracing::error!("Render error: {e}");
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "RENDER_ERROR",
                        "The feedback document could not be rendered".to_string(),
                    )
                }
                DeliveryError::Persistence { .. } => {
                    tracing::error!("Persistence error: {e}");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "PERSISTENCE_ERROR",
                        "The feedback report could not be saved; try again later".to_string(),
                    )
                }
                DeliveryError::Transport { .. } => {
                    tracing::error!("Transport error: {e}");
                    (
                        StatusCode::BAD_GATEWAY,
                        "TRANSPORT_ERROR",
                        "The email could not be sent".to_string(),
                    )
                }
                DeliveryError::Internal(_) => {
                    tracing::error!("Internal delivery error: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal server error occurred".to_string(),
                    )
                }
            },
            AppError::SendCap(e) => {
                tracing::error!("Send cap error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SEND_CAP_UNAVAILABLE",
                    "Email usage is unavailable right now".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_delivery_errors_map_to_distinct_statuses() {
        let cases = [
            (DeliveryError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (
                DeliveryError::Persistence {
                    operation: "store feedback report",
                    attempts: 3,
                    message: "timeout".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                DeliveryError::Transport {
                    attempts: 1,
                    message: "refused".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
