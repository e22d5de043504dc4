//! Axum route handlers for the Generation API.

use axum::Json;

use crate::errors::AppError;
use crate::generation::generator::{generate, FeedbackDocument, GenerateRequest};

/// Longest accepted position / stage / reason text.
const MAX_FIELD_CHARS: usize = 500;

/// POST /api/v1/feedback/generate
/// Pure preview: no candidate, no persistence, no enrichment.
pub async fn handle_generate(
    Json(req): Json<GenerateRequest>,
) -> Result<Json<FeedbackDocument>, AppError> {
    let fields = [
        ("position", req.position.as_str()),
        ("rejection_stage", req.rejection_stage.as_str()),
        ("rejection_reason", req.rejection_reason.as_deref().unwrap_or("")),
    ];
    for (name, value) in fields {
        if value.chars().count() > MAX_FIELD_CHARS {
            return Err(AppError::Validation(format!(
                "{name} must be at most {MAX_FIELD_CHARS} characters"
            )));
        }
    }

    Ok(Json(generate(
        &req.position,
        &req.rejection_stage,
        req.rejection_reason.as_deref(),
    )))
}
