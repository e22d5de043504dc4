//! Axum route handlers for the Delivery API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::delivery::bulk::BatchStatus;
use crate::delivery::orchestrator::DraftPreview;
use crate::delivery::DeliveryResult;
use crate::errors::AppError;
use crate::mailer::send_cap::CapUsage;
use crate::state::AppState;

/// Largest batch accepted in one bulk request.
pub const MAX_BULK_CANDIDATES: usize = 500;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub candidate_ids: Vec<Uuid>,
    /// Client-chosen id, so the batch can be cancelled while it runs.
    pub batch_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkAccepted {
    pub batch_id: Uuid,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub batch_id: Uuid,
    pub cancelled: bool,
}

/// HTTP status for a single-delivery outcome. Queued is accepted, not failed.
pub fn delivery_status(result: &DeliveryResult) -> StatusCode {
    if result.success {
        return StatusCode::OK;
    }
    if result.queued {
        return StatusCode::ACCEPTED;
    }
    match result.error.as_ref().map(|e| e.kind) {
        Some("not_found") => StatusCode::NOT_FOUND,
        Some("render") => StatusCode::UNPROCESSABLE_ENTITY,
        Some("persistence") => StatusCode::SERVICE_UNAVAILABLE,
        Some("transport") => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/candidates/:id/feedback
/// The body is always a `DeliveryResult`; the status code mirrors its outcome.
pub async fn handle_deliver(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> (StatusCode, Json<DeliveryResult>) {
    let result = state.orchestrator.deliver_feedback(candidate_id).await;
    (delivery_status(&result), Json(result))
}

/// POST /api/v1/candidates/:id/feedback/draft
pub async fn handle_prepare_draft(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<DraftPreview>, AppError> {
    Ok(Json(state.orchestrator.prepare_draft(candidate_id).await?))
}

/// POST /api/v1/feedback/bulk
/// Starts the batch in the background and answers 202 with its id; poll
/// `GET /api/v1/feedback/bulk/:batch_id` for progress and the summary.
pub async fn handle_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkRequest>,
) -> Result<(StatusCode, Json<BulkAccepted>), AppError> {
    if req.candidate_ids.is_empty() {
        return Err(AppError::Validation("candidate_ids must not be empty".to_string()));
    }
    if req.candidate_ids.len() > MAX_BULK_CANDIDATES {
        return Err(AppError::Validation(format!(
            "at most {MAX_BULK_CANDIDATES} candidates per batch"
        )));
    }

    let batch_id = req.batch_id.unwrap_or_else(Uuid::new_v4);
    let total = req.candidate_ids.len();
    let handle = state
        .batches
        .register(batch_id, total)
        .ok_or_else(|| AppError::Conflict(format!("batch {batch_id} is already running")))?;

    state.bulk.spawn(handle, req.candidate_ids);
    info!(%batch_id, total, "Bulk delivery accepted");

    Ok((StatusCode::ACCEPTED, Json(BulkAccepted { batch_id, total })))
}

/// GET /api/v1/feedback/bulk/:batch_id
pub async fn handle_bulk_status(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchStatus>, AppError> {
    state
        .batches
        .status(batch_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Unknown batch {batch_id}")))
}

/// DELETE /api/v1/feedback/bulk/:batch_id
pub async fn handle_cancel_bulk(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<(StatusCode, Json<CancelResponse>), AppError> {
    if !state.batches.cancel(batch_id) {
        return Err(AppError::NotFound(format!("No running batch {batch_id}")));
    }
    info!(%batch_id, "Bulk cancellation requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse {
            batch_id,
            cancelled: true,
        }),
    ))
}

/// GET /api/v1/companies/:id/email-usage
/// Estimate only: the transport's reserve step is the authority.
pub async fn handle_email_usage(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<CapUsage>, AppError> {
    let company = state
        .store
        .load_company(company_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {company_id} not found")))?;
    let usage = state
        .send_cap
        .usage(company_id, company.sender().daily_cap)
        .await?;
    Ok(Json(usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{DeliveryError, RetryHint};

    #[test]
    fn test_status_distinguishes_outcomes() {
        let id = Uuid::nil();
        let sent = DeliveryResult::sent(id, id, id, "u".to_string(), 1);
        let queued = DeliveryResult::queued(id, id, "u".to_string(), "cap".to_string());
        let failed = DeliveryResult::failed(
            id,
            &DeliveryError::Transport {
                attempts: 1,
                message: "x".to_string(),
            },
            RetryHint::Manual,
        );
        let missing = DeliveryResult::failed(id, &DeliveryError::NotFound(id), RetryHint::Manual);

        assert_eq!(delivery_status(&sent), StatusCode::OK);
        assert_eq!(delivery_status(&queued), StatusCode::ACCEPTED);
        assert_eq!(delivery_status(&failed), StatusCode::BAD_GATEWAY);
        assert_eq!(delivery_status(&missing), StatusCode::NOT_FOUND);
    }
}
