//! Axum route handlers for engagement tracking.
//!
//! The pixel and click endpoints answer immediately and record on a spawned
//! task; tracking problems never reach the recipient. Only ids and links that
//! belong to a sent email are recorded or followed.

use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::EngagementCounters;
use crate::models::feedback::StageEngagementRow;
use crate::state::AppState;
use crate::tracking::links::is_safe_redirect;

/// 1×1 transparent GIF.
const PIXEL_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00\x21\xf9\x04\x01\x00\x00\x00\x00\x2c\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02\x44\x01\x00\x3b";

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub candidate_id: Uuid,
    pub course_url: String,
}

fn pixel_response() -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, max-age=0"),
        ],
        PIXEL_GIF,
    )
        .into_response()
}

/// GET /api/v1/track/open/:candidate_id/:email_id
/// Always answers with the pixel, even for malformed ids.
pub async fn handle_open_pixel(
    State(state): State<AppState>,
    Path((candidate_id, email_id)): Path<(String, String)>,
) -> Response {
    match (Uuid::parse_str(&candidate_id), Uuid::parse_str(&email_id)) {
        (Ok(candidate_id), Ok(email_id)) => {
            let tracker = state.tracker.clone();
            tokio::spawn(async move {
                if tracker.knows_email(candidate_id, email_id).await {
                    tracker.record_open(candidate_id, email_id).await;
                } else {
                    debug!(%candidate_id, %email_id, "Ignoring open for unknown email");
                }
            });
        }
        _ => debug!(%candidate_id, %email_id, "Ignoring malformed open pixel"),
    }
    pixel_response()
}

/// GET /api/v1/track/click?cid&eid&url&utm_*
/// Redirects only to a link rendered into the email `eid` sent to `cid`.
pub async fn handle_click(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Redirect, AppError> {
    let target = params
        .get("url")
        .filter(|u| is_safe_redirect(u))
        .cloned()
        .ok_or_else(|| AppError::Validation("url must be an absolute http(s) URL".to_string()))?;
    let (candidate_id, email_id) = params
        .get("cid")
        .and_then(|c| Uuid::parse_str(c).ok())
        .zip(params.get("eid").and_then(|e| Uuid::parse_str(e).ok()))
        .ok_or_else(|| AppError::Validation("cid and eid must be valid ids".to_string()))?;

    if !state
        .tracker
        .allowed_click(candidate_id, email_id, &target)
        .await?
    {
        debug!(%candidate_id, %email_id, url = %target, "Rejected click to unknown target");
        return Err(AppError::Validation(
            "url is not a link from this email".to_string(),
        ));
    }

    let utm: BTreeMap<String, String> = params
        .iter()
        .filter(|(k, _)| k.starts_with("utm_"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let tracker = state.tracker.clone();
    let link_url = target.clone();
    tokio::spawn(async move {
        tracker
            .record_click(candidate_id, email_id, &link_url, &utm)
            .await
    });

    Ok(Redirect::to(&target))
}

/// POST /api/v1/track/enroll
pub async fn handle_enroll(
    State(state): State<AppState>,
    Json(req): Json<EnrollRequest>,
) -> Result<StatusCode, AppError> {
    if state.store.load_candidate(req.candidate_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Candidate {} not found",
            req.candidate_id
        )));
    }
    state
        .tracker
        .record_course_enrollment(req.candidate_id, &req.course_url)
        .await;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/candidates/:id/engagement/reconcile
pub async fn handle_reconcile(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<EngagementCounters>, AppError> {
    if state.store.load_candidate(candidate_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Candidate {candidate_id} not found")));
    }
    Ok(Json(state.tracker.reconcile_counters(candidate_id).await?))
}

/// GET /api/v1/companies/:id/analytics
pub async fn handle_analytics(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> Result<Json<Vec<StageEngagementRow>>, AppError> {
    if state.store.load_company(company_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Company {company_id} not found")));
    }
    Ok(Json(state.store.engagement_summary(company_id).await?))
}
