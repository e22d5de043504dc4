pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::delivery::handlers as delivery;
use crate::generation::handlers as generation;
use crate::state::AppState;
use crate::tracking::handlers as tracking;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Generation
        .route(
            "/api/v1/feedback/generate",
            post(generation::handle_generate),
        )
        // Delivery
        .route(
            "/api/v1/candidates/:id/feedback",
            post(delivery::handle_deliver),
        )
        .route(
            "/api/v1/candidates/:id/feedback/draft",
            post(delivery::handle_prepare_draft),
        )
        .route("/api/v1/feedback/bulk", post(delivery::handle_bulk))
        .route(
            "/api/v1/feedback/bulk/:batch_id",
            get(delivery::handle_bulk_status).delete(delivery::handle_cancel_bulk),
        )
        .route(
            "/api/v1/companies/:id/email-usage",
            get(delivery::handle_email_usage),
        )
        // Tracking
        .route(
            "/api/v1/track/open/:candidate_id/:email_id",
            get(tracking::handle_open_pixel),
        )
        .route("/api/v1/track/click", get(tracking::handle_click))
        .route("/api/v1/track/enroll", post(tracking::handle_enroll))
        .route(
            "/api/v1/candidates/:id/engagement/reconcile",
            post(tracking::handle_reconcile),
        )
        .route(
            "/api/v1/companies/:id/analytics",
            get(tracking::handle_analytics),
        )
        .with_state(state)
}
