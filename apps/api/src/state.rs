use std::sync::Arc;

use crate::config::Config;
use crate::delivery::bulk::{BatchRegistry, BulkDispatcher};
use crate::delivery::orchestrator::DeliveryOrchestrator;
use crate::mailer::send_cap::DailySendCap;
use crate::store::FeedbackStore;
use crate::tracking::tracker::EngagementTracker;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn FeedbackStore>,
    pub orchestrator: Arc<DeliveryOrchestrator>,
    pub bulk: Arc<BulkDispatcher>,
    /// Running and recently finished bulk batches.
    pub batches: Arc<BatchRegistry>,
    pub tracker: EngagementTracker,
    /// Read side of the transport's daily counter, for the usage estimate.
    pub send_cap: DailySendCap,
}
