mod config;
mod db;
mod delivery;
mod errors;
mod generation;
mod llm_client;
mod mailer;
mod models;
mod render;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod tracking;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::create_pool;
use crate::delivery::bulk::{BatchRegistry, BulkDispatcher};
use crate::delivery::orchestrator::DeliveryOrchestrator;
use crate::delivery::queue::QueuedEmailWorker;
use crate::delivery::retry::RetryPolicy;
use crate::generation::enrich::{FeedbackEnricher, LlmEnricher, NoopEnricher};
use crate::llm_client::LlmClient;
use crate::mailer::send_cap::DailySendCap;
use crate::mailer::smtp::SmtpTransport;
use crate::mailer::EmailTransport;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::objects::S3ObjectStore;
use crate::store::postgres::PgFeedbackStore;
use crate::store::FeedbackStore;
use crate::tracking::tracker::EngagementTracker;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first: missing required variables abort startup
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Feedback API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store: Arc<dyn FeedbackStore> = Arc::new(PgFeedbackStore::new(db));

    // Redis (daily send cap)
    let redis = redis::Client::open(config.redis_url.clone())?;
    let send_cap = DailySendCap::new(redis);
    info!("Redis client initialized");

    // S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let objects = Arc::new(S3ObjectStore::new(
        s3,
        config.s3_bucket.clone(),
        config.s3_public_base_url.clone(),
    ));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // SMTP
    let transport = Arc::new(SmtpTransport::new(&config.smtp, send_cap.clone())?);
    info!(
        "Email transport initialized ({} via {}:{})",
        transport.name(),
        config.smtp.host,
        config.smtp.port
    );

    let enricher = build_enricher(&config)?;
    info!("Feedback enrichment backend: {}", enricher.backend());

    let orchestrator = Arc::new(
        DeliveryOrchestrator::new(store.clone(), objects, transport, enricher)
            .with_tracking_base_url(Some(config.tracking_base_url.clone())),
    );
    let worker = QueuedEmailWorker::new(orchestrator.clone());
    tokio::spawn(worker.run(config.queue_poll_interval));
    info!(
        "Queued email worker started (every {}s)",
        config.queue_poll_interval.as_secs()
    );

    let bulk = Arc::new(BulkDispatcher::new(
        orchestrator.clone(),
        config.bulk_send_delay,
    ));

    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        orchestrator,
        bulk,
        batches: Arc::new(BatchRegistry::default()),
        tracker: EngagementTracker::new(store),
        send_cap,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the dashboard host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// LLM enrichment when enabled and a key is present; otherwise pass-through.
fn build_enricher(config: &Config) -> Result<Arc<dyn FeedbackEnricher>> {
    match (config.enable_llm_enrichment, &config.anthropic_api_key) {
        (true, Some(key)) => {
            let client = LlmClient::new(key.clone(), RetryPolicy::standard())?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Ok(Arc::new(LlmEnricher(client)))
        }
        (true, None) => {
            warn!("ENABLE_LLM_ENRICHMENT is set but ANTHROPIC_API_KEY is missing; enrichment disabled");
            Ok(Arc::new(NoopEnricher))
        }
        (false, _) => Ok(Arc::new(NoopEnricher)),
    }
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "feedback-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
