//! Persistence seams: relational store for candidates, reports, campaigns and
//! events, plus an object store for PDFs and logos.

pub mod objects;
pub mod postgres;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::candidate::{CandidateRow, CandidateStatus, EngagementCounters};
use crate::models::company::CompanyRow;
use crate::models::feedback::{
    CampaignStatus, EngagementEventType, NewAnalyticsEvent, NewCampaign, NewFeedbackReport,
    QueuedEmail, StageEngagementRow,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object store request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Candidate joined with its owning company.
    async fn load_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Option<(CandidateRow, CompanyRow)>, StoreError>;

    async fn load_company(&self, company_id: Uuid) -> Result<Option<CompanyRow>, StoreError>;

    async fn insert_report(&self, report: &NewFeedbackReport) -> Result<(), StoreError>;

    /// Link targets of the report sent to `candidate_id` in email `email_id`.
    async fn report_link_targets(
        &self,
        candidate_id: Uuid,
        email_id: Uuid,
    ) -> Result<Option<Vec<String>>, StoreError>;

    /// Holds an email until `not_before`. Queuing the same report again moves
    /// its time and counts one more deferral.
    async fn enqueue_email(&self, queued: &QueuedEmail) -> Result<(), StoreError>;

    /// Queued emails whose `not_before` has passed, oldest first.
    async fn due_queued_emails(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<QueuedEmail>, StoreError>;

    async fn remove_queued_email(&self, report_id: Uuid) -> Result<(), StoreError>;

    async fn open_campaign(&self, campaign: &NewCampaign) -> Result<(), StoreError>;

    async fn add_campaign_recipient(&self, campaign_id: Uuid) -> Result<(), StoreError>;

    async fn record_campaign_send(&self, campaign_id: Uuid) -> Result<(), StoreError>;

    async fn complete_campaign(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), StoreError>;

    /// Moves the candidate to `status` only if that is a forward move.
    /// Returns whether a row changed.
    async fn advance_candidate_status(
        &self,
        candidate_id: Uuid,
        status: CandidateStatus,
    ) -> Result<bool, StoreError>;

    async fn append_event(&self, event: &NewAnalyticsEvent) -> Result<(), StoreError>;

    async fn increment_counter(
        &self,
        candidate_id: Uuid,
        event_type: EngagementEventType,
    ) -> Result<(), StoreError>;

    /// Rebuilds the cached counters from the event log and writes them back.
    async fn recompute_counters(&self, candidate_id: Uuid)
        -> Result<EngagementCounters, StoreError>;

    async fn engagement_summary(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<StageEngagementRow>, StoreError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    async fn get_object(&self, key: &str) -> Result<Bytes, ObjectStoreError>;

    /// Publicly retrievable URL for `key`. Pure; does not check existence.
    fn public_url(&self, key: &str) -> String;
}

pub fn report_pdf_key(company_id: Uuid, report_id: Uuid) -> String {
    format!("feedback/{company_id}/{report_id}.pdf")
}
