//! In-memory fakes and fixtures shared by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::delivery::orchestrator::DeliveryOrchestrator;
use crate::delivery::retry::RetryPolicy;
use crate::generation::enrich::NoopEnricher;
use crate::mailer::{EmailTransport, OutboundEmail, TransportReceipt};
use crate::models::candidate::{CandidateRow, CandidateStatus, EngagementCounters};
use crate::models::company::CompanyRow;
use crate::models::feedback::{
    CampaignStatus, EngagementEventType, NewAnalyticsEvent, NewCampaign, NewFeedbackReport,
    QueuedEmail, StageEngagementRow,
};
use crate::store::{FeedbackStore, ObjectStore, ObjectStoreError, StoreError};

pub const COMPANY_ID: Uuid = Uuid::from_u128(0xC0);
pub const TRACKING_BASE_URL: &str = "https://track.test";

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

pub fn company_fixture() -> CompanyRow {
    CompanyRow {
        id: COMPANY_ID,
        name: "Acme Robotics".to_string(),
        logo_key: None,
        primary_color: "#1D4ED8".to_string(),
        secondary_color: "#F59E0B".to_string(),
        daily_email_cap: 100,
        sender_name: "Acme Talent Team".to_string(),
        sender_email: "talent@acme.test".to_string(),
        resume_fix_url: None,
        learning_url: None,
        reapply_url: Some("https://acme.test/careers".to_string()),
        footer_message: None,
    }
}

pub fn candidate_fixture(name: &str, position: &str, stage: &str) -> CandidateRow {
    let created = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
    let slug: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    CandidateRow {
        id: Uuid::new_v4(),
        company_id: COMPANY_ID,
        name: name.to_string(),
        email: format!("{slug}@example.test"),
        position: position.to_string(),
        rejection_stage: stage.to_string(),
        rejection_reason: None,
        status: CandidateStatus::NotSent.as_str().to_string(),
        open_count: 0,
        click_count: 0,
        course_enrollment_count: 0,
        reapplied: false,
        created_at: created,
        updated_at: created,
    }
}

/// Orchestrator over the given fakes with zero-delay retries and tracking on.
pub fn orchestrator_fixture(
    store: Arc<InMemoryStore>,
    objects: Arc<InMemoryObjectStore>,
    transport: Arc<ScriptedTransport>,
) -> DeliveryOrchestrator {
    DeliveryOrchestrator::new(store, objects, transport, Arc::new(NoopEnricher))
        .with_retry(RetryPolicy::immediate(3))
        .with_tracking_base_url(Some(TRACKING_BASE_URL.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// InMemoryStore
// ────────────────────────────────────────────────────────────────────────────

/// Campaign as the test store keeps it.
#[derive(Debug, Clone)]
pub struct CampaignRecord {
    pub company_id: Uuid,
    pub label: String,
    pub recipient_count: i32,
    pub sent_count: i32,
    pub status: String,
}

#[derive(Default)]
struct StoreState {
    candidates: HashMap<Uuid, CandidateRow>,
    companies: HashMap<Uuid, CompanyRow>,
    reports: Vec<NewFeedbackReport>,
    campaigns: HashMap<Uuid, CampaignRecord>,
    events: Vec<NewAnalyticsEvent>,
    queue: Vec<QueuedEmail>,
    /// candidate id → remaining report-insert failures
    report_failures: HashMap<Uuid, u32>,
    load_failures: u32,
    fail_status_updates: bool,
    fail_counter_increments: bool,
    fail_event_appends: bool,
    fail_queue_inserts: bool,
    /// company ids whose campaign inserts fail
    fail_campaign_ids: HashSet<Uuid>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

fn unavailable(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} rejected by test store"))
}

impl InMemoryStore {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub fn with_company(company: CompanyRow) -> Self {
        let store = Self::default();
        store.insert_company(company);
        store
    }

    pub fn insert_company(&self, company: CompanyRow) {
        self.state().companies.insert(company.id, company);
    }

    pub fn insert_candidate(&self, candidate: CandidateRow) -> Uuid {
        let id = candidate.id;
        self.state().candidates.insert(id, candidate);
        id
    }

    pub fn candidate(&self, id: Uuid) -> CandidateRow {
        self.state().candidates[&id].clone()
    }

    pub fn reports(&self) -> Vec<NewFeedbackReport> {
        self.state().reports.clone()
    }

    pub fn campaigns(&self) -> HashMap<Uuid, CampaignRecord> {
        self.state().campaigns.clone()
    }

    pub fn queued_emails(&self) -> Vec<QueuedEmail> {
        self.state().queue.clone()
    }

    pub fn events(&self) -> Vec<NewAnalyticsEvent> {
        self.state().events.clone()
    }

    pub fn events_of(&self, candidate_id: Uuid, kind: EngagementEventType) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| e.candidate_id == candidate_id && e.event_type == kind)
            .count()
    }

    /// The next `times` report inserts for `candidate_id` fail.
    pub fn fail_report_inserts(&self, candidate_id: Uuid, times: u32) {
        self.state().report_failures.insert(candidate_id, times);
    }

    pub fn fail_loads(&self, times: u32) {
        self.state().load_failures = times;
    }

    pub fn fail_status_updates(&self) {
        self.state().fail_status_updates = true;
    }

    pub fn fail_counter_increments(&self, fail: bool) {
        self.state().fail_counter_increments = fail;
    }

    pub fn fail_campaigns_for(&self, company_id: Uuid) {
        self.state().fail_campaign_ids.insert(company_id);
    }

    pub fn fail_event_appends(&self) {
        self.state().fail_event_appends = true;
    }

    pub fn fail_queue_inserts(&self) {
        self.state().fail_queue_inserts = true;
    }

    pub fn set_counters(&self, candidate_id: Uuid, counters: EngagementCounters) {
        if let Some(c) = self.state().candidates.get_mut(&candidate_id) {
            c.open_count = counters.open_count;
            c.click_count = counters.click_count;
            c.course_enrollment_count = counters.course_enrollment_count;
        }
    }

    pub fn counters(&self, candidate_id: Uuid) -> EngagementCounters {
        let c = self.candidate(candidate_id);
        EngagementCounters {
            open_count: c.open_count,
            click_count: c.click_count,
            course_enrollment_count: c.course_enrollment_count,
        }
    }
}

#[async_trait]
impl FeedbackStore for InMemoryStore {
    async fn load_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Option<(CandidateRow, CompanyRow)>, StoreError> {
        let mut state = self.state();
        if state.load_failures > 0 {
            state.load_failures -= 1;
            return Err(unavailable("load"));
        }
        let Some(candidate) = state.candidates.get(&candidate_id).cloned() else {
            return Ok(None);
        };
        Ok(state
            .companies
            .get(&candidate.company_id)
            .cloned()
            .map(|company| (candidate, company)))
    }

    async fn load_company(&self, company_id: Uuid) -> Result<Option<CompanyRow>, StoreError> {
        Ok(self.state().companies.get(&company_id).cloned())
    }

    async fn insert_report(&self, report: &NewFeedbackReport) -> Result<(), StoreError> {
        let mut state = self.state();
        if let Some(remaining) = state.report_failures.get_mut(&report.candidate_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(unavailable("report insert"));
            }
        }
        state.reports.push(report.clone());
        Ok(())
    }

    async fn report_link_targets(
        &self,
        candidate_id: Uuid,
        email_id: Uuid,
    ) -> Result<Option<Vec<String>>, StoreError> {
        Ok(self
            .state()
            .reports
            .iter()
            .find(|r| r.candidate_id == candidate_id && r.email_id == email_id)
            .map(|r| r.link_targets.clone()))
    }

    async fn enqueue_email(&self, queued: &QueuedEmail) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_queue_inserts {
            return Err(unavailable("queue insert"));
        }
        let report_id = queued.pending.report_id;
        match state.queue.iter_mut().find(|q| q.pending.report_id == report_id) {
            Some(existing) => {
                existing.not_before = queued.not_before;
                existing.deferrals += 1;
            }
            None => state.queue.push(queued.clone()),
        }
        Ok(())
    }

    async fn due_queued_emails(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<QueuedEmail>, StoreError> {
        let mut due: Vec<QueuedEmail> = self
            .state()
            .queue
            .iter()
            .filter(|q| q.not_before <= now)
            .cloned()
            .collect();
        due.sort_by_key(|q| q.not_before);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn remove_queued_email(&self, report_id: Uuid) -> Result<(), StoreError> {
        self.state().queue.retain(|q| q.pending.report_id != report_id);
        Ok(())
    }

    async fn open_campaign(&self, campaign: &NewCampaign) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_campaign_ids.contains(&campaign.company_id) {
            return Err(unavailable("campaign insert"));
        }
        state.campaigns.insert(
            campaign.id,
            CampaignRecord {
                company_id: campaign.company_id,
                label: campaign.label.clone(),
                recipient_count: campaign.recipient_count,
                sent_count: 0,
                status: CampaignStatus::Sending.as_str().to_string(),
            },
        );
        Ok(())
    }

    async fn add_campaign_recipient(&self, campaign_id: Uuid) -> Result<(), StoreError> {
        if let Some(c) = self.state().campaigns.get_mut(&campaign_id) {
            c.recipient_count += 1;
        }
        Ok(())
    }

    async fn record_campaign_send(&self, campaign_id: Uuid) -> Result<(), StoreError> {
        if let Some(c) = self.state().campaigns.get_mut(&campaign_id) {
            c.sent_count += 1;
        }
        Ok(())
    }

    async fn complete_campaign(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), StoreError> {
        if let Some(c) = self.state().campaigns.get_mut(&campaign_id) {
            c.status = status.as_str().to_string();
        }
        Ok(())
    }

    async fn advance_candidate_status(
        &self,
        candidate_id: Uuid,
        status: CandidateStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.state();
        if state.fail_status_updates {
            return Err(unavailable("status update"));
        }
        match state.candidates.get_mut(&candidate_id) {
            Some(c) if c.status().can_advance_to(status) => {
                c.status = status.as_str().to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_event(&self, event: &NewAnalyticsEvent) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_event_appends {
            return Err(unavailable("event append"));
        }
        state.events.push(event.clone());
        Ok(())
    }

    async fn increment_counter(
        &self,
        candidate_id: Uuid,
        event_type: EngagementEventType,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_counter_increments {
            return Err(unavailable("counter increment"));
        }
        if let Some(c) = state.candidates.get_mut(&candidate_id) {
            match event_type {
                EngagementEventType::EmailOpened => c.open_count += 1,
                EngagementEventType::EmailClicked => c.click_count += 1,
                EngagementEventType::CourseEnrolled => c.course_enrollment_count += 1,
            }
        }
        Ok(())
    }

    async fn recompute_counters(
        &self,
        candidate_id: Uuid,
    ) -> Result<EngagementCounters, StoreError> {
        let mut state = self.state();
        let count = |kind: EngagementEventType| {
            state
                .events
                .iter()
                .filter(|e| e.candidate_id == candidate_id && e.event_type == kind)
                .count() as i32
        };
        let counters = EngagementCounters {
            open_count: count(EngagementEventType::EmailOpened),
            click_count: count(EngagementEventType::EmailClicked),
            course_enrollment_count: count(EngagementEventType::CourseEnrolled),
        };
        match state.candidates.get_mut(&candidate_id) {
            Some(c) => {
                c.open_count = counters.open_count;
                c.click_count = counters.click_count;
                c.course_enrollment_count = counters.course_enrollment_count;
                Ok(counters)
            }
            None => Err(StoreError::Database(sqlx::Error::RowNotFound)),
        }
    }

    async fn engagement_summary(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<StageEngagementRow>, StoreError> {
        let state = self.state();
        let mut rows: Vec<StageEngagementRow> = Vec::new();
        let mut candidates: Vec<&CandidateRow> = state
            .candidates
            .values()
            .filter(|c| c.company_id == company_id)
            .collect();
        candidates.sort_by(|a, b| a.rejection_stage.cmp(&b.rejection_stage));
        for c in candidates {
            if rows.last().map(|r| r.rejection_stage != c.rejection_stage).unwrap_or(true) {
                rows.push(StageEngagementRow {
                    rejection_stage: c.rejection_stage.clone(),
                    candidates: 0,
                    sent: 0,
                    opened: 0,
                    clicked: 0,
                    enrolled: 0,
                });
            }
            if let Some(row) = rows.last_mut() {
                row.candidates += 1;
                row.sent += (c.status() == CandidateStatus::Sent) as i64;
                row.opened += (c.open_count > 0) as i64;
                row.clicked += (c.click_count > 0) as i64;
                row.enrolled += (c.course_enrollment_count > 0) as i64;
            }
        }
        Ok(rows)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// InMemoryObjectStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    put_failures: Mutex<u32>,
}

impl InMemoryObjectStore {
    pub fn put(&self, key: &str, bytes: Bytes) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn fail_puts(&self, times: u32) {
        *self.put_failures.lock().unwrap() = times;
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        {
            let mut failures = self.put_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ObjectStoreError::Request(format!("put {key} rejected")));
            }
        }
        self.put(key, body);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.get(key)
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://objects.test/{key}")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedTransport
// ────────────────────────────────────────────────────────────────────────────

/// Replays scripted receipts in order, then `Sent` for everything after.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<TransportReceipt>>,
    submitted: Mutex<Vec<OutboundEmail>>,
}

impl ScriptedTransport {
    pub fn scripted(receipts: Vec<TransportReceipt>) -> Self {
        Self {
            script: Mutex::new(receipts.into()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn failed(error: &str) -> TransportReceipt {
        TransportReceipt::Failed {
            error: error.to_string(),
        }
    }

    pub fn queued() -> TransportReceipt {
        TransportReceipt::Queued {
            reason: "Daily limit of 100 emails reached.".to_string(),
        }
    }

    pub fn submitted(&self) -> Vec<OutboundEmail> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for ScriptedTransport {
    async fn submit(&self, email: &OutboundEmail) -> TransportReceipt {
        self.submitted.lock().unwrap().push(email.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| TransportReceipt::Sent {
                message_id: format!("<{}@acme.test>", email.tracking_id),
            })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
