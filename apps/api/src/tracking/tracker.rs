//! Engagement tracking: opens, clicks and course enrollments.
//!
//! Every record call appends to the event log first, then bumps the cached
//! counter on the candidate. Nothing here returns an error to the caller; a
//! failed write is logged and dropped. A failed counter bump after a logged
//! event is repaired by `reconcile_counters`, since the log is authoritative.
//!
//! Clicks are only followed to links that were rendered into the email being
//! tracked; each report stores its own list of targets.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::generation::courses::is_course_provider_url;
use crate::models::candidate::EngagementCounters;
use crate::models::feedback::{EngagementEventType, NewAnalyticsEvent};
use crate::store::{FeedbackStore, StoreError};

#[derive(Clone)]
pub struct EngagementTracker {
    store: Arc<dyn FeedbackStore>,
}

impl EngagementTracker {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    pub async fn record_open(&self, candidate_id: Uuid, email_id: Uuid) {
        self.record(
            candidate_id,
            EngagementEventType::EmailOpened,
            json!({ "email_id": email_id }),
        )
        .await;
    }

    /// A click on a known course-provider URL also counts as an enrollment.
    pub async fn record_click(
        &self,
        candidate_id: Uuid,
        email_id: Uuid,
        link_url: &str,
        utm: &BTreeMap<String, String>,
    ) {
        self.record(
            candidate_id,
            EngagementEventType::EmailClicked,
            json!({ "email_id": email_id, "link_url": link_url, "utm": utm }),
        )
        .await;

        if is_course_provider_url(link_url) {
            self.record_course_enrollment(candidate_id, link_url).await;
        }
    }

    pub async fn record_course_enrollment(&self, candidate_id: Uuid, course_url: &str) {
        self.record(
            candidate_id,
            EngagementEventType::CourseEnrolled,
            json!({ "course_url": course_url }),
        )
        .await;
    }

    /// Whether `target` is one of the links rendered into email `email_id` for
    /// this candidate. An unknown email allows nothing.
    pub async fn allowed_click(
        &self,
        candidate_id: Uuid,
        email_id: Uuid,
        target: &str,
    ) -> Result<bool, StoreError> {
        let targets = self.store.report_link_targets(candidate_id, email_id).await?;
        Ok(targets
            .map(|targets| targets.iter().any(|t| t == target))
            .unwrap_or(false))
    }

    /// Whether a report was ever sent to this candidate under `email_id`.
    pub async fn knows_email(&self, candidate_id: Uuid, email_id: Uuid) -> bool {
        match self.store.report_link_targets(candidate_id, email_id).await {
            Ok(targets) => targets.is_some(),
            Err(e) => {
                warn!(%candidate_id, %email_id, error = %e, "Could not look up tracked email");
                false
            }
        }
    }

    /// Recomputes the cached counters from the event log.
    pub async fn reconcile_counters(
        &self,
        candidate_id: Uuid,
    ) -> Result<EngagementCounters, StoreError> {
        self.store.recompute_counters(candidate_id).await
    }

    async fn record(&self, candidate_id: Uuid, event_type: EngagementEventType, mut payload: Value) {
        let occurred_at = Utc::now();
        if let Value::Object(map) = &mut payload {
            map.insert("recorded_at".to_string(), json!(occurred_at));
        }
        let event = NewAnalyticsEvent {
            id: Uuid::new_v4(),
            candidate_id,
            event_type,
            payload,
            occurred_at,
        };

        if let Err(e) = self.store.append_event(&event).await {
            warn!(%candidate_id, %event_type, error = %e, "Dropping engagement event");
            return;
        }
        if let Err(e) = self.store.increment_counter(candidate_id, event_type).await {
            warn!(%candidate_id, %event_type, error = %e, "Counter not incremented; reconcile to repair");
            return;
        }
        info!(%candidate_id, %event_type, "Engagement recorded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::feedback::NewFeedbackReport;
    use crate::testing::{candidate_fixture, company_fixture, InMemoryStore, COMPANY_ID};

    fn setup() -> (Arc<InMemoryStore>, EngagementTracker, Uuid) {
        let store = Arc::new(InMemoryStore::with_company(company_fixture()));
        let id = store.insert_candidate(candidate_fixture("Alice", "Data Scientist", "Final Interview"));
        let tracker = EngagementTracker::new(store.clone());
        (store, tracker, id)
    }

    async fn sent_report(store: &InMemoryStore, candidate_id: Uuid, links: &[&str]) -> Uuid {
        let email_id = Uuid::new_v4();
        let report = NewFeedbackReport {
            id: Uuid::new_v4(),
            company_id: COMPANY_ID,
            candidate_id,
            content: json!({}),
            pdf_key: "feedback/report.pdf".to_string(),
            pdf_url: "https://objects.test/feedback/report.pdf".to_string(),
            email_id,
            link_targets: links.iter().map(|l| l.to_string()).collect(),
        };
        store.insert_report(&report).await.unwrap();
        email_id
    }

    #[tokio::test]
    async fn test_click_target_must_come_from_the_email() {
        let (store, tracker, id) = setup();
        let course = "https://www.coursera.org/learn/machine-learning";
        let email_id = sent_report(&store, id, &[course, "https://www.linkedin.com/jobs"]).await;

        assert!(tracker.allowed_click(id, email_id, course).await.unwrap());
        assert!(!tracker
            .allowed_click(id, email_id, "https://evil.example/phish")
            .await
            .unwrap());
        assert!(!tracker
            .allowed_click(id, email_id, "https://www.coursera.org/learn/other")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_email_allows_no_click_and_no_open() {
        let (store, tracker, id) = setup();
        let course = "https://www.coursera.org/learn/machine-learning";
        let email_id = sent_report(&store, id, &[course]).await;
        let other_candidate = Uuid::new_v4();

        assert!(!tracker.allowed_click(id, Uuid::new_v4(), course).await.unwrap());
        assert!(!tracker
            .allowed_click(other_candidate, email_id, course)
            .await
            .unwrap());
        assert!(tracker.knows_email(id, email_id).await);
        assert!(!tracker.knows_email(other_candidate, email_id).await);
    }

    #[tokio::test]
    async fn test_open_appends_event_and_increments_counter() {
        let (store, tracker, id) = setup();
        let email_id = Uuid::new_v4();

        tracker.record_open(id, email_id).await;

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EngagementEventType::EmailOpened);
        assert_eq!(events[0].payload["email_id"], json!(email_id));
        assert_eq!(store.counters(id).open_count, 1);
    }

    #[tokio::test]
    async fn test_course_click_chains_enrollment() {
        let (store, tracker, id) = setup();

        tracker
            .record_click(
                id,
                Uuid::new_v4(),
                "https://www.coursera.org/learn/machine-learning",
                &BTreeMap::new(),
            )
            .await;

        assert_eq!(store.events_of(id, EngagementEventType::EmailClicked), 1);
        assert_eq!(store.events_of(id, EngagementEventType::CourseEnrolled), 1);
        let counters = store.counters(id);
        assert_eq!(counters.click_count, 1);
        assert_eq!(counters.course_enrollment_count, 1);
    }

    #[tokio::test]
    async fn test_other_click_does_not_enroll() {
        let (store, tracker, id) = setup();
        let mut utm = BTreeMap::new();
        utm.insert("utm_source".to_string(), "feedback_email".to_string());

        tracker
            .record_click(id, Uuid::new_v4(), "https://www.linkedin.com/jobs", &utm)
            .await;

        assert_eq!(store.events_of(id, EngagementEventType::EmailClicked), 1);
        assert_eq!(store.events_of(id, EngagementEventType::CourseEnrolled), 0);
        assert_eq!(store.events()[0].payload["utm"]["utm_source"], "feedback_email");
    }

    #[tokio::test]
    async fn test_failed_append_is_swallowed() {
        let (store, tracker, id) = setup();
        store.fail_event_appends();

        tracker.record_open(id, Uuid::new_v4()).await;

        assert!(store.events().is_empty());
        assert_eq!(store.counters(id).open_count, 0);
    }

    #[tokio::test]
    async fn test_reconcile_repairs_counters_from_log() {
        let (store, tracker, id) = setup();
        store.fail_counter_increments(true);
        tracker.record_open(id, Uuid::new_v4()).await;
        tracker.record_open(id, Uuid::new_v4()).await;
        tracker
            .record_click(id, Uuid::new_v4(), "https://www.udemy.com/course/sql", &BTreeMap::new())
            .await;
        assert_eq!(store.counters(id), EngagementCounters::default());

        store.fail_counter_increments(false);
        let counters = tracker.reconcile_counters(id).await.unwrap();

        let expected = EngagementCounters {
            open_count: 2,
            click_count: 1,
            course_enrollment_count: 1,
        };
        assert_eq!(counters, expected);
        assert_eq!(store.counters(id), expected);
    }

    #[tokio::test]
    async fn test_reconcile_overwrites_drifted_counters() {
        let (store, tracker, id) = setup();
        tracker.record_open(id, Uuid::new_v4()).await;
        store.set_counters(
            id,
            EngagementCounters {
                open_count: 40,
                click_count: 7,
                course_enrollment_count: 3,
            },
        );

        let counters = tracker.reconcile_counters(id).await.unwrap();

        let expected = EngagementCounters {
            open_count: 1,
            click_count: 0,
            course_enrollment_count: 0,
        };
        assert_eq!(counters, expected);
        assert_eq!(store.counters(id), expected);
    }
}
