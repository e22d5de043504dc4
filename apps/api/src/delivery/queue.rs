//! Resends emails the daily cap deferred. Each run picks up everything whose
//! `not_before` has passed and pushes it back through the send step with the
//! report and tracking id it was queued with.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::delivery::campaign::CampaignLedger;
use crate::delivery::orchestrator::DeliveryOrchestrator;
use crate::delivery::retry::RetryPolicy;
use crate::store::StoreError;

pub const DEFAULT_QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(900);

/// Upper bound on emails resent per run.
const BATCH_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueRun {
    pub sent: u32,
    pub requeued: u32,
    pub failed: u32,
}

pub struct QueuedEmailWorker {
    orchestrator: Arc<DeliveryOrchestrator>,
}

impl QueuedEmailWorker {
    pub fn new(orchestrator: Arc<DeliveryOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// One pass over the due queue.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<QueueRun, StoreError> {
        let store = self.orchestrator.store();
        let due = store.due_queued_emails(now, BATCH_LIMIT).await?;
        if due.is_empty() {
            return Ok(QueueRun::default());
        }
        info!(count = due.len(), "Resending queued feedback emails");

        let ledger = CampaignLedger::new("Queued feedback");
        let mut run = QueueRun::default();
        for queued in due {
            let pending = &queued.pending;
            let result = self
                .orchestrator
                .send_pending(pending, &ledger, &RetryPolicy::immediate(1), |_| {})
                .await;

            if result.queued {
                // send_pending already pushed it to the next reset
                run.requeued += 1;
                continue;
            }
            let final_failure = result
                .error
                .as_ref()
                .map(|e| e.kind == "transport")
                .unwrap_or(false);
            if result.success {
                run.sent += 1;
            } else {
                run.failed += 1;
                if !final_failure {
                    warn!(
                        candidate_id = %pending.candidate_id,
                        report_id = %pending.report_id,
                        "Queued email kept for the next run"
                    );
                    continue;
                }
            }
            if let Err(e) = store.remove_queued_email(pending.report_id).await {
                warn!(report_id = %pending.report_id, error = %e, "Could not remove queued email");
            }
        }
        ledger.close(store, false).await;

        info!(sent = run.sent, requeued = run.requeued, failed = run.failed, "Queue run finished");
        Ok(run)
    }

    /// Polls the queue every `every` until the task is dropped.
    pub async fn run(self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_due(Utc::now()).await {
                warn!(error = %e, "Queue run failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::TransportReceipt;
    use crate::models::feedback::CampaignStatus;
    use crate::testing::{
        candidate_fixture, company_fixture, orchestrator_fixture, InMemoryObjectStore,
        InMemoryStore, ScriptedTransport,
    };
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    struct Harness {
        store: Arc<InMemoryStore>,
        transport: Arc<ScriptedTransport>,
        orchestrator: Arc<DeliveryOrchestrator>,
        worker: QueuedEmailWorker,
    }

    fn harness(receipts: Vec<TransportReceipt>) -> Harness {
        let store = Arc::new(InMemoryStore::with_company(company_fixture()));
        let objects = Arc::new(InMemoryObjectStore::default());
        let transport = Arc::new(ScriptedTransport::scripted(receipts));
        let orchestrator = Arc::new(orchestrator_fixture(
            store.clone(),
            objects,
            transport.clone(),
        ));
        Harness {
            store,
            transport,
            worker: QueuedEmailWorker::new(orchestrator.clone()),
            orchestrator,
        }
    }

    async fn capped_delivery(h: &Harness) -> Uuid {
        let id = h.store.insert_candidate(candidate_fixture(
            "Alice Moreau",
            "Frontend Developer",
            "Technical Interview",
        ));
        let result = h.orchestrator.deliver_feedback(id).await;
        assert!(result.queued, "{result:?}");
        id
    }

    fn after_reset(h: &Harness) -> DateTime<Utc> {
        h.store.queued_emails()[0].not_before + ChronoDuration::seconds(1)
    }

    #[tokio::test]
    async fn test_nothing_is_resent_before_the_cap_resets() {
        let h = harness(vec![ScriptedTransport::queued()]);
        capped_delivery(&h).await;

        let run = h.worker.run_due(Utc::now()).await.unwrap();

        assert_eq!(run, QueueRun::default());
        assert_eq!(h.transport.submitted().len(), 1);
        assert_eq!(h.store.queued_emails().len(), 1);
    }

    #[tokio::test]
    async fn test_due_email_is_sent_with_its_original_tracking_id() {
        let h = harness(vec![ScriptedTransport::queued()]);
        let id = capped_delivery(&h).await;
        let now = after_reset(&h);

        let run = h.worker.run_due(now).await.unwrap();

        assert_eq!(run.sent, 1);
        assert_eq!(h.store.candidate(id).status, "sent");
        assert!(h.store.queued_emails().is_empty());
        assert_eq!(h.store.reports().len(), 1);

        let submitted = h.transport.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].tracking_id, submitted[1].tracking_id);

        let resend_campaign = h
            .store
            .campaigns()
            .into_values()
            .find(|c| c.label == "Queued feedback")
            .unwrap();
        assert_eq!(resend_campaign.sent_count, 1);
        assert_eq!(resend_campaign.status, CampaignStatus::Completed.as_str());
    }

    #[tokio::test]
    async fn test_still_capped_email_moves_to_the_next_reset() {
        let h = harness(vec![ScriptedTransport::queued(), ScriptedTransport::queued()]);
        let id = capped_delivery(&h).await;
        let now = after_reset(&h);

        let run = h.worker.run_due(now).await.unwrap();

        assert_eq!(run.requeued, 1);
        let queued = h.store.queued_emails();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].deferrals, 2);
        assert_eq!(h.store.candidate(id).status, "not_sent");
    }

    #[tokio::test]
    async fn test_transport_failure_drops_the_email_from_the_queue() {
        let h = harness(vec![
            ScriptedTransport::queued(),
            ScriptedTransport::failed("550 mailbox unavailable"),
        ]);
        capped_delivery(&h).await;
        let now = after_reset(&h);

        let run = h.worker.run_due(now).await.unwrap();

        assert_eq!(run.failed, 1);
        assert!(h.store.queued_emails().is_empty());
    }

    #[tokio::test]
    async fn test_campaign_failure_keeps_the_email_queued() {
        let h = harness(vec![ScriptedTransport::queued()]);
        capped_delivery(&h).await;
        let now = after_reset(&h);
        h.store.fail_campaigns_for(crate::testing::COMPANY_ID);

        let run = h.worker.run_due(now).await.unwrap();

        assert_eq!(run.failed, 1);
        assert_eq!(h.store.queued_emails().len(), 1);
        assert_eq!(h.transport.submitted().len(), 1);
    }
}
