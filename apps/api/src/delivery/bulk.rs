//! Sequential multi-candidate delivery.
//!
//! Candidates are processed in input order, one at a time, with a fixed pause
//! between them. One candidate's failure never stops the batch. A cancel flag
//! is checked before each candidate; sends already made stay sent. Batches run
//! on their own task and report progress into the `BatchRegistry`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::delivery::campaign::CampaignLedger;
use crate::delivery::orchestrator::DeliveryOrchestrator;
use crate::delivery::retry::RetryPolicy;
use crate::delivery::{DeliveryResult, RetryHint};
use crate::models::feedback::CampaignStatus;

/// Pause between candidates unless configured otherwise.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(1000);

/// Reported after every candidate, and after each failed send that will be retried.
#[derive(Debug, Clone, Serialize)]
pub struct BulkProgress {
    /// 1-based position of the candidate in the batch.
    pub index: usize,
    pub total: usize,
    /// False while the candidate still has transport attempts left.
    pub settled: bool,
    pub result: DeliveryResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignOutcome {
    pub campaign_id: Uuid,
    pub status: CampaignStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSummary {
    pub batch_id: Uuid,
    pub success_count: usize,
    pub failed_count: usize,
    pub queued_count: usize,
    pub results: Vec<DeliveryResult>,
    /// Ids never attempted because the batch was cancelled.
    pub remaining: Vec<Uuid>,
    pub cancelled: bool,
    pub campaigns: Vec<CampaignOutcome>,
    pub message: String,
}

impl BulkSummary {
    fn describe(&self) -> String {
        let mut parts = vec![format!("{} sent", self.success_count)];
        if self.queued_count > 0 {
            parts.push(format!(
                "{} queued for later (daily limit reached)",
                self.queued_count
            ));
        }
        if self.failed_count > 0 {
            parts.push(format!("{} failed", self.failed_count));
        }
        let mut message = parts.join(", ");
        if self.cancelled {
            message.push_str(&format!(
                "; cancelled with {} not processed",
                self.remaining.len()
            ));
        }
        message.push('.');
        message
    }
}

pub struct BulkDispatcher {
    orchestrator: Arc<DeliveryOrchestrator>,
    send_delay: Duration,
    transport_retry: RetryPolicy,
}

impl BulkDispatcher {
    pub fn new(orchestrator: Arc<DeliveryOrchestrator>, send_delay: Duration) -> Self {
        Self {
            orchestrator,
            send_delay,
            transport_retry: RetryPolicy::standard(),
        }
    }

    /// Backoff for re-submitting a candidate whose send failed.
    pub fn with_transport_retry(mut self, policy: RetryPolicy) -> Self {
        self.transport_retry = policy;
        self
    }

    pub async fn deliver_bulk<F>(
        &self,
        batch_id: Uuid,
        candidate_ids: &[Uuid],
        cancel: &AtomicBool,
        mut on_progress: F,
    ) -> BulkSummary
    where
        F: FnMut(&BulkProgress),
    {
        let total = candidate_ids.len();
        let ledger = CampaignLedger::new(format!("Bulk feedback ({total} candidates)"));
        let mut results = Vec::with_capacity(total);
        let mut remaining = Vec::new();
        let mut cancelled = false;

        info!(%batch_id, total, "Bulk delivery started");

        for (i, candidate_id) in candidate_ids.iter().copied().enumerate() {
            if i > 0 && !self.send_delay.is_zero() {
                tokio::time::sleep(self.send_delay).await;
            }
            if cancel.load(Ordering::SeqCst) {
                remaining = candidate_ids[i..].to_vec();
                cancelled = true;
                info!(%batch_id, processed = i, remaining = remaining.len(), "Bulk delivery cancelled");
                break;
            }

            let index = i + 1;
            let result = match self.orchestrator.prepare(candidate_id, true).await {
                Ok(prepared) => {
                    self.orchestrator
                        .send_pending(&prepared.pending, &ledger, &self.transport_retry, |retrying| {
                            on_progress(&BulkProgress {
                                index,
                                total,
                                settled: false,
                                result: retrying,
                            })
                        })
                        .await
                }
                Err(e) => DeliveryResult::failed(candidate_id, &e, RetryHint::Manual),
            };

            on_progress(&BulkProgress {
                index,
                total,
                settled: true,
                result: result.clone(),
            });
            results.push(result);
        }

        let campaigns = ledger
            .close(self.orchestrator.store(), cancelled)
            .await
            .into_iter()
            .map(|(campaign_id, status)| CampaignOutcome {
                campaign_id,
                status,
            })
            .collect();

        let success_count = results.iter().filter(|r| r.success).count();
        let queued_count = results.iter().filter(|r| r.queued).count();
        let mut summary = BulkSummary {
            batch_id,
            success_count,
            queued_count,
            failed_count: results.len() - success_count - queued_count,
            results,
            remaining,
            cancelled,
            campaigns,
            message: String::new(),
        };
        summary.message = summary.describe();
        info!(
            %batch_id,
            sent = summary.success_count,
            queued = summary.queued_count,
            failed = summary.failed_count,
            cancelled,
            "Bulk delivery finished"
        );
        summary
    }

    /// Runs the batch on its own task. Progress and the final summary land in
    /// the handle's registry entry, whether or not anyone awaits the task.
    pub fn spawn(self: &Arc<Self>, handle: BatchHandle, candidate_ids: Vec<Uuid>) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let summary = dispatcher
                .deliver_bulk(handle.batch_id(), &candidate_ids, handle.cancel_flag(), |p| {
                    handle.record(p)
                })
                .await;
            handle.finish(summary);
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Running batches
// ────────────────────────────────────────────────────────────────────────────

/// Finished batches kept for status lookups before the oldest is dropped.
pub const MAX_FINISHED_BATCHES: usize = 100;

/// Live view of a batch, served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatus {
    pub batch_id: Uuid,
    pub total: usize,
    pub processed: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub queued_count: usize,
    pub running: bool,
    pub cancel_requested: bool,
    /// Most recent progress event, including retries still in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<DeliveryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BulkSummary>,
}

impl BatchStatus {
    fn new(batch_id: Uuid, total: usize) -> Self {
        Self {
            batch_id,
            total,
            processed: 0,
            success_count: 0,
            failed_count: 0,
            queued_count: 0,
            running: true,
            cancel_requested: false,
            latest: None,
            summary: None,
        }
    }

    fn apply(&mut self, progress: &BulkProgress) {
        self.latest = Some(progress.result.clone());
        if !progress.settled {
            return;
        }
        self.processed = progress.index;
        if progress.result.success {
            self.success_count += 1;
        } else if progress.result.queued {
            self.queued_count += 1;
        } else {
            self.failed_count += 1;
        }
    }
}

struct BatchEntry {
    cancel: Arc<AtomicBool>,
    status: BatchStatus,
}

#[derive(Default)]
struct RegistryState {
    batches: HashMap<Uuid, BatchEntry>,
    /// Finished batch ids, oldest first.
    finished: VecDeque<Uuid>,
}

/// Running and recently finished batches, by batch id.
#[derive(Default)]
pub struct BatchRegistry {
    state: Mutex<RegistryState>,
}

/// Registration of a running batch. Dropping it marks the batch finished.
pub struct BatchHandle {
    batch_id: Uuid,
    flag: Arc<AtomicBool>,
    registry: Arc<BatchRegistry>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.flag
    }

    pub fn record(&self, progress: &BulkProgress) {
        if progress.settled {
            info!(
                batch_id = %self.batch_id,
                index = progress.index,
                total = progress.total,
                candidate_id = %progress.result.candidate_id,
                success = progress.result.success,
                queued = progress.result.queued,
                "Bulk progress"
            );
        }
        self.registry.update(self.batch_id, |status| status.apply(progress));
    }

    pub fn finish(self, summary: BulkSummary) {
        self.registry.settle(self.batch_id, Some(summary));
    }
}

impl Drop for BatchHandle {
    fn drop(&mut self) {
        self.registry.settle(self.batch_id, None);
    }
}

impl BatchRegistry {
    /// `None` if a batch with this id is still running.
    pub fn register(self: &Arc<Self>, batch_id: Uuid, total: usize) -> Option<BatchHandle> {
        let mut state = self.state.lock().ok()?;
        if let Some(entry) = state.batches.get(&batch_id) {
            if entry.status.running {
                return None;
            }
            state.finished.retain(|id| *id != batch_id);
        }
        let flag = Arc::new(AtomicBool::new(false));
        state.batches.insert(
            batch_id,
            BatchEntry {
                cancel: flag.clone(),
                status: BatchStatus::new(batch_id, total),
            },
        );
        Some(BatchHandle {
            batch_id,
            flag,
            registry: Arc::clone(self),
        })
    }

    pub fn status(&self, batch_id: Uuid) -> Option<BatchStatus> {
        let state = self.state.lock().ok()?;
        state.batches.get(&batch_id).map(|entry| entry.status.clone())
    }

    /// Returns false when no such batch is running.
    pub fn cancel(&self, batch_id: Uuid) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        match state.batches.get_mut(&batch_id) {
            Some(entry) if entry.status.running => {
                entry.cancel.store(true, Ordering::SeqCst);
                entry.status.cancel_requested = true;
                true
            }
            _ => false,
        }
    }

    fn update(&self, batch_id: Uuid, apply: impl FnOnce(&mut BatchStatus)) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(entry) = state.batches.get_mut(&batch_id) {
                apply(&mut entry.status);
            }
        }
    }

    /// Marks a running batch finished. Later calls for the same run are no-ops.
    fn settle(&self, batch_id: Uuid, summary: Option<BulkSummary>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match state.batches.get_mut(&batch_id) {
            Some(entry) if entry.status.running => {
                let status = &mut entry.status;
                status.running = false;
                if let Some(summary) = summary {
                    status.processed = summary.results.len();
                    status.success_count = summary.success_count;
                    status.failed_count = summary.failed_count;
                    status.queued_count = summary.queued_count;
                    status.summary = Some(summary);
                }
            }
            _ => return,
        }
        state.finished.push_back(batch_id);
        while state.finished.len() > MAX_FINISHED_BATCHES {
            if let Some(oldest) = state.finished.pop_front() {
                state.batches.remove(&oldest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::TransportReceipt;
    use crate::testing::{
        candidate_fixture, company_fixture, orchestrator_fixture, InMemoryObjectStore,
        InMemoryStore, ScriptedTransport,
    };

    struct Harness {
        store: Arc<InMemoryStore>,
        transport: Arc<ScriptedTransport>,
        dispatcher: BulkDispatcher,
    }

    fn harness(receipts: Vec<TransportReceipt>, delay: Duration) -> Harness {
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
            dispatcher: BulkDispatcher::new(orchestrator, delay)
                .with_transport_retry(RetryPolicy::immediate(3)),
        }
    }

    fn seed(h: &Harness, n: usize) -> Vec<Uuid> {
        (0..n)
            .map(|i| {
                h.store.insert_candidate(candidate_fixture(
                    &format!("Candidate {i}"),
                    "Backend Developer",
                    "Phone Screen",
                ))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_one_persistence_failure_does_not_abort_batch() {
        let h = harness(vec![], Duration::ZERO);
        let ids = seed(&h, 10);
        h.store.fail_report_inserts(ids[4], 3);
        let mut seen = Vec::new();

        let summary = h
            .dispatcher
            .deliver_bulk(Uuid::new_v4(), &ids, &AtomicBool::new(false), |p| {
                if p.settled {
                    seen.push(p.index)
                }
            })
            .await;

        assert_eq!(summary.results.len(), 10);
        assert_eq!(summary.success_count, 9);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.queued_count, 0);
        assert!(!summary.results[4].success);
        assert_eq!(summary.results[4].error.as_ref().unwrap().kind, "persistence");
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
        let order: Vec<Uuid> = summary.results.iter().map(|r| r.candidate_id).collect();
        assert_eq!(order, ids);
    }

    #[tokio::test]
    async fn test_missing_candidate_is_counted_and_batch_continues() {
        let h = harness(vec![], Duration::ZERO);
        let mut ids = seed(&h, 2);
        ids.insert(1, Uuid::new_v4());

        let summary = h
            .dispatcher
            .deliver_bulk(Uuid::new_v4(), &ids, &AtomicBool::new(false), |_| {})
            .await;

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.results[1].error.as_ref().unwrap().kind, "not_found");
    }

    #[tokio::test]
    async fn test_queued_is_its_own_category() {
        let h = harness(
            vec![
                TransportReceipt::Sent {
                    message_id: "a".to_string(),
                },
                ScriptedTransport::queued(),
                ScriptedTransport::queued(),
            ],
            Duration::ZERO,
        );
        let ids = seed(&h, 3);

        let summary = h
            .dispatcher
            .deliver_bulk(Uuid::new_v4(), &ids, &AtomicBool::new(false), |_| {})
            .await;

        assert_eq!(
            (summary.success_count, summary.queued_count, summary.failed_count),
            (1, 2, 0)
        );
        assert!(summary.message.contains("2 queued for later"));
        assert_eq!(summary.campaigns.len(), 1);
        assert_eq!(summary.campaigns[0].status, CampaignStatus::Partial);
    }

    #[tokio::test]
    async fn test_transport_failures_are_retried_up_to_three_attempts() {
        let h = harness(
            vec![
                ScriptedTransport::failed("timeout"),
                ScriptedTransport::failed("timeout"),
            ],
            Duration::ZERO,
        );
        let ids = seed(&h, 1);
        let mut retry_hints = Vec::new();

        let summary = h
            .dispatcher
            .deliver_bulk(Uuid::new_v4(), &ids, &AtomicBool::new(false), |p| {
                if !p.settled {
                    retry_hints.push(p.result.retry)
                }
            })
            .await;

        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.results[0].attempts, 3);
        assert_eq!(retry_hints, vec![Some(RetryHint::Automatic); 2]);
        assert_eq!(h.transport.submitted().len(), 3);
        // retries resend the same email and report
        assert_eq!(h.store.reports().len(), 1);
        let tracking: Vec<Uuid> = h.transport.submitted().iter().map(|e| e.tracking_id).collect();
        assert!(tracking.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_exhausted_transport_retries_fail_without_stopping() {
        let h = harness(
            vec![
                ScriptedTransport::failed("refused"),
                ScriptedTransport::failed("refused"),
                ScriptedTransport::failed("refused"),
            ],
            Duration::ZERO,
        );
        let ids = seed(&h, 2);

        let summary = h
            .dispatcher
            .deliver_bulk(Uuid::new_v4(), &ids, &AtomicBool::new(false), |_| {})
            .await;

        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.results[0].retry, Some(RetryHint::Manual));
        assert_eq!(summary.results[0].attempts, 3);
        assert_eq!(h.store.candidate(ids[0]).status, "not_sent");
        assert_eq!(h.store.candidate(ids[1]).status, "sent");
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_candidate() {
        let h = harness(vec![], Duration::ZERO);
        let ids = seed(&h, 6);
        let cancel = AtomicBool::new(false);

        let summary = h
            .dispatcher
            .deliver_bulk(Uuid::new_v4(), &ids, &cancel, |p| {
                if p.settled && p.index == 2 {
                    cancel.store(true, Ordering::SeqCst);
                }
            })
            .await;

        assert!(summary.cancelled);
        assert_eq!(summary.results.len(), 2);
        assert_eq!(summary.remaining, ids[2..].to_vec());
        assert_eq!(summary.campaigns[0].status, CampaignStatus::Cancelled);
        assert_eq!(h.store.candidate(ids[1]).status, "sent");
        assert_eq!(h.store.candidate(ids[2]).status, "not_sent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_candidates_are_spaced_by_send_delay() {
        let h = harness(vec![], Duration::from_secs(1));
        let ids = seed(&h, 3);
        let start = tokio::time::Instant::now();

        h.dispatcher
            .deliver_bulk(Uuid::new_v4(), &ids, &AtomicBool::new(false), |_| {})
            .await;

        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn test_registry_cancels_running_batch_only() {
        let registry = Arc::new(BatchRegistry::default());
        let id = Uuid::new_v4();
        let handle = registry.register(id, 4).unwrap();

        assert!(registry.register(id, 4).is_none());
        assert!(registry.cancel(id));
        assert!(handle.cancel_flag().load(Ordering::SeqCst));
        assert!(registry.status(id).unwrap().cancel_requested);

        drop(handle);
        assert!(!registry.cancel(id));
        assert!(!registry.status(id).unwrap().running);
        assert!(registry.register(id, 4).is_some());
    }

    #[test]
    fn test_registry_forgets_oldest_finished_batches() {
        let registry = Arc::new(BatchRegistry::default());
        let ids: Vec<Uuid> = (0..MAX_FINISHED_BATCHES + 1).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            drop(registry.register(*id, 1).unwrap());
        }

        assert!(registry.status(ids[0]).is_none());
        assert!(registry.status(ids[1]).is_some());
        assert!(registry.status(ids[MAX_FINISHED_BATCHES]).is_some());
    }

    #[tokio::test]
    async fn test_spawned_batch_completes_without_a_waiting_caller() {
        let h = harness(vec![ScriptedTransport::queued()], Duration::ZERO);
        let ids = seed(&h, 3);
        let registry = Arc::new(BatchRegistry::default());
        let batch_id = Uuid::new_v4();
        let dispatcher = Arc::new(h.dispatcher);

        let handle = registry.register(batch_id, ids.len()).unwrap();
        drop(dispatcher.spawn(handle, ids.clone()));
        assert!(registry.status(batch_id).unwrap().running);

        let mut status = registry.status(batch_id).unwrap();
        for _ in 0..500 {
            if !status.running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = registry.status(batch_id).unwrap();
        }

        assert!(!status.running);
        assert_eq!(status.processed, 3);
        assert_eq!((status.success_count, status.queued_count), (2, 1));
        let summary = status.summary.unwrap();
        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.campaigns[0].status, CampaignStatus::Partial);
        assert_eq!(h.store.candidate(ids[1]).status, "sent");
        assert_eq!(h.store.queued_emails().len(), 1);
    }
}
