//! Single-candidate delivery pipeline.
//!
//! load → generate (+ optional enrichment) → render (fallback branding on
//! `RenderError`) → upload PDF + insert report (retried) → campaign → submit →
//! advance status. Each step fails with its own `DeliveryError` variant. An
//! email the send cap defers is parked in the queue until the cap resets.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::delivery::campaign::CampaignLedger;
use crate::delivery::retry::RetryPolicy;
use crate::delivery::{DeliveryError, DeliveryResult, RetryHint};
use crate::generation::enrich::FeedbackEnricher;
use crate::generation::generator::{generate_for, FeedbackDocument};
use crate::mailer::send_cap::next_reset;
use crate::mailer::{EmailTransport, OutboundEmail, TransportReceipt};
use crate::models::candidate::{CandidateRow, CandidateStatus};
use crate::models::company::CompanyRow;
use crate::models::feedback::{NewFeedbackReport, PendingEmail, QueuedEmail};
use crate::render::branding::{BrandingContext, LogoAsset};
use crate::render::{link_targets, render, DeliveryLinks, RenderError, RenderedFeedback};
use crate::store::{report_pdf_key, FeedbackStore, ObjectStore};
use crate::tracking::links::TrackingLinks;

/// Everything produced before the send step: the stored report and the
/// ready-to-submit email.
#[derive(Debug, Clone)]
pub struct PreparedDelivery {
    pub candidate: CandidateRow,
    pub company: CompanyRow,
    pub document: FeedbackDocument,
    pub pending: PendingEmail,
    pub used_fallback_branding: bool,
}

/// A rendered, stored report that has not been sent.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DraftPreview {
    pub candidate_id: Uuid,
    pub report_id: Uuid,
    pub pdf_url: String,
    pub subject: String,
    pub email_html: String,
    pub email_text: String,
    pub document: FeedbackDocument,
    pub used_fallback_branding: bool,
}

pub struct DeliveryOrchestrator {
    store: Arc<dyn FeedbackStore>,
    objects: Arc<dyn ObjectStore>,
    transport: Arc<dyn EmailTransport>,
    enricher: Arc<dyn FeedbackEnricher>,
    retry: RetryPolicy,
    tracking_base_url: Option<String>,
}

impl DeliveryOrchestrator {
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        objects: Arc<dyn ObjectStore>,
        transport: Arc<dyn EmailTransport>,
        enricher: Arc<dyn FeedbackEnricher>,
    ) -> Self {
        Self {
            store,
            objects,
            transport,
            enricher,
            retry: RetryPolicy::standard(),
            tracking_base_url: None,
        }
    }

    /// Backoff for store and object-store calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enables open pixel and click redirects rooted at `base_url`.
    pub fn with_tracking_base_url(mut self, base_url: Option<String>) -> Self {
        self.tracking_base_url = base_url;
        self
    }

    pub fn store(&self) -> &dyn FeedbackStore {
        self.store.as_ref()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Public operations
    // ────────────────────────────────────────────────────────────────────────

    /// Generates, stores and sends feedback for one candidate. Transport
    /// failures are not retried here.
    pub async fn deliver_feedback(&self, candidate_id: Uuid) -> DeliveryResult {
        let prepared = match self.prepare(candidate_id, true).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(%candidate_id, kind = e.kind(), error = %e, "Delivery aborted");
                return DeliveryResult::failed(candidate_id, &e, RetryHint::Manual);
            }
        };

        let ledger = CampaignLedger::new(format!("Feedback for {}", prepared.candidate.name));
        let result = self
            .send_pending(&prepared.pending, &ledger, &RetryPolicy::immediate(1), |_| {})
            .await;
        ledger.close(self.store.as_ref(), false).await;
        result
    }

    /// Renders and stores a report without sending it; the candidate moves to
    /// `draft` unless already further along.
    pub async fn prepare_draft(&self, candidate_id: Uuid) -> Result<DraftPreview, DeliveryError> {
        let prepared = self.prepare(candidate_id, false).await?;
        if prepared.candidate.status().can_advance_to(CandidateStatus::Draft) {
            self.advance_status(candidate_id, CandidateStatus::Draft).await;
        }

        let PendingEmail {
            report_id,
            pdf_url,
            email,
            ..
        } = prepared.pending;
        Ok(DraftPreview {
            candidate_id,
            report_id,
            pdf_url,
            subject: email.subject,
            email_html: email.html_body,
            email_text: email.text_body,
            document: prepared.document,
            used_fallback_branding: prepared.used_fallback_branding,
        })
    }

    // ────────────────────────────────────────────────────────────────────────
    // Pipeline steps
    // ────────────────────────────────────────────────────────────────────────

    /// Steps up to and including persistence. `tracked` embeds click/open tracking.
    pub async fn prepare(
        &self,
        candidate_id: Uuid,
        tracked: bool,
    ) -> Result<PreparedDelivery, DeliveryError> {
        let (candidate, company) = self.load(candidate_id).await?;

        let document = generate_for(&candidate);
        let document = self.enricher.enrich(&candidate, document).await;

        let logo = self.fetch_logo(&company).await;
        let branding = BrandingContext::from_company(&company, logo);

        let report_id = Uuid::new_v4();
        let email_id = Uuid::new_v4();
        let pdf_key = report_pdf_key(company.id, report_id);
        let pdf_url = self.objects.public_url(&pdf_key);
        let tracking = match (&self.tracking_base_url, tracked) {
            (Some(base), true) => Some(TrackingLinks::new(base, candidate.id, email_id)),
            _ => None,
        };
        let links = DeliveryLinks {
            pdf_url: pdf_url.clone(),
            tracking,
        };

        let (rendered, used_fallback_branding) = self
            .render_with_fallback(&candidate, &branding, &document, &links)
            .await?;

        let report = NewFeedbackReport {
            id: report_id,
            company_id: company.id,
            candidate_id: candidate.id,
            content: serde_json::to_value(&document)
                .map_err(|e| DeliveryError::Internal(format!("serialize feedback: {e}")))?,
            pdf_key,
            pdf_url: pdf_url.clone(),
            email_id,
            link_targets: link_targets(&branding, &document, &pdf_url),
        };
        self.persist(&report, &rendered).await?;

        let pending = PendingEmail {
            report_id,
            candidate_id: candidate.id,
            company_id: company.id,
            pdf_url,
            email: OutboundEmail {
                to: candidate.email.clone(),
                to_name: candidate.name.clone(),
                subject: rendered.subject,
                html_body: rendered.email_html,
                text_body: rendered.email_text,
                tracking_id: email_id,
                sender: company.sender(),
            },
        };

        Ok(PreparedDelivery {
            candidate,
            company,
            document,
            pending,
            used_fallback_branding,
        })
    }

    /// Campaign, submit (with up to `transport_retry.max_attempts` attempts on
    /// `Failed`), then status. `on_retry` sees each failed attempt that will be
    /// retried. A capped email is queued until the next cap reset.
    pub async fn send_pending<F>(
        &self,
        pending: &PendingEmail,
        ledger: &CampaignLedger,
        transport_retry: &RetryPolicy,
        mut on_retry: F,
    ) -> DeliveryResult
    where
        F: FnMut(DeliveryResult),
    {
        let candidate_id = pending.candidate_id;
        let company_id = pending.company_id;

        let store = self.store.as_ref();
        let campaign = self
            .retry
            .run("enroll_campaign", move || ledger.enroll(store, company_id))
            .await;
        let campaign_id = match campaign {
            Ok(id) => id,
            Err(e) => {
                let err = DeliveryError::Persistence {
                    operation: "open campaign",
                    attempts: e.attempts,
                    message: e.last.to_string(),
                };
                return DeliveryResult::failed(candidate_id, &err, RetryHint::Manual)
                    .with_report(pending.report_id, pending.pdf_url.clone());
            }
        };

        let max_attempts = transport_retry.max_attempts.max(1);
        let mut attempt = 1;
        let receipt = loop {
            let error = match self.transport.submit(&pending.email).await {
                TransportReceipt::Failed { error } if attempt < max_attempts => error,
                other => break other,
            };
            let delay = transport_retry.delay_before(attempt + 1);
            warn!(
                %candidate_id,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Send failed, retrying"
            );
            let err = DeliveryError::Transport {
                attempts: attempt,
                message: error,
            };
            on_retry(
                DeliveryResult::failed(candidate_id, &err, RetryHint::Automatic)
                    .with_report(pending.report_id, pending.pdf_url.clone()),
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        };
        ledger.tally(company_id, &receipt);

        match receipt {
            TransportReceipt::Sent { message_id } => {
                if let Err(e) = self.store.record_campaign_send(campaign_id).await {
                    warn!(%campaign_id, error = %e, "Could not count campaign send");
                }
                self.advance_status(candidate_id, CandidateStatus::Sent).await;
                info!(
                    %candidate_id,
                    %message_id,
                    report_id = %pending.report_id,
                    transport = self.transport.name(),
                    attempt,
                    "Feedback delivered"
                );
                DeliveryResult::sent(
                    candidate_id,
                    pending.email.tracking_id,
                    pending.report_id,
                    pending.pdf_url.clone(),
                    attempt,
                )
            }
            TransportReceipt::Queued { reason } => {
                if let Err(err) = self.enqueue(pending).await {
                    warn!(%candidate_id, error = %err, "Capped email could not be queued");
                    return DeliveryResult::failed(candidate_id, &err, RetryHint::Manual)
                        .with_report(pending.report_id, pending.pdf_url.clone());
                }
                info!(%candidate_id, %reason, "Feedback queued by send cap");
                DeliveryResult::queued(
                    candidate_id,
                    pending.report_id,
                    pending.pdf_url.clone(),
                    reason,
                )
            }
            TransportReceipt::Failed { error } => {
                let err = DeliveryError::Transport {
                    attempts: attempt,
                    message: error,
                };
                warn!(%candidate_id, error = %err, "Feedback not delivered");
                DeliveryResult::failed(candidate_id, &err, RetryHint::Manual)
                    .with_report(pending.report_id, pending.pdf_url.clone())
            }
        }
    }

    async fn enqueue(&self, pending: &PendingEmail) -> Result<(), DeliveryError> {
        let queued = QueuedEmail {
            pending: pending.clone(),
            not_before: next_reset(Utc::now()),
            deferrals: 1,
        };
        let store = self.store.as_ref();
        let queued = &queued;
        self.retry
            .run("queue_email", move || store.enqueue_email(queued))
            .await
            .map_err(|e| DeliveryError::Persistence {
                operation: "queue email",
                attempts: e.attempts,
                message: e.last.to_string(),
            })
    }

    async fn load(&self, candidate_id: Uuid) -> Result<(CandidateRow, CompanyRow), DeliveryError> {
        let store = self.store.as_ref();
        let loaded = self
            .retry
            .run("load_candidate", move || store.load_candidate(candidate_id))
            .await
            .map_err(|e| DeliveryError::Persistence {
                operation: "load candidate",
                attempts: e.attempts,
                message: e.last.to_string(),
            })?;
        loaded.ok_or(DeliveryError::NotFound(candidate_id))
    }

    /// A missing or unreadable logo renders without one.
    async fn fetch_logo(&self, company: &CompanyRow) -> Option<LogoAsset> {
        let key = company.logo_key.as_deref().filter(|k| !k.trim().is_empty())?;
        match self.objects.get_object(key).await {
            Ok(bytes) => Some(LogoAsset {
                url: self.objects.public_url(key),
                bytes,
            }),
            Err(e) => {
                warn!(company_id = %company.id, key, error = %e, "Logo unavailable, rendering without it");
                None
            }
        }
    }

    async fn render_with_fallback(
        &self,
        candidate: &CandidateRow,
        branding: &BrandingContext,
        document: &FeedbackDocument,
        links: &DeliveryLinks,
    ) -> Result<(RenderedFeedback, bool), DeliveryError> {
        match render_blocking(candidate, branding.clone(), document, links).await? {
            Ok(rendered) => Ok((rendered, false)),
            Err(e) => {
                warn!(candidate_id = %candidate.id, error = %e, "Render failed, retrying with default branding");
                let rendered = render_blocking(candidate, branding.fallback(), document, links).await??;
                Ok((rendered, true))
            }
        }
    }

    async fn persist(
        &self,
        report: &NewFeedbackReport,
        rendered: &RenderedFeedback,
    ) -> Result<(), DeliveryError> {
        let store = self.store.as_ref();
        let objects = self.objects.as_ref();
        let pdf = &rendered.pdf_bytes;
        self.retry
            .run("store_feedback_report", move || async move {
                objects
                    .put_object(&report.pdf_key, pdf.clone(), "application/pdf")
                    .await
                    .map_err(|e| e.to_string())?;
                store.insert_report(report).await.map_err(|e| e.to_string())
            })
            .await
            .map_err(|e| DeliveryError::Persistence {
                operation: "store feedback report",
                attempts: e.attempts,
                message: e.last,
            })
    }

    /// Forward-only status change. The send already happened, so a failure
    /// here is logged rather than reported.
    async fn advance_status(&self, candidate_id: Uuid, status: CandidateStatus) {
        let store = self.store.as_ref();
        let result = self
            .retry
            .run("advance_status", move || {
                store.advance_candidate_status(candidate_id, status)
            })
            .await;
        match result {
            Ok(true) => info!(%candidate_id, %status, "Candidate status advanced"),
            Ok(false) => {}
            Err(e) => warn!(%candidate_id, %status, error = %e.last, "Could not update candidate status"),
        }
    }
}

async fn render_blocking(
    candidate: &CandidateRow,
    branding: BrandingContext,
    document: &FeedbackDocument,
    links: &DeliveryLinks,
) -> Result<Result<RenderedFeedback, RenderError>, DeliveryError> {
    let candidate = candidate.clone();
    let document = document.clone();
    let links = links.clone();
    tokio::task::spawn_blocking(move || render(&candidate, &branding, &document, &links))
        .await
        .map_err(|e| DeliveryError::Internal(format!("render task failed: {e}")))
}
