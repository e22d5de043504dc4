use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::candidate::{CandidateRow, CandidateStatus, EngagementCounters};
use crate::models::company::CompanyRow;
use crate::models::feedback::{
    CampaignStatus, EngagementEventType, NewAnalyticsEvent, NewCampaign, NewFeedbackReport,
    PendingEmail, QueuedEmail, StageEngagementRow,
};
use crate::mailer::OutboundEmail;
use crate::store::{FeedbackStore, StoreError};

/// SQL rank of the stored status, mirroring `CandidateStatus::rank`.
const STATUS_RANK_SQL: &str =
    "CASE status WHEN 'sent' THEN 2 WHEN 'draft' THEN 1 ELSE 0 END";

pub struct PgFeedbackStore {
    pool: PgPool,
}

impl PgFeedbackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackStore for PgFeedbackStore {
    async fn load_candidate(
        &self,
        candidate_id: Uuid,
    ) -> Result<Option<(CandidateRow, CompanyRow)>, StoreError> {
        let candidate: Option<CandidateRow> = sqlx::query_as(
            "SELECT id, company_id, name, email, position, rejection_stage, rejection_reason, \
                    status, open_count, click_count, course_enrollment_count, reapplied, \
                    created_at, updated_at \
             FROM candidates WHERE id = $1",
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(candidate) = candidate else {
            return Ok(None);
        };
        Ok(self
            .load_company(candidate.company_id)
            .await?
            .map(|company| (candidate, company)))
    }

    async fn load_company(&self, company_id: Uuid) -> Result<Option<CompanyRow>, StoreError> {
        Ok(sqlx::query_as::<_, CompanyRow>(
            "SELECT id, name, logo_key, primary_color, secondary_color, daily_email_cap, \
                    sender_name, sender_email, resume_fix_url, learning_url, reapply_url, \
                    footer_message \
             FROM companies WHERE id = $1",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_report(&self, report: &NewFeedbackReport) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO feedback_reports \
                 (id, company_id, candidate_id, content, pdf_key, pdf_url, email_id, link_targets) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(report.id)
        .bind(report.company_id)
        .bind(report.candidate_id)
        .bind(&report.content)
        .bind(&report.pdf_key)
        .bind(&report.pdf_url)
        .bind(report.email_id)
        .bind(Json(&report.link_targets))
        .execute(&self.pool)
        .await?;

        info!(report_id = %report.id, candidate_id = %report.candidate_id, "Feedback report stored");
        Ok(())
    }

    async fn report_link_targets(
        &self,
        candidate_id: Uuid,
        email_id: Uuid,
    ) -> Result<Option<Vec<String>>, StoreError> {
        let row: Option<(Json<Vec<String>>,)> = sqlx::query_as(
            "SELECT link_targets FROM feedback_reports \
             WHERE candidate_id = $1 AND email_id = $2",
        )
        .bind(candidate_id)
        .bind(email_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(Json(targets),)| targets))
    }

    async fn enqueue_email(&self, queued: &QueuedEmail) -> Result<(), StoreError> {
        let pending = &queued.pending;
        sqlx::query(
            "INSERT INTO queued_emails \
                 (report_id, candidate_id, company_id, pdf_url, email, not_before, deferrals) \
             VALUES ($1, $2, $3, $4, $5, $6, 1) \
             ON CONFLICT (report_id) DO UPDATE SET \
                 not_before = EXCLUDED.not_before, \
                 deferrals = queued_emails.deferrals + 1",
        )
        .bind(pending.report_id)
        .bind(pending.candidate_id)
        .bind(pending.company_id)
        .bind(&pending.pdf_url)
        .bind(Json(&pending.email))
        .bind(queued.not_before)
        .execute(&self.pool)
        .await?;

        info!(report_id = %pending.report_id, not_before = %queued.not_before, "Email queued");
        Ok(())
    }

    async fn due_queued_emails(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<QueuedEmail>, StoreError> {
        let rows: Vec<(Uuid, Uuid, Uuid, String, Json<OutboundEmail>, DateTime<Utc>, i32)> =
            sqlx::query_as(
                "SELECT report_id, candidate_id, company_id, pdf_url, email, not_before, deferrals \
                 FROM queued_emails WHERE not_before <= $1 \
                 ORDER BY not_before, created_at LIMIT $2",
            )
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(report_id, candidate_id, company_id, pdf_url, Json(email), not_before, deferrals)| {
                    QueuedEmail {
                        pending: PendingEmail {
                            report_id,
                            candidate_id,
                            company_id,
                            pdf_url,
                            email,
                        },
                        not_before,
                        deferrals,
                    }
                },
            )
            .collect())
    }

    async fn remove_queued_email(&self, report_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM queued_emails WHERE report_id = $1")
            .bind(report_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn open_campaign(&self, campaign: &NewCampaign) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO email_campaigns (id, company_id, label, recipient_count, sent_count, status) \
             VALUES ($1, $2, $3, $4, 0, $5)",
        )
        .bind(campaign.id)
        .bind(campaign.company_id)
        .bind(&campaign.label)
        .bind(campaign.recipient_count)
        .bind(CampaignStatus::Sending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_campaign_recipient(&self, campaign_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE email_campaigns SET recipient_count = recipient_count + 1 WHERE id = $1")
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_campaign_send(&self, campaign_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE email_campaigns SET sent_count = sent_count + 1 WHERE id = $1")
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_campaign(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE email_campaigns SET status = $2 WHERE id = $1")
            .bind(campaign_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn advance_candidate_status(
        &self,
        candidate_id: Uuid,
        status: CandidateStatus,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "UPDATE candidates SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND ({STATUS_RANK_SQL}) < $3"
        );
        let result = sqlx::query(&sql)
            .bind(candidate_id)
            .bind(status.as_str())
            .bind(status.rank() as i32)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_event(&self, event: &NewAnalyticsEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO analytics_events (id, candidate_id, event_type, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(event.id)
        .bind(event.candidate_id)
        .bind(event.event_type.as_str())
        .bind(&event.payload)
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_counter(
        &self,
        candidate_id: Uuid,
        event_type: EngagementEventType,
    ) -> Result<(), StoreError> {
        // column name comes from a closed enum, never from input
        let column = event_type.counter_column();
        let sql = format!(
            "UPDATE candidates SET {column} = {column} + 1, updated_at = NOW() WHERE id = $1"
        );
        sqlx::query(&sql)
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recompute_counters(
        &self,
        candidate_id: Uuid,
    ) -> Result<EngagementCounters, StoreError> {
        let (open_count, click_count, course_enrollment_count): (i32, i32, i32) = sqlx::query_as(
            "UPDATE candidates c SET \
                 open_count = e.opened, \
                 click_count = e.clicked, \
                 course_enrollment_count = e.enrolled, \
                 updated_at = NOW() \
             FROM ( \
                 SELECT \
                     COUNT(*) FILTER (WHERE event_type = 'email_opened')::int AS opened, \
                     COUNT(*) FILTER (WHERE event_type = 'email_clicked')::int AS clicked, \
                     COUNT(*) FILTER (WHERE event_type = 'course_enrolled')::int AS enrolled \
                 FROM analytics_events WHERE candidate_id = $1 \
             ) e \
             WHERE c.id = $1 \
             RETURNING c.open_count, c.click_count, c.course_enrollment_count",
        )
        .bind(candidate_id)
        .fetch_one(&self.pool)
        .await?;

        info!(%candidate_id, open_count, click_count, course_enrollment_count, "Counters reconciled");
        Ok(EngagementCounters {
            open_count,
            click_count,
            course_enrollment_count,
        })
    }

    async fn engagement_summary(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<StageEngagementRow>, StoreError> {
        Ok(sqlx::query_as::<_, StageEngagementRow>(
            "SELECT rejection_stage, \
                    COUNT(*) AS candidates, \
                    COUNT(*) FILTER (WHERE status = 'sent') AS sent, \
                    COUNT(*) FILTER (WHERE open_count > 0) AS opened, \
                    COUNT(*) FILTER (WHERE click_count > 0) AS clicked, \
                    COUNT(*) FILTER (WHERE course_enrollment_count > 0) AS enrolled \
             FROM candidates WHERE company_id = $1 \
             GROUP BY rejection_stage ORDER BY rejection_stage",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
