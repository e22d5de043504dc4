use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::mailer::OutboundEmail;

/// Insert payload for a report. Reports are immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct NewFeedbackReport {
    pub id: Uuid,
    pub company_id: Uuid,
    pub candidate_id: Uuid,
    pub content: Value,
    pub pdf_key: String,
    pub pdf_url: String,
    /// Tracking id of the email that carries this report.
    pub email_id: Uuid,
    /// Every URL the email and PDF link to; the click redirect follows no others.
    pub link_targets: Vec<String>,
}

/// A stored report's email, ready for the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEmail {
    pub report_id: Uuid,
    pub candidate_id: Uuid,
    pub company_id: Uuid,
    pub pdf_url: String,
    pub email: OutboundEmail,
}

/// An email the daily send cap deferred. Resent once `not_before` passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEmail {
    pub pending: PendingEmail,
    pub not_before: DateTime<Utc>,
    /// How many times the cap has deferred it.
    pub deferrals: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Sending,
    Completed,
    Partial,
    Queued,
    Failed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Sending => "sending",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Partial => "partial",
            CampaignStatus::Queued => "queued",
            CampaignStatus::Failed => "failed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal status for a campaign given its final tallies.
    pub fn settle(sent: u32, queued: u32, failed: u32, cancelled: bool) -> Self {
        if cancelled {
            CampaignStatus::Cancelled
        } else if failed == 0 && queued == 0 {
            CampaignStatus::Completed
        } else if sent == 0 && failed == 0 {
            CampaignStatus::Queued
        } else if sent == 0 && queued == 0 {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Partial
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCampaign {
    pub id: Uuid,
    pub company_id: Uuid,
    pub label: String,
    pub recipient_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementEventType {
    EmailOpened,
    EmailClicked,
    CourseEnrolled,
}

impl EngagementEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementEventType::EmailOpened => "email_opened",
            EngagementEventType::EmailClicked => "email_clicked",
            EngagementEventType::CourseEnrolled => "course_enrolled",
        }
    }

    /// Name of the candidate counter column this event rolls up into.
    pub fn counter_column(&self) -> &'static str {
        match self {
            EngagementEventType::EmailOpened => "open_count",
            EngagementEventType::EmailClicked => "click_count",
            EngagementEventType::CourseEnrolled => "course_enrollment_count",
        }
    }
}

impl fmt::Display for EngagementEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only engagement log entry.
#[derive(Debug, Clone, Serialize)]
pub struct NewAnalyticsEvent {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub event_type: EngagementEventType,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

/// Per-rejection-stage engagement rollup for the analytics view.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StageEngagementRow {
    pub rejection_stage: String,
    pub candidates: i64,
    pub sent: i64,
    pub opened: i64,
    pub clicked: i64,
    pub enrolled: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_all_sent_is_completed() {
        assert_eq!(CampaignStatus::settle(5, 0, 0, false), CampaignStatus::Completed);
    }

    #[test]
    fn test_settle_only_queued_is_queued() {
        assert_eq!(CampaignStatus::settle(0, 3, 0, false), CampaignStatus::Queued);
    }

    #[test]
    fn test_settle_only_failed_is_failed() {
        assert_eq!(CampaignStatus::settle(0, 0, 2, false), CampaignStatus::Failed);
    }

    #[test]
    fn test_settle_mixed_is_partial() {
        assert_eq!(CampaignStatus::settle(9, 1, 0, false), CampaignStatus::Partial);
        assert_eq!(CampaignStatus::settle(4, 0, 1, false), CampaignStatus::Partial);
        assert_eq!(CampaignStatus::settle(0, 1, 1, false), CampaignStatus::Partial);
    }

    #[test]
    fn test_settle_cancel_wins() {
        assert_eq!(CampaignStatus::settle(3, 0, 0, true), CampaignStatus::Cancelled);
    }

    #[test]
    fn test_event_type_wire_names() {
        let json = serde_json::to_string(&EngagementEventType::CourseEnrolled).unwrap();
        assert_eq!(json, "\"course_enrolled\"");
        assert_eq!(EngagementEventType::EmailOpened.counter_column(), "open_count");
    }
}
