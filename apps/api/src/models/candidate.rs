use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a candidate's feedback. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    NotSent,
    Draft,
    Sent,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::NotSent => "not_sent",
            CandidateStatus::Draft => "draft",
            CandidateStatus::Sent => "sent",
        }
    }

    pub fn rank(&self) -> i16 {
        match self {
            CandidateStatus::NotSent => 0,
            CandidateStatus::Draft => 1,
            CandidateStatus::Sent => 2,
        }
    }

    /// Parses the stored column value. Unknown values read as `NotSent`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "draft" => CandidateStatus::Draft,
            "sent" => CandidateStatus::Sent,
            _ => CandidateStatus::NotSent,
        }
    }

    pub fn can_advance_to(&self, next: CandidateStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub email: String,
    pub position: String,
    pub rejection_stage: String,
    pub rejection_reason: Option<String>,
    pub status: String,
    pub open_count: i32,
    pub click_count: i32,
    pub course_enrollment_count: i32,
    pub reapplied: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CandidateRow {
    pub fn status(&self) -> CandidateStatus {
        CandidateStatus::from_db(&self.status)
    }

    /// First name for greetings, falling back to the full name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Rolled-up engagement counters cached on the candidate row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub open_count: i32,
    pub click_count: i32,
    pub course_enrollment_count: i32,
}
