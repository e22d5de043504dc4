//! Feedback delivery: generate → render → persist → send → advance status,
//! for one candidate (`orchestrator`) or many in sequence (`bulk`). Emails the
//! send cap deferred are resent by the `queue` worker.

pub mod bulk;
pub mod campaign;
pub mod handlers;
pub mod orchestrator;
pub mod queue;
pub mod retry;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::render::RenderError;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("candidate {0} not found")]
    NotFound(Uuid),

    #[error("rendering failed even with default branding: {0}")]
    Render(#[from] RenderError),

    #[error("{operation} failed after {attempts} attempts: {message}")]
    Persistence {
        operation: &'static str,
        attempts: u32,
        message: String,
    },

    #[error("email transport failed after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl DeliveryError {
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::NotFound(_) => "not_found",
            DeliveryError::Render(_) => "render",
            DeliveryError::Persistence { .. } => "persistence",
            DeliveryError::Transport { .. } => "transport",
            DeliveryError::Internal(_) => "internal",
        }
    }
}

/// What the user should expect next for a delivery that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryHint {
    /// Daily send cap reached; the email goes out once the cap resets.
    Queued,
    /// A transport failure the bulk dispatcher is still retrying.
    Automatic,
    /// Nothing will retry this; the user has to send again.
    Manual,
}

impl RetryHint {
    pub fn describe(&self) -> &'static str {
        match self {
            RetryHint::Queued => "Queued for later: today's sending limit was reached.",
            RetryHint::Automatic => "Sending failed and will be retried automatically.",
            RetryHint::Manual => "Failed: no automatic retry. Send again to retry.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of delivering feedback to one candidate.
///
/// `success` and `queued` are never both true. A queued result has no error:
/// it is a deferred success, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub candidate_id: Uuid,
    pub success: bool,
    pub queued: bool,
    /// Tracking id of the sent email; also its Message-ID local part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DeliveryFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryHint>,
    pub attempts: u32,
    pub message: String,
}

impl DeliveryResult {
    pub fn sent(candidate_id: Uuid, email_id: Uuid, report_id: Uuid, pdf_url: String, attempts: u32) -> Self {
        Self {
            candidate_id,
            success: true,
            queued: false,
            email_id: Some(email_id),
            report_id: Some(report_id),
            pdf_url: Some(pdf_url),
            error: None,
            retry: None,
            attempts,
            message: "Feedback sent.".to_string(),
        }
    }

    pub fn queued(candidate_id: Uuid, report_id: Uuid, pdf_url: String, reason: String) -> Self {
        Self {
            candidate_id,
            success: false,
            queued: true,
            email_id: None,
            report_id: Some(report_id),
            pdf_url: Some(pdf_url),
            error: None,
            retry: Some(RetryHint::Queued),
            attempts: 1,
            message: format!("{} {reason}", RetryHint::Queued.describe()),
        }
    }

    pub fn failed(candidate_id: Uuid, error: &DeliveryError, hint: RetryHint) -> Self {
        Self {
            candidate_id,
            success: false,
            queued: false,
            email_id: None,
            report_id: None,
            pdf_url: None,
            error: Some(DeliveryFailure {
                kind: error.kind(),
                message: error.to_string(),
            }),
            retry: Some(hint),
            attempts: match error {
                DeliveryError::Persistence { attempts, .. }
                | DeliveryError::Transport { attempts, .. } => *attempts,
                _ => 1,
            },
            message: format!("{} {error}", hint.describe()),
        }
    }

    /// Attaches the artifacts that were produced before a later step failed.
    pub fn with_report(mut self, report_id: Uuid, pdf_url: String) -> Self {
        self.report_id = Some(report_id);
        self.pdf_url = Some(pdf_url);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_is_not_a_failure() {
        let result = DeliveryResult::queued(
            Uuid::nil(),
            Uuid::nil(),
            "https://cdn.example/r.pdf".to_string(),
            "Cap of 100 reached.".to_string(),
        );
        assert!(!result.success);
        assert!(result.queued);
        assert!(result.error.is_none());
        assert!(result.message.starts_with("Queued for later"));
    }

    #[test]
    fn test_failure_messages_distinguish_retry_paths() {
        let err = DeliveryError::Transport {
            attempts: 3,
            message: "connection refused".to_string(),
        };
        let manual = DeliveryResult::failed(Uuid::nil(), &err, RetryHint::Manual);
        let automatic = DeliveryResult::failed(Uuid::nil(), &err, RetryHint::Automatic);
        assert_eq!(manual.attempts, 3);
        assert!(!manual.queued);
        assert_ne!(manual.message, automatic.message);
        assert!(manual.message.contains("no automatic retry"));
        assert!(automatic.message.contains("retried automatically"));
    }

    #[test]
    fn test_error_kinds_serialize() {
        let result = DeliveryResult::failed(Uuid::nil(), &DeliveryError::NotFound(Uuid::nil()), RetryHint::Manual);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"]["kind"], "not_found");
        assert_eq!(json["retry"], "manual");
        assert!(json.get("email_id").is_none());
    }
}
