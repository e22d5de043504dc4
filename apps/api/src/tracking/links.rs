//! Tracked URLs embedded in outgoing email.

use url::form_urlencoded;
use uuid::Uuid;

pub const UTM_SOURCE: &str = "feedback_email";
pub const UTM_MEDIUM: &str = "email";
pub const UTM_CAMPAIGN: &str = "rejection_feedback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingLinks {
    pub base_url: String,
    pub candidate_id: Uuid,
    pub email_id: Uuid,
}

impl TrackingLinks {
    pub fn new(base_url: &str, candidate_id: Uuid, email_id: Uuid) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            candidate_id,
            email_id,
        }
    }

    /// Redirect through the click endpoint, carrying UTM parameters.
    pub fn click_url(&self, target: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("cid", &self.candidate_id.to_string())
            .append_pair("eid", &self.email_id.to_string())
            .append_pair("url", target)
            .append_pair("utm_source", UTM_SOURCE)
            .append_pair("utm_medium", UTM_MEDIUM)
            .append_pair("utm_campaign", UTM_CAMPAIGN)
            .finish();
        format!("{}/api/v1/track/click?{}", self.base_url, query)
    }

    pub fn open_pixel_url(&self) -> String {
        format!(
            "{}/api/v1/track/open/{}/{}",
            self.base_url, self.candidate_id, self.email_id
        )
    }
}

/// Only http(s) targets are followed by the click redirect.
pub fn is_safe_redirect(target: &str) -> bool {
    match url::Url::parse(target) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
        Err(_) => false,
    }
}
