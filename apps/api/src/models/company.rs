use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Company settings as stored. Read-only to the feedback pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyRow {
    pub id: Uuid,
    pub name: String,
    /// Object-store key of the company logo (JPEG), if one was uploaded.
    pub logo_key: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    pub daily_email_cap: i32,
    pub sender_name: String,
    pub sender_email: String,
    pub resume_fix_url: Option<String>,
    pub learning_url: Option<String>,
    pub reapply_url: Option<String>,
    pub footer_message: Option<String>,
}

/// Who an email is sent as, and the cap the transport enforces for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub company_id: Uuid,
    pub name: String,
    pub email: String,
    pub daily_cap: u32,
}

impl CompanyRow {
    pub fn sender(&self) -> SenderIdentity {
        SenderIdentity {
            company_id: self.id,
            name: self.sender_name.clone(),
            email: self.sender_email.clone(),
            daily_cap: self.daily_email_cap.max(0) as u32,
        }
    }
}
