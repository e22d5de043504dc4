//! Outbound email seam. The transport owns the per-company daily cap, so a
//! submit can come back `Queued` without anything having gone wrong.

pub mod send_cap;
pub mod smtp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::company::SenderIdentity;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),

    #[error("Send cap unavailable: {0}")]
    SendCap(#[from] redis::RedisError),
}

/// A fully formed message. The PDF travels as a link in the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    /// Doubles as the Message-ID local part and the tracking email id.
    pub tracking_id: Uuid,
    pub sender: SenderIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransportReceipt {
    Sent { message_id: String },
    /// Daily cap reached; deferred, not failed.
    Queued { reason: String },
    Failed { error: String },
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn submit(&self, email: &OutboundEmail) -> TransportReceipt;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
