//! SMTP transport via `lettre`, gated by the Redis daily send cap.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::mailer::send_cap::{DailySendCap, Reservation};
use crate::mailer::{EmailError, EmailTransport, OutboundEmail, TransportReceipt};

/// Default SMTP port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Default envelope sender when `SMTP_FROM` is not set.
pub const DEFAULT_FROM_ADDRESS: &str = "feedback@noreply.local";

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    cap: DailySendCap,
}

impl SmtpTransport {
    pub fn new(settings: &SmtpSettings, cap: DailySendCap) -> Result<Self, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port);
        if let (Some(user), Some(pass)) = (&settings.user, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            mailer: builder.build(),
            from_address: settings.from_address.clone(),
            cap,
        })
    }

    /// Company sender identity when it parses, otherwise the configured default.
    fn from_mailbox(&self, email: &OutboundEmail) -> Result<Mailbox, EmailError> {
        let name = Some(email.sender.name.clone()).filter(|n| !n.trim().is_empty());
        match email.sender.email.parse() {
            Ok(address) => Ok(Mailbox::new(name, address)),
            Err(_) => Ok(Mailbox::new(name, self.from_address.parse()?)),
        }
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, EmailError> {
        let to = Mailbox::new(Some(email.to_name.clone()), email.to.parse()?);
        let from = self.from_mailbox(email)?;
        let domain = from.email.domain().to_string();

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .message_id(Some(format!("<{}@{}>", email.tracking_id, domain)))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| EmailError::Build(e.to_string()))
    }

    async fn send_reserved(&self, email: &OutboundEmail) -> Result<String, EmailError> {
        let message = self.build_message(email)?;
        let message_id = message
            .headers()
            .get_raw("Message-ID")
            .unwrap_or_default()
            .to_string();
        self.mailer.send(message).await?;
        Ok(message_id)
    }
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn submit(&self, email: &OutboundEmail) -> TransportReceipt {
        let company_id = email.sender.company_id;
        let slot = match self.cap.reserve(company_id, email.sender.daily_cap).await {
            Ok(Reservation::Granted(slot)) => slot,
            Ok(Reservation::OverCap) => {
                info!(%company_id, cap = email.sender.daily_cap, "Daily send cap reached, deferring");
                return TransportReceipt::Queued {
                    reason: format!(
                        "Daily limit of {} emails reached; it will be sent after midnight UTC",
                        email.sender.daily_cap
                    ),
                };
            }
            Err(e) => {
                warn!(%company_id, error = %e, "Send cap check failed, not sending");
                return TransportReceipt::Failed {
                    error: e.to_string(),
                };
            }
        };

        match self.send_reserved(email).await {
            Ok(message_id) => {
                info!(to = %email.to, tracking_id = %email.tracking_id, "Feedback email sent");
                TransportReceipt::Sent { message_id }
            }
            Err(e) => {
                self.cap.release(&slot).await;
                warn!(to = %email.to, error = %e, "Feedback email failed");
                TransportReceipt::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
