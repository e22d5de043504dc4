use std::time::Duration;

use anyhow::{Context, Result};

use crate::delivery::bulk::DEFAULT_SEND_DELAY;
use crate::delivery::queue::DEFAULT_QUEUE_POLL_INTERVAL;
use crate::mailer::smtp::{SmtpSettings, DEFAULT_FROM_ADDRESS, DEFAULT_SMTP_PORT};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    /// Base URL PDFs and logos are served from.
    pub s3_public_base_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub smtp: SmtpSettings,
    /// Root of the open-pixel and click-redirect URLs embedded in emails.
    pub tracking_base_url: String,
    pub bulk_send_delay: Duration,
    /// How often capped emails are checked for resending.
    pub queue_poll_interval: Duration,
    pub anthropic_api_key: Option<String>,
    pub enable_llm_enrichment: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;
        let s3_bucket = require_env("S3_BUCKET")?;
        let s3_endpoint = require_env("S3_ENDPOINT")?;
        let s3_public_base_url = optional_env("S3_PUBLIC_BASE_URL").unwrap_or_else(|| {
            format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket)
        });

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket,
            s3_endpoint,
            s3_public_base_url,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            smtp: SmtpSettings {
                host: require_env("SMTP_HOST")?,
                port: match optional_env("SMTP_PORT") {
                    Some(p) => p.parse().context("SMTP_PORT must be a valid port number")?,
                    None => DEFAULT_SMTP_PORT,
                },
                from_address: optional_env("SMTP_FROM")
                    .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
                user: optional_env("SMTP_USER"),
                password: optional_env("SMTP_PASSWORD"),
            },
            tracking_base_url: optional_env("TRACKING_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            bulk_send_delay: match optional_env("BULK_SEND_DELAY_MS") {
                Some(ms) => Duration::from_millis(
                    ms.parse()
                        .context("BULK_SEND_DELAY_MS must be a whole number of milliseconds")?,
                ),
                None => DEFAULT_SEND_DELAY,
            },
            queue_poll_interval: match optional_env("QUEUE_POLL_INTERVAL_SECS") {
                Some(secs) => Duration::from_secs(
                    secs.parse::<u64>()
                        .context("QUEUE_POLL_INTERVAL_SECS must be a whole number of seconds")?
                        .max(1),
                ),
                None => DEFAULT_QUEUE_POLL_INTERVAL,
            },
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            enable_llm_enrichment: optional_env("ENABLE_LLM_ENRICHMENT")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            port,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank both read as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
