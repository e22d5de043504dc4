//! Per-company daily send cap, counted atomically in Redis.
//!
//! `INCR email_cap:<company_id>:<YYYY-MM-DD>` reserves a slot; a count above the
//! cap means the slot is released again and the send is deferred.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::mailer::EmailError;

/// Keys outlive the day they count so late reads near midnight still resolve.
const CAP_KEY_TTL_SECS: i64 = 48 * 60 * 60;

pub fn cap_key(company_id: Uuid, day: NaiveDate) -> String {
    format!("email_cap:{company_id}:{}", day.format("%Y-%m-%d"))
}

/// When today's counter stops applying: the next midnight UTC.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or_else(|| now + Duration::days(1))
}

/// One reserved send, bound to the day it was counted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapSlot {
    company_id: Uuid,
    key: String,
}

impl CapSlot {
    pub fn new(company_id: Uuid, day: NaiveDate) -> Self {
        Self {
            company_id,
            key: cap_key(company_id, day),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    Granted(CapSlot),
    OverCap,
}

/// Snapshot of today's usage. Advisory only: concurrent senders may move the
/// counter between this read and the next reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapUsage {
    pub used: u32,
    pub cap: u32,
    pub remaining: u32,
    pub estimate: bool,
}

impl CapUsage {
    pub fn from_count(count: i64, cap: u32) -> Self {
        let used = count.clamp(0, u32::MAX as i64) as u32;
        Self {
            used,
            cap,
            remaining: cap.saturating_sub(used),
            estimate: true,
        }
    }
}

#[derive(Clone)]
pub struct DailySendCap {
    client: redis::Client,
}

impl DailySendCap {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, EmailError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn reserve(&self, company_id: Uuid, cap: u32) -> Result<Reservation, EmailError> {
        let slot = CapSlot::new(company_id, Utc::now().date_naive());
        let key = slot.key();
        let mut conn = self.connection().await?;
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .cmd("EXPIRE")
            .arg(key)
            .arg(CAP_KEY_TTL_SECS)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count > cap as i64 {
            self.release_on(&mut conn, key).await;
            return Ok(Reservation::OverCap);
        }
        Ok(Reservation::Granted(slot))
    }

    /// Gives back a slot taken by `reserve`, on the day it was counted. Best effort.
    pub async fn release(&self, slot: &CapSlot) {
        match self.connection().await {
            Ok(mut conn) => self.release_on(&mut conn, slot.key()).await,
            Err(e) => {
                warn!(company_id = %slot.company_id, error = %e, "Could not release send-cap slot")
            }
        }
    }

    async fn release_on(&self, conn: &mut MultiplexedConnection, key: &str) {
        let result: Result<i64, redis::RedisError> =
            redis::cmd("DECR").arg(key).query_async(conn).await;
        if let Err(e) = result {
            warn!(key, error = %e, "Could not release send-cap slot");
        }
    }

    pub async fn usage(&self, company_id: Uuid, cap: u32) -> Result<CapUsage, EmailError> {
        let key = cap_key(company_id, Utc::now().date_naive());
        let mut conn = self.connection().await?;
        let count: Option<i64> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
        Ok(CapUsage::from_count(count.unwrap_or(0), cap))
    }
}
