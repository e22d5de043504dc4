//! Campaign bookkeeping for one delivery run. A single send gets its own
//! ledger; a bulk batch shares one, so each company in the batch gets exactly
//! one campaign, opened when its first candidate reaches the send step.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{info, warn};
use uuid::Uuid;

use crate::mailer::TransportReceipt;
use crate::models::feedback::{CampaignStatus, NewCampaign};
use crate::store::{FeedbackStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct CampaignTally {
    campaign_id: Uuid,
    sent: u32,
    queued: u32,
    failed: u32,
}

pub struct CampaignLedger {
    label: String,
    entries: Mutex<HashMap<Uuid, CampaignTally>>,
}

impl CampaignLedger {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn campaign_for(&self, company_id: Uuid) -> Option<Uuid> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&company_id).map(|t| t.campaign_id))
    }

    /// Opens the company's campaign, or adds one recipient to it.
    pub async fn enroll(
        &self,
        store: &dyn FeedbackStore,
        company_id: Uuid,
    ) -> Result<Uuid, StoreError> {
        if let Some(campaign_id) = self.campaign_for(company_id) {
            store.add_campaign_recipient(campaign_id).await?;
            return Ok(campaign_id);
        }

        let campaign = NewCampaign {
            id: Uuid::new_v4(),
            company_id,
            label: self.label.clone(),
            recipient_count: 1,
        };
        store.open_campaign(&campaign).await?;
        info!(campaign_id = %campaign.id, %company_id, label = %campaign.label, "Campaign opened");

        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                company_id,
                CampaignTally {
                    campaign_id: campaign.id,
                    sent: 0,
                    queued: 0,
                    failed: 0,
                },
            );
        }
        Ok(campaign.id)
    }

    /// Counts a final transport outcome against the company's campaign.
    pub fn tally(&self, company_id: Uuid, receipt: &TransportReceipt) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if let Some(tally) = entries.get_mut(&company_id) {
            match receipt {
                TransportReceipt::Sent { .. } => tally.sent += 1,
                TransportReceipt::Queued { .. } => tally.queued += 1,
                TransportReceipt::Failed { .. } => tally.failed += 1,
            }
        }
    }

    /// Settles every campaign opened through this ledger. Failures are logged;
    /// the sends themselves already happened.
    pub async fn close(&self, store: &dyn FeedbackStore, cancelled: bool) -> Vec<(Uuid, CampaignStatus)> {
        let tallies: Vec<CampaignTally> = match self.entries.lock() {
            Ok(entries) => entries.values().copied().collect(),
            Err(_) => Vec::new(),
        };

        let mut settled = Vec::with_capacity(tallies.len());
        for tally in tallies {
            let status = CampaignStatus::settle(tally.sent, tally.queued, tally.failed, cancelled);
            if let Err(e) = store.complete_campaign(tally.campaign_id, status).await {
                warn!(campaign_id = %tally.campaign_id, error = %e, "Could not close campaign");
            }
            settled.push((tally.campaign_id, status));
        }
        settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;

    #[tokio::test]
    async fn test_one_campaign_per_company() {
        let store = InMemoryStore::default();
        let ledger = CampaignLedger::new("Batch");
        let acme = Uuid::from_u128(1);
        let globex = Uuid::from_u128(2);

        let a1 = ledger.enroll(&store, acme).await.unwrap();
        let a2 = ledger.enroll(&store, acme).await.unwrap();
        let g1 = ledger.enroll(&store, globex).await.unwrap();

        assert_eq!(a1, a2);
        assert_ne!(a1, g1);
        let campaigns = store.campaigns();
        assert_eq!(campaigns.len(), 2);
        assert_eq!(campaigns[&a1].recipient_count, 2);
        assert_eq!(campaigns[&g1].recipient_count, 1);
    }

    #[tokio::test]
    async fn test_close_settles_from_tallies() {
        let store = InMemoryStore::default();
        let ledger = CampaignLedger::new("Batch");
        let company = Uuid::from_u128(1);
        let id = ledger.enroll(&store, company).await.unwrap();
        ledger.enroll(&store, company).await.unwrap();

        ledger.tally(
            company,
            &TransportReceipt::Sent {
                message_id: "m".to_string(),
            },
        );
        ledger.tally(
            company,
            &TransportReceipt::Queued {
                reason: "cap".to_string(),
            },
        );

        let settled = ledger.close(&store, false).await;
        assert_eq!(settled, vec![(id, CampaignStatus::Partial)]);
        assert_eq!(store.campaigns()[&id].status, "partial");
    }
}
