//! Persistence port for accounts and campaigns.
//!
//! Implementations only guarantee atomicity per record; nothing here spans
//! two records in one transaction.

use async_trait::async_trait;
use dashmap::DashMap;
use planner_core::types::{Account, CampaignRecord};
use planner_core::{PlannerError, PlannerResult};
use uuid::Uuid;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, id: Uuid) -> PlannerResult<Option<Account>>;

    async fn save_account(&self, account: &Account) -> PlannerResult<()>;

    async fn create_campaign(&self, record: &CampaignRecord) -> PlannerResult<()>;

    /// Replaces an existing campaign record.
    async fn update_campaign(&self, record: &CampaignRecord) -> PlannerResult<()>;

    async fn get_campaign(&self, id: Uuid) -> PlannerResult<Option<CampaignRecord>>;

    /// Campaigns of one account, oldest first.
    async fn list_campaigns(&self, account_id: Uuid) -> PlannerResult<Vec<CampaignRecord>>;
}

/// In-memory store backed by `DashMap`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    accounts: DashMap<Uuid, Account>,
    campaigns: DashMap<Uuid, CampaignRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn campaign_count(&self) -> usize {
        self.campaigns.len()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get_account(&self, id: Uuid) -> PlannerResult<Option<Account>> {
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn save_account(&self, account: &Account) -> PlannerResult<()> {
        self.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn create_campaign(&self, record: &CampaignRecord) -> PlannerResult<()> {
        if self.campaigns.contains_key(&record.id) {
            return Err(PlannerError::Persistence(format!(
                "campaign {} already exists",
                record.id
            )));
        }
        self.campaigns.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_campaign(&self, record: &CampaignRecord) -> PlannerResult<()> {
        let mut entry = self
            .campaigns
            .get_mut(&record.id)
            .ok_or_else(|| PlannerError::Persistence(format!("campaign {} not found", record.id)))?;
        *entry = record.clone();
        Ok(())
    }

    async fn get_campaign(&self, id: Uuid) -> PlannerResult<Option<CampaignRecord>> {
        Ok(self.campaigns.get(&id).map(|c| c.clone()))
    }

    async fn list_campaigns(&self, account_id: Uuid) -> PlannerResult<Vec<CampaignRecord>> {
        let mut campaigns: Vec<CampaignRecord> = self
            .campaigns
            .iter()
            .filter(|c| c.account_id == account_id)
            .map(|c| c.value().clone())
            .collect();
        campaigns.sort_by_key(|c| c.created_at);
        Ok(campaigns)
    }
}
