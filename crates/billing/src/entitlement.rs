//! Entitlement engine: gates campaign generation on trial or subscription
//! state and records each campaign against the account's quota.
//!
//! Every mutation of an account runs under that account's async lock, so
//! there is a single writer per account at any time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use planner_core::config::EntitlementConfig;
use planner_core::event_bus::{make_event, make_event_with_detail, noop_sink, EventSink};
use planner_core::types::{
    Account, AccountStatus, CampaignRecord, EventType, NewCampaign, Subscription, UsageInfo,
    UsageReason,
};
use planner_core::{PlannerError, PlannerResult};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::policy::{self, decide, roll_quota_period, trial_has_expired};
use crate::store::AccountStore;

/// Holds one account's lock. The map entry is removed on release once no
/// other task holds or waits on it.
struct AccountGuard<'a> {
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    account_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // The shard lock is held while the count is read, so a concurrent
        // `lock_account` either cloned first or inserts a fresh entry after.
        self.locks
            .remove_if(&self.account_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct EntitlementEngine {
    store: Arc<dyn AccountStore>,
    config: EntitlementConfig,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for EntitlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementEngine")
            .field("config", &self.config)
            .field("locked_accounts", &self.locks.len())
            .finish()
    }
}

impl EntitlementEngine {
    pub fn new(store: Arc<dyn AccountStore>, config: EntitlementConfig) -> Self {
        info!(
            trial_limit = config.trial_campaign_limit,
            trial_days = config.trial_length_days,
            "EntitlementEngine initialized"
        );
        Self {
            store,
            config,
            locks: DashMap::new(),
            event_sink: noop_sink(),
        }
    }

    /// Attach an event sink for emitting entitlement events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn config(&self) -> &EntitlementConfig {
        &self.config
    }

    async fn lock_account(&self, account_id: Uuid) -> AccountGuard<'_> {
        let lock = self
            .locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        AccountGuard {
            locks: &self.locks,
            account_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    async fn load(&self, account_id: Uuid) -> PlannerResult<Option<Account>> {
        self.store.get_account(account_id).await
    }

    async fn load_existing(&self, account_id: Uuid) -> PlannerResult<Account> {
        self.load(account_id)
            .await?
            .ok_or_else(|| PlannerError::Validation(format!("account {account_id} not found")))
    }

    /// Applies time-driven state changes (trial expiry, quota rollover) and
    /// persists them. Caller must hold the account lock.
    ///
    /// Returns the pre-expiry snapshot when this call expired the trial.
    async fn refresh(
        &self,
        account: &mut Account,
        now: DateTime<Utc>,
    ) -> PlannerResult<Option<Account>> {
        let mut changed = false;
        let mut before_expiry = None;

        if trial_has_expired(account, now) {
            before_expiry = Some(account.clone());
            account.account_status = AccountStatus::Expired;
            changed = true;
            info!(account_id = %account.id, "Trial expired");
            self.event_sink.emit(make_event(
                EventType::TrialExpired,
                Some(account.id),
                None,
                None,
            ));
        }

        if account.account_status == AccountStatus::Active {
            if let Some(sub) = account.active_subscription.as_mut() {
                if roll_quota_period(sub, now, self.config.quota_period_days) {
                    changed = true;
                    info!(
                        account_id = %account.id,
                        next_reset = %sub.quota_reset_date,
                        "Quota period rolled over"
                    );
                    self.event_sink.emit(make_event(
                        EventType::QuotaPeriodRolled,
                        Some(account.id),
                        None,
                        None,
                    ));
                }
            }
        }

        if changed {
            account.updated_at = now;
            self.store.save_account(account).await?;
        }
        Ok(before_expiry)
    }

    /// Loads and refreshes the account. Returns the refreshed account and
    /// the snapshot decisions are made on.
    async fn load_refreshed(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> PlannerResult<(Option<Account>, Option<Account>)> {
        let Some(mut account) = self.load(account_id).await? else {
            return Ok((None, None));
        };
        let basis = self
            .refresh(&mut account, now)
            .await?
            .unwrap_or_else(|| account.clone());
        Ok((Some(account), Some(basis)))
    }

    fn record_denial(&self, account_id: Uuid, reason: UsageReason) {
        metrics::counter!("entitlement.denied", "reason" => reason.as_str()).increment(1);
        info!(account_id = %account_id, %reason, "Campaign generation denied");
        self.event_sink.emit(make_event_with_detail(
            EventType::EntitlementDenied,
            Some(account_id),
            None,
            None,
            reason.as_str(),
        ));
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    /// Creates a trial account, or returns the existing account unchanged.
    pub async fn start_trial(&self, account_id: Uuid) -> PlannerResult<Account> {
        self.start_trial_at(account_id, Utc::now()).await
    }

    pub async fn start_trial_at(&self, account_id: Uuid, now: DateTime<Utc>) -> PlannerResult<Account> {
        let _guard = self.lock_account(account_id).await;

        if let Some(existing) = self.load(account_id).await? {
            return Ok(existing);
        }

        let account = Account {
            id: account_id,
            account_status: AccountStatus::Trial,
            trial_campaigns_used: 0,
            trial_end_date: now + Duration::days(self.config.trial_length_days),
            active_subscription: None,
            updated_at: now,
        };
        self.store.save_account(&account).await?;
        info!(account_id = %account_id, ends = %account.trial_end_date, "Trial started");
        self.event_sink.emit(make_event(
            EventType::TrialStarted,
            Some(account_id),
            None,
            None,
        ));
        Ok(account)
    }

    /// Moves the account to `active` with a fresh subscription and period.
    pub async fn activate_subscription(&self, account_id: Uuid, quota: u32) -> PlannerResult<Account> {
        self.activate_subscription_at(account_id, quota, Utc::now()).await
    }

    pub async fn activate_subscription_at(
        &self,
        account_id: Uuid,
        quota: u32,
        now: DateTime<Utc>,
    ) -> PlannerResult<Account> {
        let _guard = self.lock_account(account_id).await;

        let mut account = self.load_existing(account_id).await?;
        let subscription = Subscription {
            id: Uuid::new_v4(),
            campaign_quota: quota,
            campaigns_used_current_period: 0,
            quota_reset_date: now + Duration::days(self.config.quota_period_days),
        };
        account.account_status = AccountStatus::Active;
        account.active_subscription = Some(subscription);
        account.updated_at = now;
        self.store.save_account(&account).await?;

        info!(account_id = %account_id, quota, "Subscription activated");
        self.event_sink.emit(make_event(
            EventType::SubscriptionActivated,
            Some(account_id),
            None,
            None,
        ));
        Ok(account)
    }

    /// Moves the account to `expired`; the subscription record is dropped.
    pub async fn expire_subscription(&self, account_id: Uuid) -> PlannerResult<Account> {
        let _guard = self.lock_account(account_id).await;

        let mut account = self.load_existing(account_id).await?;
        account.account_status = AccountStatus::Expired;
        account.active_subscription = None;
        account.updated_at = Utc::now();
        self.store.save_account(&account).await?;

        info!(account_id = %account_id, "Subscription expired");
        self.event_sink.emit(make_event(
            EventType::SubscriptionExpired,
            Some(account_id),
            None,
            None,
        ));
        Ok(account)
    }

    // ─── Checks ─────────────────────────────────────────────────────────────

    /// Evaluates the decision table, persisting trial expiry and quota
    /// rollover as side effects.
    pub async fn can_generate(&self, account_id: Uuid) -> PlannerResult<UsageInfo> {
        self.can_generate_at(account_id, Utc::now()).await
    }

    pub async fn can_generate_at(&self, account_id: Uuid, now: DateTime<Utc>) -> PlannerResult<UsageInfo> {
        let _guard = self.lock_account(account_id).await;

        let (_, basis) = self.load_refreshed(account_id, now).await?;

        let info = policy::usage_info(basis.as_ref(), now, &self.config);
        if !info.can_generate {
            self.record_denial(account_id, info.reason);
        }
        Ok(info)
    }

    /// Like [`can_generate`](Self::can_generate) but turns a denial into
    /// `PlannerError::EntitlementDenied`.
    pub async fn ensure_can_generate(&self, account_id: Uuid) -> PlannerResult<UsageInfo> {
        let info = self.can_generate(account_id).await?;
        if info.can_generate {
            Ok(info)
        } else {
            Err(PlannerError::denied(info.reason))
        }
    }

    /// Usage summary for display. Nothing is written; an elapsed quota
    /// period is reported as already reset.
    pub async fn usage_info(&self, account_id: Uuid) -> PlannerResult<UsageInfo> {
        self.usage_info_at(account_id, Utc::now()).await
    }

    pub async fn usage_info_at(&self, account_id: Uuid, now: DateTime<Utc>) -> PlannerResult<UsageInfo> {
        let mut account = self.load(account_id).await?;
        if let Some(sub) = account
            .as_mut()
            .filter(|a| a.account_status == AccountStatus::Active)
            .and_then(|a| a.active_subscription.as_mut())
        {
            roll_quota_period(sub, now, self.config.quota_period_days);
        }
        Ok(policy::usage_info(account.as_ref(), now, &self.config))
    }

    // ─── Consumption ────────────────────────────────────────────────────────

    /// Records a new campaign: re-checks entitlement, increments the
    /// applicable counter, saves the account, then saves the campaign.
    ///
    /// The two writes are not atomic together. If saving the campaign fails
    /// the incremented counter stays persisted.
    pub async fn create_campaign_usage(
        &self,
        account_id: Uuid,
        campaign: NewCampaign,
    ) -> PlannerResult<CampaignRecord> {
        self.create_campaign_usage_at(account_id, campaign, Utc::now()).await
    }

    pub async fn create_campaign_usage_at(
        &self,
        account_id: Uuid,
        campaign: NewCampaign,
        now: DateTime<Utc>,
    ) -> PlannerResult<CampaignRecord> {
        let _guard = self.lock_account(account_id).await;

        let (account, basis) = self.load_refreshed(account_id, now).await?;

        let decision = decide(basis.as_ref(), now, &self.config);
        let mut account = match account {
            Some(account) if decision.allowed => account,
            _ => {
                self.record_denial(account_id, decision.reason);
                return Err(PlannerError::denied(decision.reason));
            }
        };

        let (is_trial_campaign, subscription_id) = match decision.reason {
            UsageReason::Trial => {
                account.trial_campaigns_used += 1;
                (true, None)
            }
            _ => {
                let sub = account.active_subscription.as_mut().ok_or_else(|| {
                    PlannerError::Persistence(format!("account {account_id} lost its subscription"))
                })?;
                sub.campaigns_used_current_period += 1;
                (false, Some(sub.id))
            }
        };
        account.updated_at = now;
        self.store.save_account(&account).await?;

        let record = CampaignRecord {
            id: Uuid::new_v4(),
            account_id,
            goal: campaign.goal,
            audience: campaign.audience,
            is_trial_campaign,
            subscription_id,
            draft: campaign.draft,
            channel_assets: Default::default(),
            created_at: now,
            updated_at: now,
        };
        if let Err(err) = self.store.create_campaign(&record).await {
            warn!(
                account_id = %account_id,
                error = %err,
                "Campaign save failed after usage was recorded; counter not rolled back"
            );
            return Err(err);
        }

        metrics::counter!("campaign.usage_recorded", "reason" => decision.reason.as_str()).increment(1);
        info!(
            account_id = %account_id,
            campaign_id = %record.id,
            trial = is_trial_campaign,
            "Campaign usage recorded"
        );
        self.event_sink.emit(make_event(
            EventType::UsageRecorded,
            Some(account_id),
            Some(record.id),
            None,
        ));
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use planner_core::event_bus::capture_sink;

    fn draft() -> NewCampaign {
        NewCampaign {
            goal: "Launch spring menu".into(),
            audience: "Local foodies".into(),
            draft: serde_json::json!({"journey": []}),
        }
    }

    fn engine(store: Arc<InMemoryStore>) -> EntitlementEngine {
        EntitlementEngine::new(store, EntitlementConfig::default())
    }

    #[tokio::test]
    async fn test_trial_allows_one_campaign() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store.clone());
        let account_id = Uuid::new_v4();
        engine.start_trial(account_id).await.unwrap();

        let info = engine.can_generate(account_id).await.unwrap();
        assert!(info.can_generate);
        assert_eq!(info.reason, UsageReason::Trial);

        let record = engine.create_campaign_usage(account_id, draft()).await.unwrap();
        assert!(record.is_trial_campaign);
        assert_eq!(record.subscription_id, None);

        let info = engine.can_generate(account_id).await.unwrap();
        assert!(!info.can_generate);
        assert_eq!(info.reason, UsageReason::QuotaExceeded);

        let err = engine.create_campaign_usage(account_id, draft()).await.unwrap_err();
        assert_eq!(err.denial_reason(), Some(UsageReason::QuotaExceeded));
        assert_eq!(store.campaign_count(), 1);
    }

    #[tokio::test]
    async fn test_trial_expiry_is_persisted() {
        let store = Arc::new(InMemoryStore::new());
        let sink = capture_sink();
        let engine = engine(store.clone()).with_event_sink(sink.clone());
        let account_id = Uuid::new_v4();
        let start = Utc::now();
        engine.start_trial_at(account_id, start).await.unwrap();

        let later = start + Duration::days(8);
        let info = engine.can_generate_at(account_id, later).await.unwrap();
        assert!(!info.can_generate);
        assert_eq!(info.reason, UsageReason::TrialExpired);

        let stored = store.get_account(account_id).await.unwrap().unwrap();
        assert_eq!(stored.account_status, AccountStatus::Expired);
        assert_eq!(sink.count_type(EventType::TrialExpired), 1);

        // Once expired the account needs a subscription.
        let info = engine.can_generate_at(account_id, later).await.unwrap();
        assert_eq!(info.reason, UsageReason::SubscriptionRequired);
    }

    #[tokio::test]
    async fn test_usage_on_lapsed_trial_reports_trial_expired_once() {
        let store = Arc::new(InMemoryStore::new());
        let sink = capture_sink();
        let engine = engine(store.clone()).with_event_sink(sink.clone());
        let account_id = Uuid::new_v4();
        let start = Utc::now();
        engine.start_trial_at(account_id, start).await.unwrap();

        let later = start + Duration::days(8);
        let err = engine
            .create_campaign_usage_at(account_id, draft(), later)
            .await
            .unwrap_err();
        assert_eq!(err.denial_reason(), Some(UsageReason::TrialExpired));
        let stored = store.get_account(account_id).await.unwrap().unwrap();
        assert_eq!(stored.account_status, AccountStatus::Expired);
        assert_eq!(stored.trial_campaigns_used, 0);

        let err = engine
            .create_campaign_usage_at(account_id, draft(), later)
            .await
            .unwrap_err();
        assert_eq!(err.denial_reason(), Some(UsageReason::SubscriptionRequired));
        assert_eq!(sink.count_type(EventType::TrialExpired), 1);
        assert_eq!(store.campaign_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_quota() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store.clone());
        let account_id = Uuid::new_v4();
        engine.start_trial(account_id).await.unwrap();
        let account = engine.activate_subscription(account_id, 2).await.unwrap();
        let sub_id = account.active_subscription.unwrap().id;

        for _ in 0..2 {
            let record = engine.create_campaign_usage(account_id, draft()).await.unwrap();
            assert!(!record.is_trial_campaign);
            assert_eq!(record.subscription_id, Some(sub_id));
        }

        let info = engine.can_generate(account_id).await.unwrap();
        assert!(!info.can_generate);
        assert_eq!(info.reason, UsageReason::QuotaExceeded);
        assert_eq!(info.remaining, 0);
        assert_eq!(info.limit, 2);
    }

    #[tokio::test]
    async fn test_quota_rolls_over() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store.clone());
        let account_id = Uuid::new_v4();
        let start = Utc::now();
        engine.start_trial_at(account_id, start).await.unwrap();
        engine.activate_subscription_at(account_id, 1, start).await.unwrap();
        engine
            .create_campaign_usage_at(account_id, draft(), start)
            .await
            .unwrap();
        assert!(!engine.can_generate_at(account_id, start).await.unwrap().can_generate);

        let next_period = start + Duration::days(31);
        let preview = engine.usage_info_at(account_id, next_period).await.unwrap();
        assert!(preview.can_generate);
        // Preview does not write.
        let stored = store.get_account(account_id).await.unwrap().unwrap();
        assert_eq!(
            stored.active_subscription.as_ref().unwrap().campaigns_used_current_period,
            1
        );

        let info = engine.can_generate_at(account_id, next_period).await.unwrap();
        assert!(info.can_generate);
        assert_eq!(info.reason, UsageReason::Subscription);
        let stored = store.get_account(account_id).await.unwrap().unwrap();
        assert_eq!(
            stored.active_subscription.unwrap().campaigns_used_current_period,
            0
        );
    }

    #[tokio::test]
    async fn test_missing_and_expired_accounts() {
        let store = Arc::new(InMemoryStore::new());
        let sink = capture_sink();
        let engine = engine(store.clone()).with_event_sink(sink.clone());

        let err = engine
            .create_campaign_usage(Uuid::new_v4(), draft())
            .await
            .unwrap_err();
        assert_eq!(err.denial_reason(), Some(UsageReason::SubscriptionRequired));

        let account_id = Uuid::new_v4();
        engine.start_trial(account_id).await.unwrap();
        engine.activate_subscription(account_id, 5).await.unwrap();
        engine.expire_subscription(account_id).await.unwrap();
        let err = engine.ensure_can_generate(account_id).await.unwrap_err();
        assert_eq!(err.denial_reason(), Some(UsageReason::SubscriptionRequired));
        assert_eq!(sink.count_type(EventType::EntitlementDenied), 2);
    }

    /// Store whose campaign writes always fail.
    #[derive(Default)]
    struct FailingCampaigns {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl AccountStore for FailingCampaigns {
        async fn get_account(&self, id: Uuid) -> PlannerResult<Option<Account>> {
            self.inner.get_account(id).await
        }
        async fn save_account(&self, account: &Account) -> PlannerResult<()> {
            self.inner.save_account(account).await
        }
        async fn create_campaign(&self, _record: &CampaignRecord) -> PlannerResult<()> {
            Err(PlannerError::Persistence("disk full".into()))
        }
        async fn update_campaign(&self, record: &CampaignRecord) -> PlannerResult<()> {
            self.inner.update_campaign(record).await
        }
        async fn get_campaign(&self, id: Uuid) -> PlannerResult<Option<CampaignRecord>> {
            self.inner.get_campaign(id).await
        }
        async fn list_campaigns(&self, account_id: Uuid) -> PlannerResult<Vec<CampaignRecord>> {
            self.inner.list_campaigns(account_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_campaign_save_keeps_counter() {
        let store = Arc::new(FailingCampaigns::default());
        let engine = EntitlementEngine::new(store.clone(), EntitlementConfig::default());
        let account_id = Uuid::new_v4();
        engine.start_trial(account_id).await.unwrap();

        let err = engine.create_campaign_usage(account_id, draft()).await.unwrap_err();
        assert!(matches!(err, PlannerError::Persistence(_)));

        let account = store.get_account(account_id).await.unwrap().unwrap();
        assert_eq!(account.trial_campaigns_used, 1);
    }

    #[tokio::test]
    async fn test_concurrent_usage_is_single_writer() {
        let store = Arc::new(InMemoryStore::new());
        let engine = Arc::new(engine(store.clone()));
        let account_id = Uuid::new_v4();
        engine.start_trial(account_id).await.unwrap();
        engine.activate_subscription(account_id, 3).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.create_campaign_usage(account_id, draft()).await.is_ok()
            }));
        }
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 3);
        assert_eq!(store.campaign_count(), 3);
        assert_eq!(engine.locks.len(), 0);
        let account = store.get_account(account_id).await.unwrap().unwrap();
        assert_eq!(
            account.active_subscription.unwrap().campaigns_used_current_period,
            3
        );
    }

    #[tokio::test]
    async fn test_lock_entries_are_released() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store.clone());

        for _ in 0..50 {
            let account_id = Uuid::new_v4();
            engine.start_trial(account_id).await.unwrap();
            engine.can_generate(account_id).await.unwrap();
            engine.create_campaign_usage(account_id, draft()).await.unwrap();
        }
        engine.can_generate(Uuid::new_v4()).await.unwrap();
        assert_eq!(engine.locks.len(), 0);

        let account_id = Uuid::new_v4();
        let held = engine.lock_account(account_id).await;
        assert_eq!(engine.locks.len(), 1);
        drop(held);
        assert_eq!(engine.locks.len(), 0);
    }
}
