//! Session controller: the single entry point a hosting application calls.
//!
//! Owns the active campaign and composes the entitlement engine, the
//! campaign generator and the asset orchestrator. Campaign generation is
//! checked against entitlement before the generator is called, and a
//! campaign is installed only after its draft validates and its usage has
//! been recorded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use planner_billing::{AccountStore, EntitlementEngine};
use planner_channels::{AssetGenerator, AssetOrchestrator, BatchSummary, CampaignContext, ChannelOutcome};
use planner_core::config::OrchestratorConfig;
use planner_core::event_bus::{make_event, make_event_with_detail, noop_sink, EventSink};
use planner_core::types::{
    AssetGenerationProgress, CampaignRecord, Channel, ChannelAssetGenerationResult, ChannelStatus,
    EventType, NewCampaign, UsageInfo,
};
use planner_core::{PlannerError, PlannerResult};
use planner_journey::render_outline;
use tracing::{info, warn};
use uuid::Uuid;

use crate::draft::CampaignDraft;
use crate::ports::CampaignGenerator;

#[derive(Debug, Clone)]
struct ActiveCampaign {
    record: CampaignRecord,
    draft: CampaignDraft,
    channels: Vec<Channel>,
}

impl ActiveCampaign {
    fn context(&self) -> CampaignContext {
        CampaignContext {
            campaign_id: self.record.id,
            goal: self.record.goal.clone(),
            audience: self.record.audience.clone(),
            strategy_summary: self.draft.strategy_summary(),
        }
    }
}

fn required(field: &str, value: &str) -> PlannerResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PlannerError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub struct SessionController {
    campaign_generator: Arc<dyn CampaignGenerator>,
    entitlements: Arc<EntitlementEngine>,
    store: Arc<dyn AccountStore>,
    orchestrator: AssetOrchestrator,
    active: Mutex<Option<ActiveCampaign>>,
    /// Serializes campaign generation so only one draft is in flight.
    campaign_lock: tokio::sync::Mutex<()>,
    /// Shared by asset operations, taken exclusively by campaign generation,
    /// so the active campaign cannot be generated against while it is being
    /// replaced.
    asset_gate: tokio::sync::RwLock<()>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("campaign_id", &self.active.lock().as_ref().map(|a| a.record.id))
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

impl SessionController {
    pub fn new(
        campaign_generator: Arc<dyn CampaignGenerator>,
        asset_generator: Arc<dyn AssetGenerator>,
        entitlements: Arc<EntitlementEngine>,
        store: Arc<dyn AccountStore>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            campaign_generator,
            entitlements,
            store,
            orchestrator: AssetOrchestrator::new(asset_generator, config),
            active: Mutex::new(None),
            campaign_lock: tokio::sync::Mutex::new(()),
            asset_gate: tokio::sync::RwLock::new(()),
            event_sink: noop_sink(),
        }
    }

    /// Attach an event sink; it is shared with the orchestrator.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.orchestrator = self.orchestrator.clone().with_event_sink(sink.clone());
        self.event_sink = sink;
        self
    }

    fn ensure_idle(&self) -> PlannerResult<()> {
        let progress = self.orchestrator.progress();
        if progress.is_generating_all {
            return Err(PlannerError::BatchInProgress);
        }
        if let Some((name, _)) = progress
            .channel_progress
            .iter()
            .find(|(_, e)| e.status == ChannelStatus::InProgress)
        {
            return Err(PlannerError::ChannelBusy(name.clone()));
        }
        Ok(())
    }

    /// Why campaign generation cannot take the asset gate.
    fn assets_busy(&self) -> PlannerError {
        match self.ensure_idle() {
            Err(err) => err,
            Ok(()) => PlannerError::Validation("asset generation is still finishing".to_string()),
        }
    }

    fn enter_assets(&self) -> PlannerResult<tokio::sync::RwLockReadGuard<'_, ()>> {
        self.asset_gate
            .try_read()
            .map_err(|_| PlannerError::CampaignInProgress)
    }

    fn active(&self) -> PlannerResult<ActiveCampaign> {
        self.active.lock().clone().ok_or(PlannerError::NoActiveCampaign)
    }

    fn reject(&self, account_id: Uuid, err: &PlannerError) {
        metrics::counter!("campaign.rejected").increment(1);
        warn!(account_id = %account_id, error = %err, "Campaign draft rejected");
        self.event_sink.emit(make_event_with_detail(
            EventType::CampaignRejected,
            Some(account_id),
            None,
            None,
            err.to_string(),
        ));
    }

    // ─── Campaign ───────────────────────────────────────────────────────────

    /// Generates and installs a new campaign, replacing the current one.
    /// Nothing is installed and no usage is recorded unless the draft
    /// passes validation. Asset calls made while this runs fail with
    /// `CampaignInProgress`.
    pub async fn generate_campaign(
        &self,
        account_id: Uuid,
        goal: &str,
        audience: &str,
    ) -> PlannerResult<CampaignRecord> {
        let goal = required("goal", goal)?;
        let audience = required("audience", audience)?;

        let _generating = self
            .campaign_lock
            .try_lock()
            .map_err(|_| PlannerError::CampaignInProgress)?;
        // Held until the new campaign is installed; asset calls are refused
        // meanwhile and none can be running.
        let _assets = self.asset_gate.try_write().map_err(|_| self.assets_busy())?;
        self.ensure_idle()?;
        self.entitlements.ensure_can_generate(account_id).await?;

        info!(account_id = %account_id, goal = %goal, "Generating campaign");
        let draft = match self
            .campaign_generator
            .generate_campaign(&goal, &audience)
            .await
            .and_then(|draft| draft.validate().map(|_| draft))
        {
            Ok(draft) => draft,
            Err(err) => {
                self.reject(account_id, &err);
                return Err(err);
            }
        };

        let record = self
            .entitlements
            .create_campaign_usage(
                account_id,
                NewCampaign {
                    goal,
                    audience,
                    draft: serde_json::to_value(&draft)?,
                },
            )
            .await?;

        let channels = draft.recommended_channels();
        self.orchestrator.reset()?;
        self.orchestrator.initialize(&channels)?;
        *self.active.lock() = Some(ActiveCampaign {
            record: record.clone(),
            draft,
            channels: channels.clone(),
        });

        metrics::counter!("campaign.generated").increment(1);
        info!(
            account_id = %account_id,
            campaign_id = %record.id,
            channels = channels.len(),
            "Campaign installed"
        );
        self.event_sink.emit(make_event(
            EventType::CampaignGenerated,
            Some(account_id),
            Some(record.id),
            None,
        ));
        Ok(record)
    }

    // ─── Assets ─────────────────────────────────────────────────────────────

    /// Generates assets for one recommended channel of the active campaign.
    pub async fn generate_channel(&self, channel_name: &str) -> PlannerResult<ChannelOutcome> {
        let _gate = self.enter_assets()?;
        let active = self.active()?;
        let channel = active
            .channels
            .iter()
            .find(|c| c.channel_name == channel_name)
            .ok_or_else(|| PlannerError::UnknownChannel(channel_name.to_string()))?;

        let outcome = self
            .orchestrator
            .generate_for_channel(&active.context(), &channel.channel_name, &channel.category)
            .await?;
        if outcome == ChannelOutcome::Completed {
            self.persist_assets(active.record.id).await?;
        }
        Ok(outcome)
    }

    /// Generates every recommended channel not yet completed, one at a time.
    pub async fn generate_all(&self) -> PlannerResult<BatchSummary> {
        let _gate = self.enter_assets()?;
        let active = self.active()?;
        let summary = self
            .orchestrator
            .generate_for_all(&active.context(), &active.channels)
            .await?;
        if !summary.succeeded.is_empty() {
            self.persist_assets(active.record.id).await?;
        }
        Ok(summary)
    }

    /// Discards generated assets and returns every channel to pending.
    pub async fn reset(&self) -> PlannerResult<()> {
        let _gate = self.enter_assets()?;
        let active = self.active()?;
        self.orchestrator.reset()?;
        self.persist_assets(active.record.id).await
    }

    /// Writes the orchestrator's asset map onto the stored campaign.
    async fn persist_assets(&self, campaign_id: Uuid) -> PlannerResult<()> {
        let mut record = match self.active.lock().as_ref() {
            Some(active) if active.record.id == campaign_id => active.record.clone(),
            _ => return Ok(()),
        };
        record.channel_assets = self.orchestrator.channel_assets();
        record.updated_at = Utc::now();
        self.store.update_campaign(&record).await?;

        if let Some(active) = self.active.lock().as_mut() {
            if active.record.id == campaign_id {
                active.record = record;
            }
        }
        Ok(())
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub async fn usage_info(&self, account_id: Uuid) -> PlannerResult<UsageInfo> {
        self.entitlements.usage_info(account_id).await
    }

    pub fn progress(&self) -> AssetGenerationProgress {
        self.orchestrator.progress()
    }

    pub fn channel_assets(&self) -> HashMap<String, ChannelAssetGenerationResult> {
        self.orchestrator.channel_assets()
    }

    pub fn journey_outline(&self) -> PlannerResult<String> {
        Ok(render_outline(&self.active()?.draft.journey))
    }

    /// The active campaign as last persisted.
    pub fn campaign(&self) -> Option<CampaignRecord> {
        self.active.lock().as_ref().map(|a| a.record.clone())
    }

    pub fn draft(&self) -> Option<CampaignDraft> {
        self.active.lock().as_ref().map(|a| a.draft.clone())
    }

    pub fn recommended_channels(&self) -> Vec<Channel> {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.channels.clone())
            .unwrap_or_default()
    }
}
