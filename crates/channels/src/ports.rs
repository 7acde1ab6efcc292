//! Port for the external creative generator.
//!
//! The generator exposes no progress channel: a call either returns the
//! finished result for the channel or fails.

use async_trait::async_trait;
use planner_core::types::ChannelAssetGenerationResult;
use planner_core::PlannerResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the generator needs to know about the campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignContext {
    pub campaign_id: Uuid,
    pub goal: String,
    pub audience: String,
    pub strategy_summary: Option<String>,
}

#[async_trait]
pub trait AssetGenerator: Send + Sync {
    /// Generate creatives for one channel. Failures surface as
    /// `PlannerError::Generation`.
    async fn generate_channel_assets(
        &self,
        context: &CampaignContext,
        channel_name: &str,
        category: &str,
    ) -> PlannerResult<ChannelAssetGenerationResult>;
}
