//! Port for whole-campaign generation.

use async_trait::async_trait;
use planner_core::PlannerResult;

use crate::draft::CampaignDraft;

#[async_trait]
pub trait CampaignGenerator: Send + Sync {
    /// Produce a journey, channel mix and plan for `goal` and `audience`.
    /// The returned draft is validated by the caller before use.
    async fn generate_campaign(&self, goal: &str, audience: &str) -> PlannerResult<CampaignDraft>;
}
