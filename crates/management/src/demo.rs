//! Scripted generator used by the binary and by tests. It returns a fixed
//! journey and channel mix, and templated creatives for any channel.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use planner_channels::{AssetGenerator, CampaignContext};
use planner_core::types::{
    AssetContent, AssetVariant, Channel, ChannelAsset, ChannelAssetGenerationResult, CostTier,
    FunnelStage,
};
use planner_core::{PlannerError, PlannerResult};
use planner_journey::types::{ActionDetails, DecisionDetails, SplitDetails, SplitVariant, WaitDetails};
use planner_journey::{JourneyNode, NodeDetails};
use tracing::debug;

use crate::draft::{AudienceAttribute, CampaignDraft, ChannelSelection, Governance, Strategy};
use crate::ports::CampaignGenerator;

#[derive(Debug, Clone, Default)]
pub struct DemoGenerator {
    latency: Duration,
    failing_channels: HashSet<String>,
}

impl DemoGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated time each call takes.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes asset generation for `channel` fail.
    pub fn failing_on(mut self, channel: impl Into<String>) -> Self {
        self.failing_channels.insert(channel.into());
        self
    }

    async fn simulate(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn channel(name: &str, category: &str, tier: CostTier, stage: FunnelStage, reach: &str) -> Channel {
    Channel {
        channel_name: name.to_string(),
        category: category.to_string(),
        is_recommended: true,
        reach_estimate: Some(reach.to_string()),
        cost_tier: tier,
        funnel_stage: stage,
    }
}

fn action(channel: &str, optimization: &str) -> NodeDetails {
    NodeDetails::Action(ActionDetails {
        channel: channel.to_string(),
        personalization: vec!["first_name".to_string()],
        optimization: Some(optimization.to_string()),
    })
}

/// Welcome series with an engagement check and a reminder A/B test. Both
/// decision branches converge on the final step.
pub fn demo_journey() -> Vec<JourneyNode> {
    vec![
        JourneyNode::new(1, "Joins the audience", NodeDetails::Trigger).branch("", 2),
        JourneyNode::new(2, "Welcome email", action("Email", "send-time"))
            .with_description("Introduce the offer and set expectations")
            .branch("", 3),
        JourneyNode::new(3, "Wait two days", NodeDetails::Wait(WaitDetails { duration_secs: 172_800 }))
            .branch("", 4),
        JourneyNode::new(
            4,
            "Opened welcome email?",
            NodeDetails::Decision(DecisionDetails {
                condition: "email_opened".to_string(),
                prediction_model: Some("engagement-propensity".to_string()),
            }),
        )
        .branch("Yes", 5)
        .branch("No", 6),
        JourneyNode::new(5, "Instagram retargeting", action("Instagram", "lookalike"))
            .branch("", 7),
        JourneyNode::new(
            6,
            "Reminder test",
            NodeDetails::Split(SplitDetails {
                test_name: "reminder-copy".to_string(),
                variants: vec![
                    SplitVariant {
                        name: "urgency".to_string(),
                        weight: 0.5,
                    },
                    SplitVariant {
                        name: "social-proof".to_string(),
                        weight: 0.5,
                    },
                ],
                success_metric: Some("conversion_rate".to_string()),
            }),
        )
        .branch("", 8),
        JourneyNode::new(7, "Journey complete", NodeDetails::End),
        JourneyNode::new(8, "SMS reminder", action("SMS", "frequency-cap")).branch("", 7),
    ]
}

pub fn demo_channels() -> Vec<Channel> {
    let mut tiktok = channel("TikTok", "Social", CostTier::Medium, FunnelStage::Awareness, "1.2M");
    tiktok.is_recommended = false;
    vec![
        channel("Instagram", "Social", CostTier::Medium, FunnelStage::Awareness, "850K"),
        channel("Email", "Owned", CostTier::Low, FunnelStage::Retention, "40K"),
        tiktok,
        channel("SMS", "Owned", CostTier::Low, FunnelStage::Conversion, "12K"),
    ]
}

#[async_trait]
impl CampaignGenerator for DemoGenerator {
    async fn generate_campaign(&self, goal: &str, audience: &str) -> PlannerResult<CampaignDraft> {
        self.simulate().await;
        debug!(goal = %goal, "Demo campaign generated");
        Ok(CampaignDraft {
            journey: demo_journey(),
            audience_attributes: vec![
                AudienceAttribute {
                    attribute: "segment".to_string(),
                    value: audience.to_string(),
                },
                AudienceAttribute {
                    attribute: "lifecycle".to_string(),
                    value: "new".to_string(),
                },
            ],
            strategy: Some(Strategy {
                summary: format!("Welcome series to {goal}"),
                key_messages: vec![
                    "Get started in minutes".to_string(),
                    "Join others like you".to_string(),
                ],
            }),
            governance: Some(Governance {
                approval_required: true,
                compliance_notes: vec!["SMS requires prior opt-in".to_string()],
            }),
            channel_selection: Some(ChannelSelection {
                rationale: "Owned channels for retention, social for reach".to_string(),
                channels: demo_channels(),
            }),
        })
    }
}

#[async_trait]
impl AssetGenerator for DemoGenerator {
    async fn generate_channel_assets(
        &self,
        context: &CampaignContext,
        channel_name: &str,
        category: &str,
    ) -> PlannerResult<ChannelAssetGenerationResult> {
        self.simulate().await;
        if self.failing_channels.contains(channel_name) {
            return Err(PlannerError::Generation(format!(
                "generator unavailable for {channel_name}"
            )));
        }

        let slug = channel_name.to_lowercase().replace(' ', "-");
        let content = AssetContent {
            headline: Some(format!("{} for {}", context.goal, context.audience)),
            body: context
                .strategy_summary
                .clone()
                .unwrap_or_else(|| context.goal.clone()),
            call_to_action: Some("Get started".to_string()),
            hashtags: if category == "Social" {
                vec![format!("#{}", slug.replace('-', ""))]
            } else {
                Vec::new()
            },
            variants: vec![
                AssetVariant {
                    label: "A".to_string(),
                    headline: Some("Start today".to_string()),
                    body: "Everything you need, ready now.".to_string(),
                },
                AssetVariant {
                    label: "B".to_string(),
                    headline: Some("Don't miss out".to_string()),
                    body: "Join before the offer ends.".to_string(),
                },
            ],
        };

        Ok(ChannelAssetGenerationResult {
            channel: channel_name.to_string(),
            category: category.to_string(),
            generation_timestamp: Utc::now(),
            assets: vec![ChannelAsset {
                id: format!("{slug}-primary"),
                asset_type: "primary".to_string(),
                content,
            }],
            implementation_guidance: vec![format!(
                "Schedule {channel_name} sends to follow the journey timing"
            )],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner_journey::diagnostics::{action_channels, dangling_branches, unreachable_nodes};
    use planner_journey::traverse;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_demo_draft_is_valid() {
        let draft = DemoGenerator::new()
            .generate_campaign("grow signups", "students")
            .await
            .unwrap();
        draft.validate().unwrap();
        assert_eq!(draft.recommended_channels().len(), 3);
        assert!(dangling_branches(&draft.journey).is_empty());
        assert!(unreachable_nodes(&draft.journey, 1).is_empty());
        assert_eq!(
            action_channels(&draft.journey, 1),
            vec!["Email", "Instagram", "SMS"]
        );
        // Node 7 is reached from both decision branches but visited once.
        assert_eq!(traverse(&draft.journey, 1).filter(|v| v.id() == 7).count(), 1);
    }

    #[tokio::test]
    async fn test_demo_assets() {
        let generator = DemoGenerator::new().failing_on("SMS");
        let context = CampaignContext {
            campaign_id: Uuid::new_v4(),
            goal: "grow signups".into(),
            audience: "students".into(),
            strategy_summary: None,
        };

        let result = generator
            .generate_channel_assets(&context, "Instagram", "Social")
            .await
            .unwrap();
        assert_eq!(result.channel, "Instagram");
        assert_eq!(result.assets[0].content.variants.len(), 2);
        assert_eq!(result.assets[0].content.hashtags, vec!["#instagram"]);

        let err = generator
            .generate_channel_assets(&context, "SMS", "Owned")
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Generation(_)));
    }
}
