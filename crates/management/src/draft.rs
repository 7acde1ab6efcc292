//! Campaign draft: what the campaign generator hands back, and the
//! structural checks it must pass before it becomes the active campaign.

use planner_core::types::Channel;
use planner_core::{PlannerError, PlannerResult};
use planner_journey::diagnostics::duplicate_ids;
use planner_journey::JourneyNode;
use serde::{Deserialize, Serialize};

// ─── Draft sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceAttribute {
    pub attribute: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub summary: String,
    #[serde(default)]
    pub key_messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Governance {
    pub approval_required: bool,
    #[serde(default)]
    pub compliance_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSelection {
    pub rationale: String,
    pub channels: Vec<Channel>,
}

// ─── Draft ─────────────────────────────────────────────────────────────────

/// A generated campaign plan. Sections are optional on the wire so a
/// partial response deserializes and is then rejected by [`validate`].
///
/// [`validate`]: CampaignDraft::validate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignDraft {
    #[serde(default)]
    pub journey: Vec<JourneyNode>,
    #[serde(default)]
    pub audience_attributes: Vec<AudienceAttribute>,
    pub strategy: Option<Strategy>,
    pub governance: Option<Governance>,
    pub channel_selection: Option<ChannelSelection>,
}

fn invalid(msg: impl Into<String>) -> PlannerError {
    PlannerError::Generation(msg.into())
}

impl CampaignDraft {
    /// Rejects drafts that cannot be installed. Branches to missing node
    /// ids are tolerated here; they render as leaves.
    pub fn validate(&self) -> PlannerResult<()> {
        if self.journey.is_empty() {
            return Err(invalid("campaign draft has no journey nodes"));
        }
        if self.journey.iter().any(|n| n.id == 0) {
            return Err(invalid("journey node ids must be positive"));
        }
        let duplicates = duplicate_ids(&self.journey);
        if !duplicates.is_empty() {
            return Err(invalid(format!("duplicate journey node ids: {duplicates:?}")));
        }
        if self.audience_attributes.is_empty() {
            return Err(invalid("campaign draft has no audience attributes"));
        }
        if self.strategy.is_none() {
            return Err(invalid("campaign draft is missing the strategy section"));
        }
        if self.governance.is_none() {
            return Err(invalid("campaign draft is missing the governance section"));
        }
        if self.channel_selection.is_none() {
            return Err(invalid("campaign draft is missing the channel selection section"));
        }
        Ok(())
    }

    /// Channels the journey marked recommended, in listed order.
    pub fn recommended_channels(&self) -> Vec<Channel> {
        self.channel_selection
            .as_ref()
            .map(|s| s.channels.iter().filter(|c| c.is_recommended).cloned().collect())
            .unwrap_or_default()
    }

    pub fn strategy_summary(&self) -> Option<String> {
        self.strategy.as_ref().map(|s| s.summary.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner_journey::NodeDetails;

    fn valid() -> CampaignDraft {
        let mut optional = Channel::new("Pinterest", "Social");
        optional.is_recommended = false;
        CampaignDraft {
            journey: vec![
                JourneyNode::new(1, "Visits pricing page", NodeDetails::Trigger).branch("", 2),
                JourneyNode::new(2, "Done", NodeDetails::End),
            ],
            audience_attributes: vec![AudienceAttribute {
                attribute: "role".into(),
                value: "founder".into(),
            }],
            strategy: Some(Strategy {
                summary: "Lead with the free tier".into(),
                key_messages: vec![],
            }),
            governance: Some(Governance {
                approval_required: false,
                compliance_notes: vec![],
            }),
            channel_selection: Some(ChannelSelection {
                rationale: "Where founders hang out".into(),
                channels: vec![
                    Channel::new("LinkedIn", "Social"),
                    optional,
                    Channel::new("Email", "Owned"),
                ],
            }),
        }
    }

    #[test]
    fn test_valid_draft() {
        let draft = valid();
        assert!(draft.validate().is_ok());
        let names: Vec<String> = draft
            .recommended_channels()
            .into_iter()
            .map(|c| c.channel_name)
            .collect();
        assert_eq!(names, vec!["LinkedIn", "Email"]);
        assert_eq!(draft.strategy_summary().as_deref(), Some("Lead with the free tier"));
    }

    #[test]
    fn test_structural_rejections() {
        type Mutation = fn(&mut CampaignDraft);
        let cases = [
            (|d: &mut CampaignDraft| d.journey.clear()) as Mutation,
            |d: &mut CampaignDraft| d.journey[0].id = 0,
            |d: &mut CampaignDraft| d.journey[1].id = 1,
            |d: &mut CampaignDraft| d.audience_attributes.clear(),
            |d: &mut CampaignDraft| d.strategy = None,
            |d: &mut CampaignDraft| d.governance = None,
            |d: &mut CampaignDraft| d.channel_selection = None,
        ];
        let expected = [
            "no journey nodes",
            "positive",
            "duplicate",
            "audience attributes",
            "strategy",
            "governance",
            "channel selection",
        ];
        for (mutate, expected) in cases.into_iter().zip(expected) {
            let mut draft = valid();
            mutate(&mut draft);
            match draft.validate() {
                Err(PlannerError::Generation(msg)) => assert!(msg.contains(expected), "{msg}"),
                other => panic!("expected generation error for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_dangling_branch_is_tolerated() {
        let mut draft = valid();
        draft.journey[1] = draft.journey[1].clone().branch("later", 42);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_partial_json_deserializes_then_fails() {
        let draft: CampaignDraft = serde_json::from_value(serde_json::json!({
            "journey": [{"id": 1, "title": "Start", "details": {"type": "trigger"}, "children": []}],
            "strategy": null,
            "governance": null,
            "channel_selection": null
        }))
        .unwrap();
        assert!(matches!(draft.validate(), Err(PlannerError::Generation(_))));
    }
}
