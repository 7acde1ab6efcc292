use serde::{Deserialize, Serialize};

/// Node identifier, unique within one campaign.
pub type NodeId = u32;

/// The kind of step a journey node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Trigger,
    Action,
    Decision,
    Wait,
    Split,
    End,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Action => "action",
            Self::Decision => "decision",
            Self::Wait => "wait",
            Self::Split => "split",
            Self::End => "end",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step in a generated customer journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyNode {
    pub id: NodeId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub details: NodeDetails,
    #[serde(default)]
    pub children: Vec<Branch>,
}

impl JourneyNode {
    pub fn new(id: NodeId, title: impl Into<String>, details: NodeDetails) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            details,
            children: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a branch to `target`.
    pub fn branch(mut self, label: impl Into<String>, target: NodeId) -> Self {
        self.children.push(Branch {
            label: label.into(),
            node_id: target,
        });
        self
    }

    pub fn node_type(&self) -> NodeType {
        self.details.node_type()
    }
}

/// A labelled edge to another node. The target may not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub label: String,
    pub node_id: NodeId,
}

/// Type-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum NodeDetails {
    Trigger,
    Action(ActionDetails),
    Decision(DecisionDetails),
    Wait(WaitDetails),
    Split(SplitDetails),
    End,
}

impl NodeDetails {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Trigger => NodeType::Trigger,
            Self::Action(_) => NodeType::Action,
            Self::Decision(_) => NodeType::Decision,
            Self::Wait(_) => NodeType::Wait,
            Self::Split(_) => NodeType::Split,
            Self::End => NodeType::End,
        }
    }
}

/// A message sent on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDetails {
    pub channel: String,
    #[serde(default)]
    pub personalization: Vec<String>,
    pub optimization: Option<String>,
}

/// A branch point evaluated against the customer's behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDetails {
    pub condition: String,
    pub prediction_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitDetails {
    pub duration_secs: u64,
}

impl WaitDetails {
    /// Compact duration label such as `2d`, `3h`, `45m`.
    pub fn label(&self) -> String {
        let secs = self.duration_secs;
        if secs >= 86_400 && secs % 86_400 == 0 {
            format!("{}d", secs / 86_400)
        } else if secs >= 3_600 && secs % 3_600 == 0 {
            format!("{}h", secs / 3_600)
        } else if secs >= 60 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{secs}s")
        }
    }
}

/// An A/B test descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDetails {
    pub test_name: String,
    pub variants: Vec<SplitVariant>,
    pub success_metric: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitVariant {
    pub name: String,
    pub weight: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_tagged_by_type() {
        let node = JourneyNode::new(
            3,
            "Send welcome email",
            NodeDetails::Action(ActionDetails {
                channel: "Email".into(),
                personalization: vec!["first_name".into()],
                optimization: Some("send-time".into()),
            }),
        )
        .branch("", 4);

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["details"]["type"], "action");
        assert_eq!(json["details"]["channel"], "Email");
        assert_eq!(json["children"][0]["node_id"], 4);

        let back: JourneyNode = serde_json::from_value(json).unwrap();
        assert_eq!(back.node_type(), NodeType::Action);
    }

    #[test]
    fn test_unit_variants_parse_without_payload() {
        let node: JourneyNode = serde_json::from_str(
            r#"{"id": 1, "title": "Signup", "details": {"type": "trigger"}}"#,
        )
        .unwrap();
        assert_eq!(node.node_type(), NodeType::Trigger);
        assert!(node.children.is_empty());
        assert!(node.description.is_empty());
    }

    #[test]
    fn test_wait_label() {
        assert_eq!(WaitDetails { duration_secs: 172_800 }.label(), "2d");
        assert_eq!(WaitDetails { duration_secs: 10_800 }.label(), "3h");
        assert_eq!(WaitDetails { duration_secs: 2_700 }.label(), "45m");
        assert_eq!(WaitDetails { duration_secs: 90 }.label(), "90s");
    }
}
