use planner_core::types::ChannelStatus;
use serde::{Deserialize, Serialize};

/// Describes a single valid status transition for a channel entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: ChannelStatus,
    pub to: ChannelStatus,
    pub trigger: String,
}

/// Guards channel progress entries by enforcing the finite set of valid
/// status transitions.
#[derive(Debug, Clone)]
pub struct ChannelStateMachine {
    pub transitions: Vec<StatusTransition>,
}

impl ChannelStateMachine {
    /// Creates a state machine with all valid transitions pre-configured.
    pub fn new() -> Self {
        let transitions = vec![
            // Pending ->
            StatusTransition {
                from: ChannelStatus::Pending,
                to: ChannelStatus::InProgress,
                trigger: "generation_started".to_string(),
            },
            // InProgress ->
            StatusTransition {
                from: ChannelStatus::InProgress,
                to: ChannelStatus::Completed,
                trigger: "generation_succeeded".to_string(),
            },
            StatusTransition {
                from: ChannelStatus::InProgress,
                to: ChannelStatus::Error,
                trigger: "generation_failed".to_string(),
            },
            // Settled -> (manual retry)
            StatusTransition {
                from: ChannelStatus::Completed,
                to: ChannelStatus::InProgress,
                trigger: "regenerate".to_string(),
            },
            StatusTransition {
                from: ChannelStatus::Error,
                to: ChannelStatus::InProgress,
                trigger: "retry".to_string(),
            },
            // Settled -> (reset)
            StatusTransition {
                from: ChannelStatus::Completed,
                to: ChannelStatus::Pending,
                trigger: "reset".to_string(),
            },
            StatusTransition {
                from: ChannelStatus::Error,
                to: ChannelStatus::Pending,
                trigger: "reset".to_string(),
            },
            StatusTransition {
                from: ChannelStatus::Pending,
                to: ChannelStatus::Pending,
                trigger: "reset".to_string(),
            },
        ];

        Self { transitions }
    }

    /// Returns `true` if the given transition is allowed.
    pub fn can_transition(&self, from: ChannelStatus, to: ChannelStatus) -> bool {
        self.trigger_for(from, to).is_some()
    }

    /// Name of the trigger for an allowed transition.
    pub fn trigger_for(&self, from: ChannelStatus, to: ChannelStatus) -> Option<&str> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.to == to)
            .map(|t| t.trigger.as_str())
    }
}

impl Default for ChannelStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
