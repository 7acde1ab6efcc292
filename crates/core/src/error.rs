use thiserror::Error;

use crate::types::{ChannelStatus, UsageReason};

pub type PlannerResult<T> = Result<T, PlannerError>;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Entitlement denied ({reason}): {}", .reason.user_message())]
    EntitlementDenied { reason: UsageReason },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Channel {0} is already generating")]
    ChannelBusy(String),

    #[error("A batch generation is in progress")]
    BatchInProgress,

    #[error("Invalid transition for channel {channel}: {from} -> {to}")]
    InvalidTransition {
        channel: String,
        from: ChannelStatus,
        to: ChannelStatus,
    },

    #[error("No campaign has been generated in this session")]
    NoActiveCampaign,

    #[error("A campaign is already being generated")]
    CampaignInProgress,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PlannerError {
    pub fn denied(reason: UsageReason) -> Self {
        Self::EntitlementDenied { reason }
    }

    /// The denial reason, when this error is an entitlement refusal.
    pub fn denial_reason(&self) -> Option<UsageReason> {
        match self {
            Self::EntitlementDenied { reason } => Some(*reason),
            _ => None,
        }
    }
}
