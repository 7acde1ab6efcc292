use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Channels ───────────────────────────────────────────────────────────────

/// Relative spend bracket for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    Low,
    Medium,
    High,
}

/// Where in the funnel a channel does most of its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    Awareness,
    Consideration,
    Conversion,
    Retention,
    Advocacy,
}

/// A marketing surface proposed by campaign generation. Immutable once the
/// campaign is installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_name: String,
    pub category: String,
    pub is_recommended: bool,
    pub reach_estimate: Option<String>,
    pub cost_tier: CostTier,
    pub funnel_stage: FunnelStage,
}

impl Channel {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            channel_name: name.into(),
            category: category.into(),
            is_recommended: true,
            reach_estimate: None,
            cost_tier: CostTier::Medium,
            funnel_stage: FunnelStage::Awareness,
        }
    }
}

// ─── Generated assets ───────────────────────────────────────────────────────

/// An alternate version of a creative for A/B testing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetVariant {
    pub label: String,
    pub headline: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetContent {
    pub headline: Option<String>,
    pub body: String,
    pub call_to_action: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub variants: Vec<AssetVariant>,
}

/// A single creative produced for a channel (post, email, ad, script...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAsset {
    pub id: String,
    pub asset_type: String,
    pub content: AssetContent,
}

/// Output of one successful generation call for a channel. Replaced
/// wholesale on regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAssetGenerationResult {
    pub channel: String,
    pub category: String,
    pub generation_timestamp: DateTime<Utc>,
    pub assets: Vec<ChannelAsset>,
    #[serde(default)]
    pub implementation_guidance: Vec<String>,
}

// ─── Generation progress ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelProgressEntry {
    pub status: ChannelStatus,
    pub percentage: u8,
    pub error: Option<String>,
}

impl ChannelProgressEntry {
    pub fn pending() -> Self {
        Self {
            status: ChannelStatus::Pending,
            percentage: 0,
            error: None,
        }
    }
}

/// Aggregate progress for the campaign's recommended channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGenerationProgress {
    pub total_channels: usize,
    pub completed_channels: usize,
    pub is_generating_all: bool,
    pub channel_progress: HashMap<String, ChannelProgressEntry>,
}

impl AssetGenerationProgress {
    pub fn entry(&self, channel: &str) -> Option<&ChannelProgressEntry> {
        self.channel_progress.get(channel)
    }

    pub fn status_of(&self, channel: &str) -> Option<ChannelStatus> {
        self.entry(channel).map(|e| e.status)
    }

    /// True while the batch flag is set or any channel is mid-generation.
    pub fn is_busy(&self) -> bool {
        self.is_generating_all
            || self
                .channel_progress
                .values()
                .any(|e| e.status == ChannelStatus::InProgress)
    }
}

// ─── Accounts & entitlement ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Trial,
    Active,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub campaign_quota: u32,
    pub campaigns_used_current_period: u32,
    pub quota_reset_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub account_status: AccountStatus,
    pub trial_campaigns_used: u32,
    pub trial_end_date: DateTime<Utc>,
    pub active_subscription: Option<Subscription>,
    pub updated_at: DateTime<Utc>,
}

/// Why a generation attempt is (or is not) allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageReason {
    Trial,
    Subscription,
    QuotaExceeded,
    TrialExpired,
    SubscriptionRequired,
}

impl UsageReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Subscription => "subscription",
            Self::QuotaExceeded => "quota_exceeded",
            Self::TrialExpired => "trial_expired",
            Self::SubscriptionRequired => "subscription_required",
        }
    }

    /// Actionable text for a denial; allowed reasons get a neutral line.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Trial => "Your free trial campaign is available.",
            Self::Subscription => "Your subscription allows another campaign.",
            Self::QuotaExceeded => {
                "You have used all campaigns for this period. Upgrade your plan or wait for the quota to reset."
            }
            Self::TrialExpired => "Your free trial has ended. Subscribe to keep generating campaigns.",
            Self::SubscriptionRequired => "An active subscription is required. Renew or subscribe to continue.",
        }
    }
}

impl std::fmt::Display for UsageReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub can_generate: bool,
    pub reason: UsageReason,
    pub remaining: u32,
    pub limit: u32,
    pub trial_days_remaining: Option<i64>,
    pub days_until_reset: Option<i64>,
}

// ─── Persisted campaigns ────────────────────────────────────────────────────

/// A campaign as stored by the persistence collaborator. The draft is kept
/// as an opaque JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub goal: String,
    pub audience: String,
    pub is_trial_campaign: bool,
    pub subscription_id: Option<Uuid>,
    pub draft: serde_json::Value,
    #[serde(default)]
    pub channel_assets: HashMap<String, ChannelAssetGenerationResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a new campaign against an account's usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub goal: String,
    pub audience: String,
    pub draft: serde_json::Value,
}

// ─── Events ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Campaign events
    CampaignGenerated,
    CampaignRejected,
    // Entitlement events
    EntitlementDenied,
    UsageRecorded,
    TrialStarted,
    TrialExpired,
    SubscriptionActivated,
    SubscriptionExpired,
    QuotaPeriodRolled,
    // Asset generation events
    ChannelGenerationStarted,
    ChannelGenerationCompleted,
    ChannelGenerationFailed,
    BatchStarted,
    BatchFinished,
    AssetsReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub account_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub channel: Option<String>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}
