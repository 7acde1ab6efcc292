use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CAMPAIGN_PLANNER__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub entitlement: EntitlementConfig,
}

// ─── Orchestrator Config ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_inter_request_delay_ms")]
    pub inter_request_delay_ms: u64,
    #[serde(default = "default_max_estimated_percent")]
    pub max_estimated_percent: u8,
    #[serde(default = "default_estimated_secs")]
    pub default_estimated_secs: u64,
    /// Per-channel overrides of the built-in duration table, keyed by
    /// channel name (case-insensitive).
    #[serde(default)]
    pub channel_estimates_secs: HashMap<String, u64>,
}

fn default_tick_interval_ms() -> u64 { 1000 }
fn default_inter_request_delay_ms() -> u64 { 1000 }
fn default_max_estimated_percent() -> u8 { 95 }
fn default_estimated_secs() -> u64 { 30 }

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            inter_request_delay_ms: default_inter_request_delay_ms(),
            max_estimated_percent: default_max_estimated_percent(),
            default_estimated_secs: default_estimated_secs(),
            channel_estimates_secs: HashMap::new(),
        }
    }
}

// ─── Entitlement Config ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementConfig {
    #[serde(default = "default_trial_campaign_limit")]
    pub trial_campaign_limit: u32,
    #[serde(default = "default_trial_length_days")]
    pub trial_length_days: i64,
    #[serde(default = "default_quota_period_days")]
    pub quota_period_days: i64,
    #[serde(default = "default_campaign_quota")]
    pub default_campaign_quota: u32,
}

fn default_trial_campaign_limit() -> u32 { 1 }
fn default_trial_length_days() -> i64 { 7 }
fn default_quota_period_days() -> i64 { 30 }
fn default_campaign_quota() -> u32 { 10 }

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            trial_campaign_limit: default_trial_campaign_limit(),
            trial_length_days: default_trial_length_days(),
            quota_period_days: default_quota_period_days(),
            default_campaign_quota: default_campaign_quota(),
        }
    }
}

fn default_node_id() -> String {
    "planner-01".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            orchestrator: OrchestratorConfig::default(),
            entitlement: EntitlementConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CAMPAIGN_PLANNER")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        debug!(node_id = %config.node_id, "Configuration loaded from environment");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.orchestrator.tick_interval_ms, 1000);
        assert_eq!(config.orchestrator.inter_request_delay_ms, 1000);
        assert_eq!(config.orchestrator.max_estimated_percent, 95);
        assert_eq!(config.entitlement.trial_campaign_limit, 1);
        assert_eq!(config.entitlement.quota_period_days, 30);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"orchestrator": {"tick_interval_ms": 250, "channel_estimates_secs": {"email": 12}}}"#,
        )
        .unwrap();
        assert_eq!(config.node_id, "planner-01");
        assert_eq!(config.orchestrator.tick_interval_ms, 250);
        assert_eq!(config.orchestrator.inter_request_delay_ms, 1000);
        assert_eq!(config.orchestrator.channel_estimates_secs.get("email"), Some(&12));
        assert_eq!(config.entitlement.default_campaign_quota, 10);
    }
}
