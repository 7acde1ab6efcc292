//! Campaign Planner: generates a campaign plan for a goal and audience,
//! then generates channel creatives for it.
//!
//! Runs against the in-memory store and the demo generator.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use planner_billing::{EntitlementEngine, InMemoryStore};
use planner_channels::ChannelOutcome;
use planner_core::config::AppConfig;
use planner_core::PlannerError;
use planner_management::{DemoGenerator, SessionController};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "campaign-planner")]
#[command(about = "Plan a multi-channel marketing campaign and generate its creatives")]
#[command(version)]
struct Cli {
    /// What the campaign should achieve
    #[arg(long)]
    goal: String,

    /// Who the campaign is for
    #[arg(long)]
    audience: String,

    /// Generate creatives for every recommended channel
    #[arg(long, default_value_t = false)]
    generate_all: bool,

    /// Generate creatives for one channel (repeatable)
    #[arg(long = "channel")]
    channels: Vec<String>,

    /// Activate a subscription with this campaign quota instead of a trial
    #[arg(long)]
    subscribe: Option<u32>,

    /// Node identifier (overrides config)
    #[arg(long, env = "CAMPAIGN_PLANNER__NODE_ID")]
    node_id: Option<String>,

    /// Pause between batch requests in milliseconds (overrides config)
    #[arg(long, env = "CAMPAIGN_PLANNER__ORCHESTRATOR__INTER_REQUEST_DELAY_MS")]
    inter_request_delay_ms: Option<u64>,

    /// Simulated generator latency in milliseconds
    #[arg(long, default_value_t = 0)]
    demo_latency_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "campaign_planner=info,planner_management=info,planner_channels=info,planner_billing=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(delay) = cli.inter_request_delay_ms {
        config.orchestrator.inter_request_delay_ms = delay;
    }

    info!(
        node_id = %config.node_id,
        trial_limit = config.entitlement.trial_campaign_limit,
        inter_request_delay_ms = config.orchestrator.inter_request_delay_ms,
        "Configuration loaded"
    );

    let store = Arc::new(InMemoryStore::new());
    let entitlements = Arc::new(EntitlementEngine::new(store.clone(), config.entitlement.clone()));
    let generator =
        Arc::new(DemoGenerator::new().with_latency(Duration::from_millis(cli.demo_latency_ms)));
    let session = SessionController::new(
        generator.clone(),
        generator,
        entitlements.clone(),
        store,
        &config.orchestrator,
    );

    let account_id = Uuid::new_v4();
    entitlements.start_trial(account_id).await?;
    if let Some(quota) = cli.subscribe {
        entitlements.activate_subscription(account_id, quota).await?;
    }

    let record = match session
        .generate_campaign(account_id, &cli.goal, &cli.audience)
        .await
    {
        Ok(record) => record,
        Err(PlannerError::EntitlementDenied { reason }) => {
            anyhow::bail!("{}", reason.user_message());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", session.journey_outline()?);

    for channel in &cli.channels {
        match session.generate_channel(channel).await? {
            ChannelOutcome::Completed => info!(channel = %channel, "Channel ready"),
            ChannelOutcome::Failed(message) => {
                warn!(channel = %channel, error = %message, "Channel failed")
            }
        }
    }
    let summary = if cli.generate_all {
        Some(session.generate_all().await?)
    } else {
        None
    };

    let report = serde_json::json!({
        "campaign_id": record.id,
        "is_trial_campaign": record.is_trial_campaign,
        "progress": session.progress(),
        "batch": summary,
        "assets": session.channel_assets(),
        "usage": session.usage_info(account_id).await?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
