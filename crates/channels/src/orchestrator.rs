//! Asset generation orchestrator: runs the external generator for one
//! channel or for every recommended channel in sequence, keeping the
//! progress snapshot and the per-channel asset map in step.
//!
//! Channels are never generated concurrently: the generator is rate
//! limited, so a batch awaits each channel and pauses between requests,
//! and single-channel requests are refused while a batch is running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use planner_core::config::OrchestratorConfig;
use planner_core::event_bus::{make_event, make_event_with_detail, noop_sink, EventSink};
use planner_core::types::{
    AssetGenerationProgress, Channel, ChannelAssetGenerationResult, ChannelStatus, EventType,
};
use planner_core::{PlannerError, PlannerResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::estimator::{ProgressEstimator, ProgressTicker};
use crate::ports::{AssetGenerator, CampaignContext};
use crate::progress::{self, ProgressEvent};

/// How a single channel attempt settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "message")]
pub enum ChannelOutcome {
    Completed,
    Failed(String),
}

/// What a batch run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub attempted: Vec<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Default)]
struct OrchestratorState {
    progress: AssetGenerationProgress,
    channel_assets: HashMap<String, ChannelAssetGenerationResult>,
    /// Attempt counter per channel; a ticker only writes to its own attempt.
    attempts: HashMap<String, u64>,
}

impl OrchestratorState {
    fn apply(&mut self, event: ProgressEvent) -> PlannerResult<()> {
        self.progress = progress::apply(&self.progress, event)?;
        Ok(())
    }

    fn is_current(&self, channel: &str, attempt: u64) -> bool {
        self.attempts.get(channel) == Some(&attempt)
    }

    /// Marks `channel` in progress and opens a new attempt. Outside a batch
    /// this is refused while one is running; the check and the start happen
    /// under one lock so a batch cannot begin in between.
    fn begin_attempt(
        &mut self,
        channel: &str,
        from_batch: bool,
    ) -> PlannerResult<(ChannelStatus, u64)> {
        if !from_batch && self.progress.is_generating_all {
            return Err(PlannerError::BatchInProgress);
        }
        let prior = self
            .progress
            .status_of(channel)
            .ok_or_else(|| PlannerError::UnknownChannel(channel.to_string()))?;
        self.apply(ProgressEvent::Started {
            channel: channel.to_string(),
        })?;
        let attempt = self.attempts.entry(channel.to_string()).or_insert(0);
        *attempt += 1;
        Ok((prior, *attempt))
    }
}

/// Orders channels for a batch: grouped by category in order of first
/// appearance, listed order kept within each group.
pub fn ordered_for_batch(channels: &[Channel]) -> Vec<&Channel> {
    let mut categories: Vec<&str> = Vec::new();
    for channel in channels {
        if !categories.contains(&channel.category.as_str()) {
            categories.push(channel.category.as_str());
        }
    }
    categories
        .into_iter()
        .flat_map(|category| channels.iter().filter(move |c| c.category == category))
        .collect()
}

fn failure_message(err: &PlannerError) -> String {
    match err {
        PlannerError::Generation(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Scoped ownership of one generation attempt. Stops the ticker on every
/// exit path and marks the entry failed if the attempt never settled
/// (cancelled future or panicking generator).
struct AttemptGuard {
    state: Arc<Mutex<OrchestratorState>>,
    channel: String,
    attempt: u64,
    ticker: Option<ProgressTicker>,
    settled: bool,
}

impl AttemptGuard {
    fn stop_ticker(&mut self) {
        self.ticker.take();
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.stop_ticker();
        if self.settled {
            return;
        }
        let mut state = self.state.lock();
        if state.is_current(&self.channel, self.attempt)
            && state.progress.status_of(&self.channel) == Some(ChannelStatus::InProgress)
        {
            warn!(channel = %self.channel, "Generation attempt interrupted before settling");
            let _ = state.apply(ProgressEvent::Failed {
                channel: self.channel.clone(),
                message: "generation was interrupted".to_string(),
            });
        }
    }
}

/// Clears the batch flag however the batch ends.
struct BatchGuard {
    state: Arc<Mutex<OrchestratorState>>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let _ = self.state.lock().apply(ProgressEvent::BatchFinished);
    }
}

/// Drives per-channel creative generation against an [`AssetGenerator`].
#[derive(Clone)]
pub struct AssetOrchestrator {
    generator: Arc<dyn AssetGenerator>,
    estimator: ProgressEstimator,
    inter_request_delay: Duration,
    state: Arc<Mutex<OrchestratorState>>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for AssetOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AssetOrchestrator")
            .field("total_channels", &state.progress.total_channels)
            .field("completed_channels", &state.progress.completed_channels)
            .field("assets", &state.channel_assets.len())
            .finish()
    }
}

impl AssetOrchestrator {
    pub fn new(generator: Arc<dyn AssetGenerator>, config: &OrchestratorConfig) -> Self {
        Self {
            generator,
            estimator: ProgressEstimator::from_config(config),
            inter_request_delay: Duration::from_millis(config.inter_request_delay_ms),
            state: Arc::new(Mutex::new(OrchestratorState::default())),
            event_sink: noop_sink(),
        }
    }

    /// Attach an event sink for emitting generation events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> AssetGenerationProgress {
        self.state.lock().progress.clone()
    }

    pub fn channel_assets(&self) -> HashMap<String, ChannelAssetGenerationResult> {
        self.state.lock().channel_assets.clone()
    }

    pub fn assets_for(&self, channel: &str) -> Option<ChannelAssetGenerationResult> {
        self.state.lock().channel_assets.get(channel).cloned()
    }

    pub fn is_generating_all(&self) -> bool {
        self.state.lock().progress.is_generating_all
    }

    /// Creates a pending entry for each recommended channel. Existing
    /// assets are left alone.
    pub fn initialize(&self, recommended: &[Channel]) -> PlannerResult<()> {
        let channels: Vec<String> = recommended.iter().map(|c| c.channel_name.clone()).collect();
        let mut state = self.state.lock();
        state.apply(ProgressEvent::Initialized {
            channels: channels.clone(),
        })?;
        state.attempts.clear();
        info!(channels = channels.len(), "Asset generation initialized");
        Ok(())
    }

    /// Generates assets for one channel. Refused while a batch is running
    /// or while the channel is already generating. Generator failures are
    /// recorded on the channel entry and reported as
    /// [`ChannelOutcome::Failed`], not as an error.
    pub async fn generate_for_channel(
        &self,
        context: &CampaignContext,
        channel_name: &str,
        category: &str,
    ) -> PlannerResult<ChannelOutcome> {
        self.run_channel(context, channel_name, category, false).await
    }

    async fn run_channel(
        &self,
        context: &CampaignContext,
        channel_name: &str,
        category: &str,
        from_batch: bool,
    ) -> PlannerResult<ChannelOutcome> {
        let (prior, attempt) = self.state.lock().begin_attempt(channel_name, from_batch)?;

        info!(channel = %channel_name, category = %category, attempt, "Generating channel assets");
        self.event_sink.emit(make_event(
            EventType::ChannelGenerationStarted,
            None,
            Some(context.campaign_id),
            Some(channel_name.to_string()),
        ));

        let ticker = {
            let state = self.state.clone();
            let channel = channel_name.to_string();
            self.estimator.start(channel_name, move |percentage| {
                let mut state = state.lock();
                if !state.is_current(&channel, attempt) {
                    return false;
                }
                state
                    .apply(ProgressEvent::Estimated {
                        channel: channel.clone(),
                        percentage,
                    })
                    .is_ok()
            })
        };
        let mut guard = AttemptGuard {
            state: self.state.clone(),
            channel: channel_name.to_string(),
            attempt,
            ticker: Some(ticker),
            settled: false,
        };

        let started = Instant::now();
        let result = self
            .generator
            .generate_channel_assets(context, channel_name, category)
            .await
            .and_then(|result| {
                if result.channel == channel_name {
                    Ok(result)
                } else {
                    Err(PlannerError::Generation(format!(
                        "generator returned assets for {} instead of {}",
                        result.channel, channel_name
                    )))
                }
            });
        guard.stop_ticker();
        let latency_ms = started.elapsed().as_millis() as u64;

        let outcome = {
            let mut state = self.state.lock();
            match result {
                Ok(assets) => {
                    state.apply(ProgressEvent::Succeeded {
                        channel: channel_name.to_string(),
                        prior,
                    })?;
                    state.channel_assets.insert(channel_name.to_string(), assets);
                    ChannelOutcome::Completed
                }
                Err(err) => {
                    let message = failure_message(&err);
                    state.apply(ProgressEvent::Failed {
                        channel: channel_name.to_string(),
                        message: message.clone(),
                    })?;
                    ChannelOutcome::Failed(message)
                }
            }
        };
        guard.settled = true;

        match &outcome {
            ChannelOutcome::Completed => {
                metrics::counter!("channel_assets.generated", "channel" => channel_name.to_string())
                    .increment(1);
                metrics::histogram!("channel_assets.latency_ms", "channel" => channel_name.to_string())
                    .record(latency_ms as f64);
                info!(channel = %channel_name, latency_ms, "Channel assets generated");
                self.event_sink.emit(make_event(
                    EventType::ChannelGenerationCompleted,
                    None,
                    Some(context.campaign_id),
                    Some(channel_name.to_string()),
                ));
            }
            ChannelOutcome::Failed(message) => {
                metrics::counter!("channel_assets.failed", "channel" => channel_name.to_string())
                    .increment(1);
                warn!(channel = %channel_name, error = %message, "Channel asset generation failed");
                self.event_sink.emit(make_event_with_detail(
                    EventType::ChannelGenerationFailed,
                    None,
                    Some(context.campaign_id),
                    Some(channel_name.to_string()),
                    message.clone(),
                ));
            }
        }

        Ok(outcome)
    }

    /// Generates every channel that is neither completed nor in progress,
    /// one at a time in [`ordered_for_batch`] order, pausing between
    /// requests. Individual failures do not stop the batch.
    pub async fn generate_for_all(
        &self,
        context: &CampaignContext,
        recommended: &[Channel],
    ) -> PlannerResult<BatchSummary> {
        self.state.lock().apply(ProgressEvent::BatchStarted)?;
        let _batch = BatchGuard {
            state: self.state.clone(),
        };

        self.event_sink.emit(make_event(
            EventType::BatchStarted,
            None,
            Some(context.campaign_id),
            None,
        ));
        info!(channels = recommended.len(), "Batch generation started");

        let mut summary = BatchSummary::default();
        for channel in ordered_for_batch(recommended) {
            let name = channel.channel_name.as_str();
            let status = self.state.lock().progress.status_of(name);
            match status {
                None => {
                    warn!(channel = %name, "Skipping channel that was not initialized");
                    summary.skipped.push(name.to_string());
                    continue;
                }
                Some(ChannelStatus::Completed) | Some(ChannelStatus::InProgress) => {
                    debug!(channel = %name, "Skipping settled channel");
                    summary.skipped.push(name.to_string());
                    continue;
                }
                Some(_) => {}
            }

            if !summary.attempted.is_empty() && !self.inter_request_delay.is_zero() {
                tokio::time::sleep(self.inter_request_delay).await;
            }
            summary.attempted.push(name.to_string());

            match self.run_channel(context, name, &channel.category, true).await {
                Ok(ChannelOutcome::Completed) => summary.succeeded.push(name.to_string()),
                Ok(ChannelOutcome::Failed(message)) => {
                    summary.failed.push((name.to_string(), message))
                }
                Err(err) => {
                    warn!(channel = %name, error = %err, "Channel could not be started");
                    summary.failed.push((name.to_string(), err.to_string()));
                }
            }
        }

        info!(
            attempted = summary.attempted.len(),
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "Batch generation finished"
        );
        self.event_sink.emit(make_event_with_detail(
            EventType::BatchFinished,
            None,
            Some(context.campaign_id),
            None,
            format!(
                "{} succeeded, {} failed",
                summary.succeeded.len(),
                summary.failed.len()
            ),
        ));

        Ok(summary)
    }

    /// Drops every generated asset and returns all channels to pending.
    /// Refused while anything is generating.
    pub fn reset(&self) -> PlannerResult<()> {
        let mut state = self.state.lock();
        state.apply(ProgressEvent::Reset)?;
        state.channel_assets.clear();
        drop(state);

        info!("Channel assets reset");
        self.event_sink
            .emit(make_event(EventType::AssetsReset, None, None, None));
        Ok(())
    }
}
