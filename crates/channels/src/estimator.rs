//! Cosmetic progress estimation for in-flight channel generation.
//!
//! The generator reports nothing until it settles, so the percentage shown
//! while a channel is generating is a function of elapsed time against a
//! per-channel expected duration. The ticker that produces it is owned by
//! the generation attempt and aborted when the attempt's guard drops.

use std::collections::HashMap;
use std::time::Duration;

use planner_core::config::OrchestratorConfig;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::trace;

/// Built-in expected durations, keyed by lower-cased channel name.
const BUILTIN_ESTIMATES_SECS: &[(&str, u64)] = &[
    ("email", 25),
    ("sms", 15),
    ("push notifications", 15),
    ("instagram", 35),
    ("facebook", 30),
    ("tiktok", 40),
    ("linkedin", 30),
    ("twitter/x", 20),
    ("youtube", 45),
    ("google ads", 30),
    ("blog", 45),
    ("website", 40),
];

/// Percentage for `elapsed` against `estimated`, capped at `cap`.
pub fn estimate_percentage(elapsed: Duration, estimated: Duration, cap: u8) -> u8 {
    if estimated.is_zero() {
        return cap;
    }
    let pct = elapsed.as_secs_f64() / estimated.as_secs_f64() * 100.0;
    pct.floor().min(f64::from(cap)) as u8
}

/// Resolves expected durations and builds tickers.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    estimates: HashMap<String, Duration>,
    default_estimate: Duration,
    tick: Duration,
    cap: u8,
}

impl ProgressEstimator {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let mut estimates: HashMap<String, Duration> = BUILTIN_ESTIMATES_SECS
            .iter()
            .map(|(name, secs)| (name.to_string(), Duration::from_secs(*secs)))
            .collect();
        for (name, secs) in &config.channel_estimates_secs {
            estimates.insert(name.to_lowercase(), Duration::from_secs(*secs));
        }

        Self {
            estimates,
            default_estimate: Duration::from_secs(config.default_estimated_secs),
            tick: Duration::from_millis(config.tick_interval_ms.max(1)),
            cap: config.max_estimated_percent.min(99),
        }
    }

    pub fn estimated_duration(&self, channel: &str) -> Duration {
        self.estimates
            .get(&channel.to_lowercase())
            .copied()
            .unwrap_or(self.default_estimate)
    }

    /// Spawns a ticker for `channel`. `on_tick` receives each new estimate
    /// and returns `false` to stop the ticker early.
    pub fn start<F>(&self, channel: &str, on_tick: F) -> ProgressTicker
    where
        F: FnMut(u8) -> bool + Send + 'static,
    {
        ProgressTicker::spawn(
            channel.to_string(),
            self.estimated_duration(channel),
            self.tick,
            self.cap,
            on_tick,
        )
    }
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

/// Handle to a running ticker. Dropping it aborts the task.
#[derive(Debug)]
pub struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    fn spawn<F>(channel: String, estimated: Duration, tick: Duration, cap: u8, mut on_tick: F) -> Self
    where
        F: FnMut(u8) -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticks = interval(tick);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let pct = estimate_percentage(started.elapsed(), estimated, cap);
                trace!(channel = %channel, pct, "Progress estimate");
                if !on_tick(pct) {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_estimate_percentage() {
        let est = Duration::from_secs(20);
        assert_eq!(estimate_percentage(Duration::ZERO, est, 95), 0);
        assert_eq!(estimate_percentage(Duration::from_secs(5), est, 95), 25);
        assert_eq!(estimate_percentage(Duration::from_secs(19), est, 95), 95);
        assert_eq!(estimate_percentage(Duration::from_secs(600), est, 95), 95);
        assert_eq!(estimate_percentage(Duration::from_secs(1), Duration::ZERO, 95), 95);
    }

    #[test]
    fn test_duration_lookup() {
        let mut config = OrchestratorConfig::default();
        config.channel_estimates_secs.insert("Email".into(), 12);
        config.default_estimated_secs = 50;
        let estimator = ProgressEstimator::from_config(&config);

        assert_eq!(estimator.estimated_duration("EMAIL"), Duration::from_secs(12));
        assert_eq!(estimator.estimated_duration("TikTok"), Duration::from_secs(40));
        assert_eq!(estimator.estimated_duration("Carrier pigeon"), Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_reports_and_caps() {
        let mut config = OrchestratorConfig::default();
        config.channel_estimates_secs.insert("sms".into(), 4);
        let estimator = ProgressEstimator::from_config(&config);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ticker = estimator.start("SMS", move |pct| {
            sink.lock().unwrap().push(pct);
            true
        });

        tokio::time::sleep(Duration::from_millis(6_500)).await;
        drop(ticker);

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![25, 50, 75, 95, 95, 95]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_stops_when_callback_declines() {
        let estimator = ProgressEstimator::default();
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();
        let ticker = estimator.start("Email", move |_| {
            *counter.lock().unwrap() += 1;
            false
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(ticker.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_ticker_aborts() {
        let estimator = ProgressEstimator::default();
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();
        let ticker = estimator.start("Email", move |_| {
            *counter.lock().unwrap() += 1;
            true
        });
        drop(ticker);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
