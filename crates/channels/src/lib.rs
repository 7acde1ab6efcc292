//! Multi-channel creative generation: drives the external generator one
//! channel at a time, tracks per-channel progress with a cosmetic estimate,
//! and keeps completion counts idempotent across retries.

pub mod estimator;
pub mod orchestrator;
pub mod ports;
pub mod progress;
pub mod state_machine;

pub use orchestrator::{ordered_for_batch, AssetOrchestrator, BatchSummary, ChannelOutcome};
pub use ports::{AssetGenerator, CampaignContext};
pub use progress::ProgressEvent;
pub use state_machine::ChannelStateMachine;
