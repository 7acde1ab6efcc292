//! Pure transition function over [`AssetGenerationProgress`].
//!
//! Every change to the progress snapshot goes through [`apply`], which
//! takes the current snapshot and an event and returns the next snapshot
//! or the reason the event is not allowed in the current state.

use std::collections::HashMap;
use std::sync::OnceLock;

use planner_core::types::{AssetGenerationProgress, ChannelProgressEntry, ChannelStatus};
use planner_core::{PlannerError, PlannerResult};
use tracing::debug;

use crate::state_machine::ChannelStateMachine;

/// Estimates never reach 100 on their own; only success does.
const MAX_ESTIMATE: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A new campaign's recommended channels, in listed order.
    Initialized { channels: Vec<String> },
    Started { channel: String },
    Estimated { channel: String, percentage: u8 },
    /// `prior` is the channel's status before the attempt began.
    Succeeded { channel: String, prior: ChannelStatus },
    Failed { channel: String, message: String },
    BatchStarted,
    BatchFinished,
    Reset,
}

fn machine() -> &'static ChannelStateMachine {
    static MACHINE: OnceLock<ChannelStateMachine> = OnceLock::new();
    MACHINE.get_or_init(ChannelStateMachine::new)
}

fn ensure_idle(progress: &AssetGenerationProgress) -> PlannerResult<()> {
    if progress.is_generating_all {
        return Err(PlannerError::BatchInProgress);
    }
    if let Some((name, _)) = progress
        .channel_progress
        .iter()
        .find(|(_, e)| e.status == ChannelStatus::InProgress)
    {
        return Err(PlannerError::ChannelBusy(name.clone()));
    }
    Ok(())
}

fn entry_mut<'a>(
    next: &'a mut AssetGenerationProgress,
    channel: &str,
) -> PlannerResult<&'a mut ChannelProgressEntry> {
    next.channel_progress
        .get_mut(channel)
        .ok_or_else(|| PlannerError::UnknownChannel(channel.to_string()))
}

fn move_to(
    entry: &mut ChannelProgressEntry,
    channel: &str,
    to: ChannelStatus,
) -> PlannerResult<()> {
    let Some(trigger) = machine().trigger_for(entry.status, to) else {
        if entry.status == ChannelStatus::InProgress && to == ChannelStatus::InProgress {
            return Err(PlannerError::ChannelBusy(channel.to_string()));
        }
        return Err(PlannerError::InvalidTransition {
            channel: channel.to_string(),
            from: entry.status,
            to,
        });
    };
    debug!(channel, from = %entry.status, %to, trigger, "Channel status transition");
    entry.status = to;
    Ok(())
}

/// Computes the snapshot that follows `event`.
pub fn apply(
    progress: &AssetGenerationProgress,
    event: ProgressEvent,
) -> PlannerResult<AssetGenerationProgress> {
    let mut next = progress.clone();

    match event {
        ProgressEvent::Initialized { channels } => {
            ensure_idle(progress)?;
            let channel_progress: HashMap<String, ChannelProgressEntry> = channels
                .into_iter()
                .map(|name| (name, ChannelProgressEntry::pending()))
                .collect();
            next = AssetGenerationProgress {
                total_channels: channel_progress.len(),
                completed_channels: 0,
                is_generating_all: false,
                channel_progress,
            };
        }
        ProgressEvent::Started { channel } => {
            let entry = entry_mut(&mut next, &channel)?;
            move_to(entry, &channel, ChannelStatus::InProgress)?;
            entry.percentage = 0;
            entry.error = None;
        }
        ProgressEvent::Estimated {
            channel,
            percentage,
        } => {
            let entry = entry_mut(&mut next, &channel)?;
            if entry.status != ChannelStatus::InProgress {
                return Err(PlannerError::InvalidTransition {
                    channel,
                    from: entry.status,
                    to: ChannelStatus::InProgress,
                });
            }
            entry.percentage = entry.percentage.max(percentage.min(MAX_ESTIMATE));
        }
        ProgressEvent::Succeeded { channel, prior } => {
            let entry = entry_mut(&mut next, &channel)?;
            move_to(entry, &channel, ChannelStatus::Completed)?;
            entry.percentage = 100;
            entry.error = None;
            if prior != ChannelStatus::Completed {
                next.completed_channels = (next.completed_channels + 1).min(next.total_channels);
            }
        }
        ProgressEvent::Failed { channel, message } => {
            let entry = entry_mut(&mut next, &channel)?;
            move_to(entry, &channel, ChannelStatus::Error)?;
            entry.percentage = 0;
            entry.error = Some(message);
        }
        ProgressEvent::BatchStarted => {
            ensure_idle(progress)?;
            next.is_generating_all = true;
        }
        ProgressEvent::BatchFinished => {
            next.is_generating_all = false;
        }
        ProgressEvent::Reset => {
            ensure_idle(progress)?;
            for entry in next.channel_progress.values_mut() {
                *entry = ChannelProgressEntry::pending();
            }
            next.completed_channels = 0;
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized(names: &[&str]) -> AssetGenerationProgress {
        apply(
            &AssetGenerationProgress::default(),
            ProgressEvent::Initialized {
                channels: names.iter().map(|n| n.to_string()).collect(),
            },
        )
        .unwrap()
    }

    fn step(p: &AssetGenerationProgress, event: ProgressEvent) -> AssetGenerationProgress {
        apply(p, event).unwrap()
    }

    fn started(channel: &str) -> ProgressEvent {
        ProgressEvent::Started {
            channel: channel.into(),
        }
    }

    #[test]
    fn test_initialize_creates_pending_entries() {
        let p = initialized(&["Email", "Instagram", "SMS"]);
        assert_eq!(p.total_channels, 3);
        assert_eq!(p.completed_channels, 0);
        assert!(p
            .channel_progress
            .values()
            .all(|e| *e == ChannelProgressEntry::pending()));
    }

    #[test]
    fn test_success_counts_once() {
        let p = initialized(&["Email", "SMS"]);
        let p = step(&p, started("Email"));
        let p = step(
            &p,
            ProgressEvent::Succeeded {
                channel: "Email".into(),
                prior: ChannelStatus::Pending,
            },
        );
        assert_eq!(p.completed_channels, 1);
        assert_eq!(p.entry("Email").unwrap().percentage, 100);

        // Regenerating a completed channel does not double count.
        let p = step(&p, started("Email"));
        let p = step(
            &p,
            ProgressEvent::Succeeded {
                channel: "Email".into(),
                prior: ChannelStatus::Completed,
            },
        );
        assert_eq!(p.completed_channels, 1);
    }

    #[test]
    fn test_failure_records_message() {
        let p = initialized(&["SMS"]);
        let p = step(&p, started("SMS"));
        let p = step(
            &p,
            ProgressEvent::Failed {
                channel: "SMS".into(),
                message: "rate limited".into(),
            },
        );
        let entry = p.entry("SMS").unwrap();
        assert_eq!(entry.status, ChannelStatus::Error);
        assert_eq!(entry.percentage, 0);
        assert_eq!(entry.error.as_deref(), Some("rate limited"));
        assert_eq!(p.completed_channels, 0);

        // Retry clears the error.
        let p = step(&p, started("SMS"));
        assert_eq!(p.entry("SMS").unwrap().error, None);
    }

    #[test]
    fn test_estimates_are_monotonic_and_below_100() {
        let p = initialized(&["Email"]);
        let p = step(&p, started("Email"));
        let p = step(
            &p,
            ProgressEvent::Estimated {
                channel: "Email".into(),
                percentage: 40,
            },
        );
        let p = step(
            &p,
            ProgressEvent::Estimated {
                channel: "Email".into(),
                percentage: 20,
            },
        );
        assert_eq!(p.entry("Email").unwrap().percentage, 40);

        let p = step(
            &p,
            ProgressEvent::Estimated {
                channel: "Email".into(),
                percentage: 100,
            },
        );
        assert_eq!(p.entry("Email").unwrap().percentage, 99);
    }

    #[test]
    fn test_estimate_rejected_once_settled() {
        let p = initialized(&["Email"]);
        let err = apply(
            &p,
            ProgressEvent::Estimated {
                channel: "Email".into(),
                percentage: 10,
            },
        )
        .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidTransition { .. }));
    }

    #[test]
    fn test_double_start_is_busy() {
        let p = initialized(&["Email"]);
        let p = step(&p, started("Email"));
        let err = apply(&p, started("Email")).unwrap_err();
        assert!(matches!(err, PlannerError::ChannelBusy(c) if c == "Email"));
    }

    #[test]
    fn test_unknown_channel() {
        let p = initialized(&["Email"]);
        let err = apply(&p, started("Fax")).unwrap_err();
        assert!(matches!(err, PlannerError::UnknownChannel(c) if c == "Fax"));
    }

    #[test]
    fn test_reset_refuses_while_busy() {
        let p = initialized(&["Email"]);
        let batch = step(&p, ProgressEvent::BatchStarted);
        assert!(matches!(
            apply(&batch, ProgressEvent::Reset).unwrap_err(),
            PlannerError::BatchInProgress
        ));

        let running = step(&p, started("Email"));
        assert!(matches!(
            apply(&running, ProgressEvent::Reset).unwrap_err(),
            PlannerError::ChannelBusy(_)
        ));
    }

    #[test]
    fn test_reset_returns_everything_to_pending() {
        let p = initialized(&["Email", "SMS"]);
        let p = step(&p, started("Email"));
        let p = step(
            &p,
            ProgressEvent::Succeeded {
                channel: "Email".into(),
                prior: ChannelStatus::Pending,
            },
        );
        let p = step(&p, started("SMS"));
        let p = step(
            &p,
            ProgressEvent::Failed {
                channel: "SMS".into(),
                message: "boom".into(),
            },
        );

        let p = step(&p, ProgressEvent::Reset);
        assert_eq!(p.completed_channels, 0);
        assert_eq!(p.total_channels, 2);
        assert!(p
            .channel_progress
            .values()
            .all(|e| *e == ChannelProgressEntry::pending()));
    }

    #[test]
    fn test_batch_flag() {
        let p = initialized(&["Email"]);
        let p = step(&p, ProgressEvent::BatchStarted);
        assert!(p.is_generating_all);
        assert!(matches!(
            apply(&p, ProgressEvent::BatchStarted).unwrap_err(),
            PlannerError::BatchInProgress
        ));
        let p = step(&p, ProgressEvent::BatchFinished);
        assert!(!p.is_generating_all);
    }
}
