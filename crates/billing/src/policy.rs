//! Pure entitlement rules: the decision table and the usage summary,
//! computed from an account snapshot and a clock reading.

use chrono::{DateTime, Duration, Utc};
use planner_core::config::EntitlementConfig;
use planner_core::types::{Account, AccountStatus, Subscription, UsageInfo, UsageReason};

const SECS_PER_DAY: i64 = 86_400;

/// Outcome of the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: UsageReason,
}

impl Decision {
    fn allow(reason: UsageReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: UsageReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Whole days from `now` until `target`, rounded up, never negative.
pub fn days_until(now: DateTime<Utc>, target: DateTime<Utc>) -> i64 {
    let secs = (target - now).num_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + SECS_PER_DAY - 1) / SECS_PER_DAY
    }
}

pub fn trial_has_expired(account: &Account, now: DateTime<Utc>) -> bool {
    account.account_status == AccountStatus::Trial && now > account.trial_end_date
}

/// Starts a new quota period if `now` has reached the reset date. The reset
/// date advances by whole periods until it lies in the future. Returns
/// `true` when the subscription changed.
pub fn roll_quota_period(sub: &mut Subscription, now: DateTime<Utc>, period_days: i64) -> bool {
    if now < sub.quota_reset_date {
        return false;
    }
    let period = Duration::days(period_days.max(1));
    while sub.quota_reset_date <= now {
        sub.quota_reset_date += period;
    }
    sub.campaigns_used_current_period = 0;
    true
}

/// The decision table. `None` means the account does not exist.
pub fn decide(account: Option<&Account>, now: DateTime<Utc>, config: &EntitlementConfig) -> Decision {
    let Some(account) = account else {
        return Decision::deny(UsageReason::SubscriptionRequired);
    };

    match account.account_status {
        AccountStatus::Trial if trial_has_expired(account, now) => {
            Decision::deny(UsageReason::TrialExpired)
        }
        AccountStatus::Trial if account.trial_campaigns_used < config.trial_campaign_limit => {
            Decision::allow(UsageReason::Trial)
        }
        AccountStatus::Trial => Decision::deny(UsageReason::QuotaExceeded),
        AccountStatus::Active => match &account.active_subscription {
            Some(sub) if sub.campaigns_used_current_period < sub.campaign_quota => {
                Decision::allow(UsageReason::Subscription)
            }
            Some(_) => Decision::deny(UsageReason::QuotaExceeded),
            None => Decision::deny(UsageReason::SubscriptionRequired),
        },
        AccountStatus::Expired => Decision::deny(UsageReason::SubscriptionRequired),
    }
}

/// Usage summary for display. Reads only; never mutates.
pub fn usage_info(
    account: Option<&Account>,
    now: DateTime<Utc>,
    config: &EntitlementConfig,
) -> UsageInfo {
    let decision = decide(account, now, config);
    let mut info = UsageInfo {
        can_generate: decision.allowed,
        reason: decision.reason,
        remaining: 0,
        limit: 0,
        trial_days_remaining: None,
        days_until_reset: None,
    };

    let Some(account) = account else {
        return info;
    };

    match account.account_status {
        AccountStatus::Trial => {
            info.limit = config.trial_campaign_limit;
            info.trial_days_remaining = Some(days_until(now, account.trial_end_date));
            if decision.reason != UsageReason::TrialExpired {
                info.remaining = config
                    .trial_campaign_limit
                    .saturating_sub(account.trial_campaigns_used);
            }
        }
        AccountStatus::Active => {
            if let Some(sub) = &account.active_subscription {
                info.limit = sub.campaign_quota;
                info.remaining = sub
                    .campaign_quota
                    .saturating_sub(sub.campaigns_used_current_period);
                info.days_until_reset = Some(days_until(now, sub.quota_reset_date));
            }
        }
        AccountStatus::Expired => {}
    }

    info
}
