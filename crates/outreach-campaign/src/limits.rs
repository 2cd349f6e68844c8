//! Sending policy — pure decision functions over the stats ledger.

use chrono::{DateTime, Utc};
use outreach_core::config::SendingLimits;

use crate::stats::SendingStats;

/// Outcome of a pre-batch policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendVerdict {
    Allowed,
    Denied(DenyReason),
}

/// Why a proposed send was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    DailyLimitExceeded { sent_today: u32, daily_limit: u32 },
    CooldownActive { remaining_minutes: i64 },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::DailyLimitExceeded { sent_today, daily_limit } => {
                write!(f, "Daily limit exceeded: {sent_today}/{daily_limit} sent today")
            }
            DenyReason::CooldownActive { remaining_minutes } => {
                write!(f, "Batch cooldown active: wait {remaining_minutes} more minutes")
            }
        }
    }
}

/// Decide whether `count` messages may be dispatched right now.
///
/// Evaluated once before a batch starts, not per message. `now` is a
/// parameter so the cooldown window is testable without a clock.
pub fn can_send(
    stats: &SendingStats,
    limits: &SendingLimits,
    count: u32,
    now: DateTime<Utc>,
) -> SendVerdict {
    if stats.sent_today + count > limits.daily_limit {
        return SendVerdict::Denied(DenyReason::DailyLimitExceeded {
            sent_today: stats.sent_today,
            daily_limit: limits.daily_limit,
        });
    }

    if let Some(last_batch) = stats.last_batch_time {
        let elapsed = now.signed_duration_since(last_batch);
        let cooldown = chrono::Duration::seconds(limits.batch_cooldown_secs as i64);
        if elapsed < cooldown {
            let remaining = cooldown - elapsed;
            // Round up so "59 seconds left" reads as 1 minute, not 0
            let remaining_minutes = (remaining.num_seconds() + 59) / 60;
            return SendVerdict::Denied(DenyReason::CooldownActive { remaining_minutes });
        }
    }

    SendVerdict::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SendingLimits {
        SendingLimits {
            daily_limit: 5,
            batch_cooldown_secs: 900,
            ..SendingLimits::default()
        }
    }

    #[test]
    fn test_allowed_when_under_quota() {
        let stats = SendingStats::new();
        assert_eq!(can_send(&stats, &limits(), 5, Utc::now()), SendVerdict::Allowed);
    }

    #[test]
    fn test_denied_over_daily_limit() {
        let mut stats = SendingStats::new();
        stats.sent_today = 3;
        // dailyLimit=5, sentToday=3, batch of 4 -> denied
        match can_send(&stats, &limits(), 4, Utc::now()) {
            SendVerdict::Denied(DenyReason::DailyLimitExceeded { sent_today, daily_limit }) => {
                assert_eq!(sent_today, 3);
                assert_eq!(daily_limit, 5);
            }
            other => panic!("expected daily limit denial, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_quota_fill_allowed() {
        let mut stats = SendingStats::new();
        stats.sent_today = 3;
        assert_eq!(can_send(&stats, &limits(), 2, Utc::now()), SendVerdict::Allowed);
    }

    #[test]
    fn test_zero_count_allowed_at_quota() {
        let mut stats = SendingStats::new();
        stats.sent_today = 5;
        assert_eq!(can_send(&stats, &limits(), 0, Utc::now()), SendVerdict::Allowed);
    }

    #[test]
    fn test_denied_during_cooldown() {
        let now = Utc::now();
        let mut stats = SendingStats::new();
        stats.last_batch_time = Some(now - chrono::Duration::seconds(60));

        match can_send(&stats, &limits(), 1, now) {
            SendVerdict::Denied(DenyReason::CooldownActive { remaining_minutes }) => {
                assert_eq!(remaining_minutes, 14);
            }
            other => panic!("expected cooldown denial, got {other:?}"),
        }
    }

    #[test]
    fn test_allowed_after_cooldown() {
        let now = Utc::now();
        let mut stats = SendingStats::new();
        stats.last_batch_time = Some(now - chrono::Duration::seconds(901));
        assert_eq!(can_send(&stats, &limits(), 1, now), SendVerdict::Allowed);
    }

    #[test]
    fn test_daily_limit_checked_before_cooldown() {
        let now = Utc::now();
        let mut stats = SendingStats::new();
        stats.sent_today = 5;
        stats.last_batch_time = Some(now);

        match can_send(&stats, &limits(), 1, now) {
            SendVerdict::Denied(DenyReason::DailyLimitExceeded { .. }) => {}
            other => panic!("expected daily limit denial first, got {other:?}"),
        }
    }
}
