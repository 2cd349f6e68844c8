//! Sending statistics — the counters the daily limit and cooldown gate on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Daily and lifetime send counters, persisted next to the contacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendingStats {
    /// ISO day (`YYYY-MM-DD`) the daily counter applies to.
    pub date: String,
    /// Successful sends on `date`.
    pub sent_today: u32,
    /// Lifetime successful sends.
    pub total_sent: u64,
    /// Most recent batch dispatch, used for cooldown gating.
    pub last_batch_time: Option<DateTime<Utc>>,
}

impl SendingStats {
    pub fn new() -> Self {
        Self {
            date: today(),
            sent_today: 0,
            total_sent: 0,
            last_batch_time: None,
        }
    }

    /// Reset the daily counter when the wall-clock day has changed.
    ///
    /// Called lazily on access rather than from a background timer; returns
    /// true when a rollover happened so the caller can persist.
    pub fn roll_over_if_new_day(&mut self) -> bool {
        let now = today();
        if self.date != now {
            self.date = now;
            self.sent_today = 0;
            true
        } else {
            false
        }
    }

    /// Record one successful delivery.
    pub fn record_sent(&mut self) {
        self.sent_today += 1;
        self.total_sent += 1;
    }
}

impl Default for SendingStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Current ISO day in UTC.
pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_start_at_zero() {
        let stats = SendingStats::new();
        assert_eq!(stats.sent_today, 0);
        assert_eq!(stats.total_sent, 0);
        assert_eq!(stats.date, today());
        assert!(stats.last_batch_time.is_none());
    }

    #[test]
    fn test_rollover_resets_daily_only() {
        let mut stats = SendingStats {
            date: "2020-01-01".into(),
            sent_today: 42,
            total_sent: 500,
            last_batch_time: Some(Utc::now()),
        };

        assert!(stats.roll_over_if_new_day());
        assert_eq!(stats.sent_today, 0);
        assert_eq!(stats.total_sent, 500);
        assert_eq!(stats.date, today());
    }

    #[test]
    fn test_rollover_same_day_is_noop() {
        let mut stats = SendingStats::new();
        stats.sent_today = 7;
        assert!(!stats.roll_over_if_new_day());
        assert_eq!(stats.sent_today, 7);
    }

    #[test]
    fn test_record_sent_increments_both() {
        let mut stats = SendingStats::new();
        stats.record_sent();
        stats.record_sent();
        assert_eq!(stats.sent_today, 2);
        assert_eq!(stats.total_sent, 2);
    }
}
