//! Bonus-window countdown, computed from the local clock and one ledger timestamp.

use crate::domain::TimeSecs;
use serde::{Deserialize, Serialize};

/// Time after staking before the matured multiplier can be locked in.
pub const BONUS_WINDOW_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BonusCountdown {
    /// No stake on record (`stake_timestamp == 0`).
    Inactive,
    Running {
        days: i64,
        hours: i64,
        minutes: i64,
        seconds: i64,
        remaining_secs: i64,
    },
    /// Window elapsed; the multiplier refresh is available.
    Finished,
}

impl BonusCountdown {
    pub fn from_remaining(remaining_secs: i64) -> Self {
        if remaining_secs <= 0 {
            return BonusCountdown::Finished;
        }
        BonusCountdown::Running {
            days: remaining_secs / 86_400,
            hours: (remaining_secs % 86_400) / 3600,
            minutes: (remaining_secs % 3600) / 60,
            seconds: remaining_secs % 60,
            remaining_secs,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, BonusCountdown::Finished)
    }
}

/// Stateless countdown for `stake_ts` at `now`.
pub fn compute(stake_ts: TimeSecs, window_secs: i64, now: TimeSecs) -> BonusCountdown {
    if stake_ts.as_secs() <= 0 {
        return BonusCountdown::Inactive;
    }
    let end = stake_ts.as_secs().saturating_add(window_secs);
    BonusCountdown::from_remaining(end.saturating_sub(now.as_secs()))
}

/// Countdown state across ticks.
///
/// For a fixed stake timestamp the remaining time never grows (even if the wall clock steps
/// back) and `Finished` is sticky until the ledger reports a different timestamp.
#[derive(Debug, Clone)]
pub struct CountdownTracker {
    window_secs: i64,
    stake_ts: TimeSecs,
    last_remaining: Option<i64>,
}

impl CountdownTracker {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            stake_ts: TimeSecs::default(),
            last_remaining: None,
        }
    }

    pub fn tick(&mut self, stake_ts: TimeSecs, now: TimeSecs) -> BonusCountdown {
        if stake_ts != self.stake_ts {
            self.stake_ts = stake_ts;
            self.last_remaining = None;
        }

        let countdown = compute(stake_ts, self.window_secs, now);
        let remaining = match countdown {
            BonusCountdown::Inactive => return countdown,
            BonusCountdown::Finished => 0,
            BonusCountdown::Running { remaining_secs, .. } => remaining_secs,
        };

        let remaining = self
            .last_remaining
            .map_or(remaining, |last| remaining.min(last));
        self.last_remaining = Some(remaining);
        BonusCountdown::from_remaining(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAKED: i64 = 1_700_000_000;

    #[test]
    fn test_inactive_without_stake() {
        assert_eq!(
            compute(TimeSecs::new(0), BONUS_WINDOW_SECS, TimeSecs::new(STAKED)),
            BonusCountdown::Inactive
        );
    }

    #[test]
    fn test_decomposition() {
        let now = TimeSecs::new(STAKED + BONUS_WINDOW_SECS - (2 * 86_400 + 3 * 3600 + 4 * 60 + 5));
        assert_eq!(
            compute(TimeSecs::new(STAKED), BONUS_WINDOW_SECS, now),
            BonusCountdown::Running {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5,
                remaining_secs: 2 * 86_400 + 3 * 3600 + 4 * 60 + 5,
            }
        );
    }

    #[test]
    fn test_finished_exactly_at_window_end() {
        let end = STAKED + BONUS_WINDOW_SECS;
        assert!(!compute(TimeSecs::new(STAKED), BONUS_WINDOW_SECS, TimeSecs::new(end - 1))
            .is_finished());
        assert!(compute(TimeSecs::new(STAKED), BONUS_WINDOW_SECS, TimeSecs::new(end)).is_finished());
        assert!(
            compute(TimeSecs::new(STAKED), BONUS_WINDOW_SECS, TimeSecs::new(end + 100))
                .is_finished()
        );
    }

    #[test]
    fn test_tracker_monotonic_and_sticky() {
        let mut tracker = CountdownTracker::new(BONUS_WINDOW_SECS);
        let stake = TimeSecs::new(STAKED);
        let end = STAKED + BONUS_WINDOW_SECS;

        let remaining = |c: BonusCountdown| match c {
            BonusCountdown::Running { remaining_secs, .. } => remaining_secs,
            BonusCountdown::Finished => 0,
            BonusCountdown::Inactive => -1,
        };

        let a = remaining(tracker.tick(stake, TimeSecs::new(end - 10)));
        // Clock steps backwards: remaining must not grow.
        let b = remaining(tracker.tick(stake, TimeSecs::new(end - 20)));
        assert_eq!(a, 10);
        assert_eq!(b, 10);

        assert!(tracker.tick(stake, TimeSecs::new(end)).is_finished());
        assert!(tracker.tick(stake, TimeSecs::new(end - 500)).is_finished());
    }

    #[test]
    fn test_tracker_restarts_on_new_stake_timestamp() {
        let mut tracker = CountdownTracker::new(BONUS_WINDOW_SECS);
        let end = STAKED + BONUS_WINDOW_SECS;
        assert!(tracker
            .tick(TimeSecs::new(STAKED), TimeSecs::new(end + 1))
            .is_finished());

        let restaked = TimeSecs::new(end);
        assert_eq!(
            tracker.tick(restaked, TimeSecs::new(end + 1)),
            BonusCountdown::from_remaining(BONUS_WINDOW_SECS - 1)
        );
    }
}
