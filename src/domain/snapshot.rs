//! Derived metrics published after each successful synchronizer cycle.

use crate::domain::{Address, BaseUnits, Decimal, TimeSecs};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A consistent view of ledger-derived metrics for one account.
///
/// Built from a single read batch and replaced as a whole; fields are never updated
/// individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub account: Address,
    pub apy_percent: Decimal,
    pub earned_rewards: Decimal,
    pub total_staked_display: Decimal,
    pub total_effective_display: Decimal,
    pub individual_actual: Decimal,
    pub individual_effective: Decimal,
    pub individual_multiplier_percent: Decimal,
    pub individual_stake_date: Option<DateTime<Utc>>,
    pub min_bonus_period_days: Decimal,
    pub early_withdrawal_period_days: Decimal,
    pub early_withdrawal_penalty_percent: Decimal,
    pub total_rewards_given: Decimal,
    pub wallet_balance: Decimal,
    /// Raw ledger timestamp the bonus countdown is computed from.
    pub stake_timestamp: TimeSecs,
    /// Unscaled actual stake, for percentage withdrawals.
    pub individual_actual_raw: BaseUnits,
    pub early_withdrawal_period_secs: u64,
    pub taken_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// True while a withdrawal at `now` would fall inside the early-withdrawal period.
    pub fn in_early_withdrawal_period(&self, now: TimeSecs) -> bool {
        if self.stake_timestamp.as_secs() <= 0 {
            return false;
        }
        let period = i64::try_from(self.early_withdrawal_period_secs).unwrap_or(i64::MAX);
        now.as_secs() < self.stake_timestamp.as_secs().saturating_add(period)
    }
}
