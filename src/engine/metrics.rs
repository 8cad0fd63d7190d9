//! Derivation of display metrics from one batch of raw ledger readings.

use crate::domain::{
    Address, BaseUnits, Decimal, DecimalRangeError, MetricsSnapshot, RewardData, StakeRecord,
};
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use tracing::warn;

pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 3600;
pub const SECONDS_PER_DAY: u64 = 24 * 3600;

/// Fractional digits kept for ratios (APY, multiplier bonus, penalty).
pub const RATIO_SCALE: u32 = 18;

/// Every field one synchronizer cycle reads, before any derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerReadings {
    pub reward_data: RewardData,
    pub total_effective: BaseUnits,
    pub total_actual: BaseUnits,
    pub earned: BaseUnits,
    pub stake: StakeRecord,
    pub min_staking_period_secs: BaseUnits,
    pub early_withdrawal_period_secs: BaseUnits,
    pub early_withdrawal_penalty: BaseUnits,
    pub total_rewards: BaseUnits,
    pub wallet_balance: BaseUnits,
}

/// `rate × SECONDS_PER_YEAR × 100 / total_effective`, or zero with nothing staked.
///
/// A rate far above the pool (a near-empty pool right after launch) saturates at
/// [`Decimal::MAX`] so the rest of the snapshot still publishes.
pub fn apy_percent(rate_per_second: &BaseUnits, total_effective: &BaseUnits) -> Decimal {
    if total_effective.is_zero() {
        return Decimal::zero();
    }
    let yearly = rate_per_second.as_biguint() * BigUint::from(SECONDS_PER_YEAR) * 100u32;
    match Decimal::from_ratio(&yearly, total_effective.as_biguint(), RATIO_SCALE) {
        Ok(apy) => apy,
        Err(e) => {
            warn!(
                "APY for rate {} over {} out of range, saturating: {}",
                rate_per_second, total_effective, e
            );
            Decimal::MAX
        }
    }
}

/// Bonus over 1.0 expressed in percent: `(multiplier / base − 1) × 100`.
pub fn multiplier_percent(
    multiplier: &BaseUnits,
    decimals: u32,
) -> Result<Decimal, DecimalRangeError> {
    let base = BaseUnits::one(decimals);
    if multiplier <= &base {
        if multiplier < &base && !multiplier.is_zero() {
            warn!("Multiplier {} below base {}", multiplier, base);
        }
        return Ok(Decimal::zero());
    }
    let bonus = (multiplier.as_biguint() - base.as_biguint()) * 100u32;
    Decimal::from_ratio(&bonus, base.as_biguint(), RATIO_SCALE)
}

/// A fixed-point fraction (base = 1.0) as a percentage.
pub fn fraction_percent(fraction: &BaseUnits, decimals: u32) -> Result<Decimal, DecimalRangeError> {
    let scaled = fraction.as_biguint() * 100u32;
    Decimal::from_ratio(&scaled, BaseUnits::one(decimals).as_biguint(), RATIO_SCALE)
}

pub fn seconds_to_days(secs: &BaseUnits) -> Result<Decimal, DecimalRangeError> {
    Decimal::from_ratio(secs.as_biguint(), &BigUint::from(SECONDS_PER_DAY), 4)
}

/// Build a complete snapshot; any range error discards the whole result.
pub fn derive_snapshot(
    account: Address,
    readings: &LedgerReadings,
    decimals: u32,
    taken_at: DateTime<Utc>,
) -> Result<MetricsSnapshot, DecimalRangeError> {
    let stake = &readings.stake;
    if stake.effective_amount < stake.actual_amount {
        warn!(
            "Ledger reports effective {} below actual {} for {}",
            stake.effective_amount, stake.actual_amount, account
        );
    }

    let individual_stake_date = if stake.has_stake() {
        DateTime::<Utc>::from_timestamp(stake.stake_timestamp.as_secs(), 0)
    } else {
        None
    };

    let early_withdrawal_period_secs = readings
        .early_withdrawal_period_secs
        .as_biguint()
        .to_u64()
        .unwrap_or(u64::MAX);

    Ok(MetricsSnapshot {
        apy_percent: apy_percent(&readings.reward_data.rate_per_second, &readings.total_effective),
        earned_rewards: readings.earned.to_display(decimals)?,
        total_staked_display: readings.total_actual.to_display(decimals)?,
        total_effective_display: readings.total_effective.to_display(decimals)?,
        individual_actual: stake.actual_amount.to_display(decimals)?,
        individual_effective: stake.effective_amount.to_display(decimals)?,
        individual_multiplier_percent: multiplier_percent(&stake.multiplier, decimals)?,
        individual_stake_date,
        min_bonus_period_days: seconds_to_days(&readings.min_staking_period_secs)?,
        early_withdrawal_period_days: seconds_to_days(&readings.early_withdrawal_period_secs)?,
        early_withdrawal_penalty_percent: fraction_percent(
            &readings.early_withdrawal_penalty,
            decimals,
        )?,
        total_rewards_given: readings.total_rewards.to_display(decimals)?,
        wallet_balance: readings.wallet_balance.to_display(decimals)?,
        stake_timestamp: stake.stake_timestamp,
        individual_actual_raw: stake.actual_amount.clone(),
        early_withdrawal_period_secs,
        account,
        taken_at,
    })
}
