use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::config::DisplayConfig;
use crate::domain::{Decimal, MetricsSnapshot, OperationKind};
use crate::engine::BonusCountdown;
use crate::error::AppError;

/// Snapshot rendered at display precision. Amounts and percentages are strings so no
/// client-side float parsing is involved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsView {
    pub account: String,
    pub apy_percent: String,
    pub earned_rewards: String,
    pub total_staked: String,
    pub total_effective: String,
    pub individual_actual: String,
    pub individual_effective: String,
    pub individual_multiplier_percent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual_stake_date: Option<String>,
    pub min_bonus_period_days: String,
    pub early_withdrawal_period_days: String,
    pub early_withdrawal_penalty_percent: String,
    pub total_rewards_given: String,
    pub wallet_balance: String,
    pub taken_at: String,
}

impl MetricsView {
    pub fn render(snapshot: &MetricsSnapshot, display: &DisplayConfig) -> Self {
        let amount = |d: &Decimal| d.to_fixed(display.amount_decimals);
        let percent = |d: &Decimal| d.to_fixed(display.percent_decimals);

        Self {
            account: snapshot.account.to_string(),
            apy_percent: percent(&snapshot.apy_percent),
            earned_rewards: amount(&snapshot.earned_rewards),
            total_staked: amount(&snapshot.total_staked_display),
            total_effective: amount(&snapshot.total_effective_display),
            individual_actual: amount(&snapshot.individual_actual),
            individual_effective: amount(&snapshot.individual_effective),
            individual_multiplier_percent: percent(&snapshot.individual_multiplier_percent),
            individual_stake_date: snapshot.individual_stake_date.map(|d| d.to_rfc3339()),
            min_bonus_period_days: snapshot.min_bonus_period_days.to_string(),
            early_withdrawal_period_days: snapshot.early_withdrawal_period_days.to_string(),
            early_withdrawal_penalty_percent: percent(&snapshot.early_withdrawal_penalty_percent),
            total_rewards_given: amount(&snapshot.total_rewards_given),
            wallet_balance: amount(&snapshot.wallet_balance),
            taken_at: snapshot.taken_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub account: Option<String>,
    pub busy: Option<OperationKind>,
    pub has_snapshot: bool,
}

pub async fn get_metrics(State(state): State<AppState>) -> Result<Json<MetricsView>, AppError> {
    let snapshot = state
        .engine
        .snapshot()
        .ok_or_else(|| AppError::NotFound("No metrics available yet".into()))?;
    Ok(Json(MetricsView::render(&snapshot, &state.config.display)))
}

pub async fn get_countdown(State(state): State<AppState>) -> Json<BonusCountdown> {
    Json(state.engine.countdown())
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let session = state.engine.session().current();
    Json(StatusResponse {
        account: session.account().map(|a| a.to_string()),
        busy: state.engine.orchestrator().busy(),
        has_snapshot: state.engine.snapshot().is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, BaseUnits, RewardData, StakeRecord, TimeSecs};
    use crate::engine::metrics::{derive_snapshot, LedgerReadings};
    use chrono::Utc;
    use std::str::FromStr;

    #[test]
    fn test_render_rounds_to_display_precision() {
        let readings = LedgerReadings {
            reward_data: RewardData {
                rate_per_second: BaseUnits::from(100u64),
                ..Default::default()
            },
            total_effective: BaseUnits::from_str("31536000000000000000000000").unwrap(),
            earned: BaseUnits::from_str("1234567000000000000").unwrap(),
            stake: StakeRecord {
                actual_amount: BaseUnits::from_str("100000000000000000000").unwrap(),
                effective_amount: BaseUnits::from_str("125000000000000000000").unwrap(),
                stake_timestamp: TimeSecs::new(1_700_000_000),
                multiplier: BaseUnits::from_str("1250000000000000000").unwrap(),
            },
            early_withdrawal_penalty: BaseUnits::from_str("300000000000000000").unwrap(),
            ..Default::default()
        };
        let account = Address::from_str("0x00000000000000000000000000000000000000aa").unwrap();
        let snapshot = derive_snapshot(account, &readings, 18, Utc::now()).unwrap();

        let view = MetricsView::render(&snapshot, &DisplayConfig::default());
        assert_eq!(view.apy_percent, "0.00");
        assert_eq!(view.earned_rewards, "1.2346");
        assert_eq!(view.individual_actual, "100.0000");
        assert_eq!(view.individual_multiplier_percent, "25.00");
        assert_eq!(view.early_withdrawal_penalty_percent, "30.00");
        assert!(view.individual_stake_date.is_some());
    }
}
