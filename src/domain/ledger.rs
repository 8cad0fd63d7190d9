//! Raw records as the ledger service returns them.

use crate::domain::{BaseUnits, OperationId, TimeSecs};
use serde::{Deserialize, Serialize};

/// Per-asset reward parameters (`rewardData(asset)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardData {
    /// Base units of yield emitted per second across all stakers.
    pub rate_per_second: BaseUnits,
    pub last_update_time: TimeSecs,
    pub accumulated_per_unit: BaseUnits,
    pub period_end: TimeSecs,
}

/// A single account's position (`stakes(asset, account)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeRecord {
    pub actual_amount: BaseUnits,
    /// `actual_amount × multiplier`; never below `actual_amount`.
    pub effective_amount: BaseUnits,
    /// Zero when the account has never staked.
    pub stake_timestamp: TimeSecs,
    /// Fixed-point multiplier where one base unit of scale means 1.0.
    pub multiplier: BaseUnits,
}

impl StakeRecord {
    pub fn has_stake(&self) -> bool {
        self.stake_timestamp.as_secs() > 0
    }
}

/// Terminal record of a submitted write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub operation_id: OperationId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}
