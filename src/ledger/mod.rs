//! Call interface to the staking ledger: typed reads and fire-and-forget writes.

use crate::domain::{
    Address, BaseUnits, OperationId, OperationKind, Receipt, RewardData, StakeRecord,
};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod abi;
pub mod mock;
pub mod rpc;

pub use mock::{MockLedger, ReceiptScript};
pub use rpc::JsonRpcLedger;

/// A named ledger field and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadField {
    RewardData { asset: Address },
    TotalEffectiveStaked { asset: Address },
    TotalActualStaked { asset: Address },
    Earned { asset: Address, account: Address },
    Stakes { asset: Address, account: Address },
    MinStakingPeriod,
    EarlyWithdrawalPeriod,
    EarlyWithdrawalPenalty,
    TotalRewardsAccumulated { asset: Address },
    /// Served by the asset itself rather than the ledger.
    Allowance { token: Address, owner: Address, spender: Address },
    BalanceOf { token: Address, account: Address },
    Receipt { id: OperationId },
}

impl ReadField {
    pub fn name(&self) -> &'static str {
        match self {
            ReadField::RewardData { .. } => "rewardData",
            ReadField::TotalEffectiveStaked { .. } => "totalEffectiveStaked",
            ReadField::TotalActualStaked { .. } => "totalActualStaked",
            ReadField::Earned { .. } => "earned",
            ReadField::Stakes { .. } => "stakes",
            ReadField::MinStakingPeriod => "minStakingPeriod",
            ReadField::EarlyWithdrawalPeriod => "earlyWithdrawalPeriod",
            ReadField::EarlyWithdrawalPenalty => "earlyWithdrawalPenalty",
            ReadField::TotalRewardsAccumulated { .. } => "totalRewardsAccumulated",
            ReadField::Allowance { .. } => "allowance",
            ReadField::BalanceOf { .. } => "balanceOf",
            ReadField::Receipt { .. } => "receipt",
        }
    }
}

/// Value returned for a [`ReadField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadValue {
    Uint(BaseUnits),
    RewardData(RewardData),
    Stake(StakeRecord),
    /// `None` while the write is still pending.
    Receipt(Option<Receipt>),
}

impl ReadValue {
    fn shape(&self) -> &'static str {
        match self {
            ReadValue::Uint(_) => "uint",
            ReadValue::RewardData(_) => "rewardData",
            ReadValue::Stake(_) => "stake",
            ReadValue::Receipt(_) => "receipt",
        }
    }

    pub fn into_uint(self) -> Result<BaseUnits, CallError> {
        match self {
            ReadValue::Uint(v) => Ok(v),
            other => Err(CallError::unexpected("uint", &other)),
        }
    }

    pub fn into_reward_data(self) -> Result<RewardData, CallError> {
        match self {
            ReadValue::RewardData(v) => Ok(v),
            other => Err(CallError::unexpected("rewardData", &other)),
        }
    }

    pub fn into_stake(self) -> Result<StakeRecord, CallError> {
        match self {
            ReadValue::Stake(v) => Ok(v),
            other => Err(CallError::unexpected("stake", &other)),
        }
    }

    pub fn into_receipt(self) -> Result<Option<Receipt>, CallError> {
        match self {
            ReadValue::Receipt(v) => Ok(v),
            other => Err(CallError::unexpected("receipt", &other)),
        }
    }
}

/// A write against the ledger (or, for `Approve`, against the asset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    Approve { token: Address, spender: Address, amount: BaseUnits },
    Stake { asset: Address, amount: BaseUnits },
    Withdraw { asset: Address, amount: BaseUnits },
    ClaimReward { asset: Address },
    UpdateUserMultiplier { asset: Address },
    WithdrawAll { asset: Address },
}

impl WriteCall {
    pub fn name(&self) -> &'static str {
        match self {
            WriteCall::Approve { .. } => "approve",
            WriteCall::Stake { .. } => "stake",
            WriteCall::Withdraw { .. } => "withdraw",
            WriteCall::ClaimReward { .. } => "claimReward",
            WriteCall::UpdateUserMultiplier { .. } => "updateUserMultiplier",
            WriteCall::WithdrawAll { .. } => "withdrawAll",
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            WriteCall::Approve { .. } => OperationKind::Approve,
            WriteCall::Stake { .. } => OperationKind::Stake,
            WriteCall::Withdraw { .. } => OperationKind::Unstake,
            WriteCall::ClaimReward { .. } => OperationKind::Claim,
            WriteCall::UpdateUserMultiplier { .. } => OperationKind::RefreshMultiplier,
            WriteCall::WithdrawAll { .. } => OperationKind::WithdrawAll,
        }
    }

    pub fn amount(&self) -> Option<&BaseUnits> {
        match self {
            WriteCall::Approve { amount, .. }
            | WriteCall::Stake { amount, .. }
            | WriteCall::Withdraw { amount, .. } => Some(amount),
            _ => None,
        }
    }
}

/// Transport-level failures. Nothing at this layer is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("ledger unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("user rejected the request: {0}")]
    UserRejected(String),
    #[error("malformed ledger response: {0}")]
    Decode(String),
}

impl CallError {
    fn unexpected(expected: &str, got: &ReadValue) -> Self {
        CallError::Decode(format!("expected {} value, got {}", expected, got.shape()))
    }
}

/// The only boundary to the ledger service.
///
/// Implementations perform exactly one remote request per call and never retry.
#[async_trait]
pub trait CallInterface: Send + Sync + fmt::Debug {
    /// Read a named field.
    async fn read(&self, field: &ReadField) -> Result<ReadValue, CallError>;

    /// Submit a write signed by `from`. Returns as soon as the ledger accepts it; the outcome
    /// is observed later through [`ReadField::Receipt`].
    async fn submit(&self, from: &Address, write: &WriteCall) -> Result<OperationId, CallError>;
}
