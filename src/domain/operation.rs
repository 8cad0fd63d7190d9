//! User-initiated ledger writes and their lifecycle.

use crate::domain::{Address, BaseUnits, OperationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Approve,
    Stake,
    Unstake,
    Claim,
    RefreshMultiplier,
    WithdrawAll,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Approve => "approve",
            OperationKind::Stake => "stake",
            OperationKind::Unstake => "unstake",
            OperationKind::Claim => "claim",
            OperationKind::RefreshMultiplier => "refresh_multiplier",
            OperationKind::WithdrawAll => "withdraw_all",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(OperationKind::Approve),
            "stake" => Ok(OperationKind::Stake),
            "unstake" => Ok(OperationKind::Unstake),
            "claim" => Ok(OperationKind::Claim),
            "refresh_multiplier" => Ok(OperationKind::RefreshMultiplier),
            "withdraw_all" => Ok(OperationKind::WithdrawAll),
            other => Err(format!("unknown operation kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Submitted,
    Confirmed,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Submitted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Submitted => "submitted",
            OperationStatus::Confirmed => "confirmed",
            OperationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(OperationStatus::Submitted),
            "confirmed" => Ok(OperationStatus::Confirmed),
            "failed" => Ok(OperationStatus::Failed),
            other => Err(format!("unknown operation status: {}", other)),
        }
    }
}

/// A write the client has submitted and is tracking until it reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Local identifier, stable across journal updates.
    pub action_id: Uuid,
    pub kind: OperationKind,
    pub submitted_id: OperationId,
    pub status: OperationStatus,
    pub account: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<BaseUnits>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PendingOperation {
    pub fn submitted(
        kind: OperationKind,
        submitted_id: OperationId,
        account: Address,
        amount: Option<BaseUnits>,
    ) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            kind,
            submitted_id,
            status: OperationStatus::Submitted,
            account,
            amount,
            submitted_at: Utc::now(),
            resolved_at: None,
            detail: None,
        }
    }

    /// Move to a terminal status. Resolving twice keeps the first outcome.
    pub fn resolve(&mut self, status: OperationStatus, detail: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.detail = detail;
        self.resolved_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Address {
        Address::from_str("0x00000000000000000000000000000000000000aa").unwrap()
    }

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [
            OperationKind::Approve,
            OperationKind::Stake,
            OperationKind::Unstake,
            OperationKind::Claim,
            OperationKind::RefreshMultiplier,
            OperationKind::WithdrawAll,
        ] {
            assert_eq!(OperationKind::from_str(kind.as_str()), Ok(kind));
        }
        assert!(OperationKind::from_str("deposit").is_err());
    }

    #[test]
    fn test_resolve_is_sticky() {
        let mut op = PendingOperation::submitted(
            OperationKind::Claim,
            OperationId::new("0x01"),
            account(),
            None,
        );
        assert_eq!(op.status, OperationStatus::Submitted);
        assert!(op.resolved_at.is_none());

        op.resolve(OperationStatus::Failed, Some("reverted".to_string()));
        op.resolve(OperationStatus::Confirmed, None);

        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.detail.as_deref(), Some("reverted"));
        assert!(op.resolved_at.is_some());
    }
}
