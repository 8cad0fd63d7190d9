//! Transaction orchestration and state synchronization against the ledger.

use crate::domain::{OperationId, OperationKind};
use crate::ledger::CallError;
use thiserror::Error;

pub mod guard;
pub mod journal;
pub mod orchestrator;
pub mod runtime;
pub mod session;
pub mod synchronizer;
pub mod waiter;

pub use guard::{Authorization, AuthorizationGuard};
pub use journal::Journal;
pub use orchestrator::{ActionReport, Orchestrator, PenaltyNotice};
pub use runtime::StakingEngine;
pub use session::{Session, SessionHandle};
pub use synchronizer::{CountdownTicker, MetricsSynchronizer, SyncError};
pub use waiter::{ConfirmationWaiter, WaitError};

/// Why a submitted (or attempted) write did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationFailure {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("operation {0} reverted")]
    Reverted(OperationId),
    #[error(transparent)]
    Wait(#[from] WaitError),
}

/// Errors reported for user-initiated actions. None of them are retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    #[error("no account connected")]
    NotConnected,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("no metrics snapshot available for the connected account")]
    NoSnapshot,
    #[error("{kind} rejected by user: {reason}")]
    UserRejected { kind: OperationKind, reason: String },
    #[error("approval {operation_id} failed; dependent action abandoned")]
    AuthorizationFailed { operation_id: OperationId },
    #[error("{kind} failed: {cause}")]
    OperationFailed {
        kind: OperationKind,
        #[source]
        cause: OperationFailure,
    },
}

impl StakingError {
    pub(crate) fn from_call(kind: OperationKind, err: CallError) -> Self {
        match err {
            CallError::UserRejected(reason) => StakingError::UserRejected { kind, reason },
            other => StakingError::OperationFailed {
                kind,
                cause: OperationFailure::Call(other),
            },
        }
    }

    /// The kind of operation the error belongs to, when one was attempted.
    pub fn kind(&self) -> Option<OperationKind> {
        match self {
            StakingError::UserRejected { kind, .. } | StakingError::OperationFailed { kind, .. } => {
                Some(*kind)
            }
            StakingError::AuthorizationFailed { .. } => Some(OperationKind::Approve),
            _ => None,
        }
    }
}
