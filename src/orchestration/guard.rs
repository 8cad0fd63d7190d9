//! Permission check before value-moving writes.

use crate::domain::{Address, BaseUnits, OperationId, OperationKind, OperationStatus, PendingOperation};
use crate::ledger::{CallInterface, ReadField, WriteCall};
use crate::orchestration::journal::Journal;
use crate::orchestration::waiter::ConfirmationWaiter;
use crate::orchestration::{OperationFailure, StakingError};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Existing allowance already covered the amount; nothing was submitted.
    Sufficient { allowance: BaseUnits },
    /// An approval was submitted and confirmed.
    Granted { operation_id: OperationId },
}

/// Ensures the ledger may move at least the required amount of the owner's asset.
///
/// Check-then-act is not atomic, which is fine: only the owner changes their own allowance.
#[derive(Clone)]
pub struct AuthorizationGuard {
    ledger: Arc<dyn CallInterface>,
    waiter: ConfirmationWaiter,
    journal: Journal,
    token: Address,
    spender: Address,
}

impl AuthorizationGuard {
    pub fn new(
        ledger: Arc<dyn CallInterface>,
        waiter: ConfirmationWaiter,
        journal: Journal,
        token: Address,
        spender: Address,
    ) -> Self {
        Self {
            ledger,
            waiter,
            journal,
            token,
            spender,
        }
    }

    pub async fn ensure(
        &self,
        owner: &Address,
        required: &BaseUnits,
    ) -> Result<Authorization, StakingError> {
        let allowance = self
            .ledger
            .read(&ReadField::Allowance {
                token: self.token.clone(),
                owner: owner.clone(),
                spender: self.spender.clone(),
            })
            .await
            .and_then(|v| v.into_uint())
            .map_err(|e| StakingError::from_call(OperationKind::Approve, e))?;

        if &allowance >= required {
            debug!("Sufficient allowance found: {}", allowance);
            return Ok(Authorization::Sufficient { allowance });
        }

        let id = self
            .ledger
            .submit(
                owner,
                &WriteCall::Approve {
                    token: self.token.clone(),
                    spender: self.spender.clone(),
                    amount: required.clone(),
                },
            )
            .await
            .map_err(|e| StakingError::from_call(OperationKind::Approve, e))?;
        info!("Approval submitted: {} (allowance {} < {})", id, allowance, required);

        let mut op = PendingOperation::submitted(
            OperationKind::Approve,
            id.clone(),
            owner.clone(),
            Some(required.clone()),
        );
        self.journal.record(&op).await;

        match self.waiter.wait(&id).await {
            Ok(receipt) if receipt.success => {
                op.resolve(OperationStatus::Confirmed, None);
                self.journal.resolve(&op).await;
                info!("Approval confirmed: {}", id);
                Ok(Authorization::Granted { operation_id: id })
            }
            Ok(_) => {
                op.resolve(OperationStatus::Failed, Some("approval reverted".to_string()));
                self.journal.resolve(&op).await;
                warn!("Approval failed: {}", id);
                Err(StakingError::AuthorizationFailed { operation_id: id })
            }
            Err(e) => Err(StakingError::OperationFailed {
                kind: OperationKind::Approve,
                cause: OperationFailure::Wait(e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, Repository};
    use crate::ledger::{MockLedger, ReceiptScript};
    use std::str::FromStr;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    const E18: &str = "000000000000000000";

    fn addr(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    fn units(s: &str) -> BaseUnits {
        BaseUnits::from_str(s).unwrap()
    }

    async fn setup(mock: &MockLedger) -> (AuthorizationGuard, Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("journal.db")
            .to_string_lossy()
            .to_string();
        let repo = Arc::new(Repository::new(init_db(&db_path).await.unwrap()));
        let ledger: Arc<dyn CallInterface> = Arc::new(mock.clone());
        let waiter = ConfirmationWaiter::new(
            ledger.clone(),
            Duration::from_millis(5),
            None,
            CancellationToken::new(),
        );
        let guard = AuthorizationGuard::new(
            ledger,
            waiter,
            Journal::new(repo.clone()),
            addr("0x38b54f147303887bd2e932373432ffcbd11ff6a5"),
            addr("0x22fa4f932595114e2115d85320b6d9152447e226"),
        );
        (guard, repo, temp_dir)
    }

    fn owner() -> Address {
        addr("0x00000000000000000000000000000000000000aa")
    }

    #[tokio::test]
    async fn test_equal_allowance_is_sufficient() {
        let mock = MockLedger::new().with_allowance(units(&format!("500{}", E18)));
        let (guard, _repo, _temp) = setup(&mock).await;

        let auth = guard
            .ensure(&owner(), &units(&format!("500{}", E18)))
            .await
            .unwrap();
        assert!(matches!(auth, Authorization::Sufficient { .. }));
        assert!(mock.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_allowance_approves_exact_amount() {
        let mock = MockLedger::new().with_allowance(units("10"));
        let (guard, repo, _temp) = setup(&mock).await;

        let auth = guard.ensure(&owner(), &units("11")).await.unwrap();
        let Authorization::Granted { operation_id } = auth else {
            panic!("expected approval");
        };
        assert_eq!(
            mock.submissions(),
            vec![WriteCall::Approve {
                token: addr("0x38b54f147303887bd2e932373432ffcbd11ff6a5"),
                spender: addr("0x22fa4f932595114e2115d85320b6d9152447e226"),
                amount: units("11"),
            }]
        );

        let journaled = repo.get_operation(&operation_id).await.unwrap().unwrap();
        assert_eq!(journaled.status, OperationStatus::Confirmed);

        // Second call sees the granted allowance and does nothing.
        guard.ensure(&owner(), &units("11")).await.unwrap();
        assert_eq!(mock.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_reverted_approval_is_authorization_failure() {
        let mock = MockLedger::new().with_receipt("approve", ReceiptScript::Failure);
        let (guard, repo, _temp) = setup(&mock).await;

        let err = guard.ensure(&owner(), &units("1")).await.unwrap_err();
        let StakingError::AuthorizationFailed { operation_id } = err else {
            panic!("expected AuthorizationFailed, got {:?}", err);
        };
        let journaled = repo.get_operation(&operation_id).await.unwrap().unwrap();
        assert_eq!(journaled.status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_rejected_approval_surfaces_user_rejected() {
        let mock = MockLedger::new();
        mock.fail_submissions(crate::ledger::CallError::UserRejected("denied".into()));
        let (guard, _repo, _temp) = setup(&mock).await;

        let err = guard.ensure(&owner(), &units("1")).await.unwrap_err();
        assert!(matches!(
            err,
            StakingError::UserRejected {
                kind: OperationKind::Approve,
                ..
            }
        ));
    }
}
