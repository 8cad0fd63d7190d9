use crate::config::ConfirmationMode;
use crate::domain::{
    Address, BaseUnits, Decimal, MetricsSnapshot, OperationId, OperationKind, OperationStatus,
    PendingOperation, Receipt, TimeSecs,
};
use crate::ledger::{CallInterface, WriteCall};
use crate::orchestration::guard::{Authorization, AuthorizationGuard};
use crate::orchestration::journal::Journal;
use crate::orchestration::session::SessionHandle;
use crate::orchestration::waiter::{ConfirmationWaiter, WaitError};
use crate::orchestration::{OperationFailure, StakingError};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Outcome of one user-initiated action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReport {
    pub kind: OperationKind,
    pub operation_id: OperationId,
    /// `Submitted` only in detached mode.
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<OperationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_notice: Option<PenaltyNotice>,
}

/// Warning attached to withdrawals made inside the early-withdrawal period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyNotice {
    pub advertised_percent: Decimal,
    pub ledger_percent: Decimal,
    /// The advertised figure and the ledger's own penalty disagree.
    pub mismatch: bool,
}

/// Dependencies and settings an [`Orchestrator`] is built from.
pub struct OrchestratorParts {
    pub ledger: Arc<dyn CallInterface>,
    pub waiter: ConfirmationWaiter,
    pub journal: Journal,
    pub session: SessionHandle,
    pub snapshots: watch::Receiver<Option<Arc<MetricsSnapshot>>>,
    pub tracker: TaskTracker,
    pub asset: Address,
    pub spender: Address,
    pub mode: ConfirmationMode,
    pub advertised_penalty_percent: Decimal,
}

/// One entry point per action kind. Writes are submitted at most once per call; failures are
/// reported and never retried.
pub struct Orchestrator {
    ledger: Arc<dyn CallInterface>,
    guard: AuthorizationGuard,
    waiter: ConfirmationWaiter,
    journal: Journal,
    session: SessionHandle,
    snapshots: watch::Receiver<Option<Arc<MetricsSnapshot>>>,
    busy: watch::Sender<Vec<OperationKind>>,
    tracker: TaskTracker,
    asset: Address,
    mode: ConfirmationMode,
    advertised_penalty_percent: Decimal,
}

/// Removes its action from the in-flight set when the action ends, however it ends.
struct BusyGuard<'a> {
    busy: &'a watch::Sender<Vec<OperationKind>>,
    kind: OperationKind,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let kind = self.kind;
        self.busy.send_modify(|in_flight| {
            if let Some(pos) = in_flight.iter().rposition(|k| *k == kind) {
                in_flight.remove(pos);
            }
        });
    }
}

impl Orchestrator {
    pub fn new(parts: OrchestratorParts) -> Self {
        let guard = AuthorizationGuard::new(
            parts.ledger.clone(),
            parts.waiter.clone(),
            parts.journal.clone(),
            parts.asset.clone(),
            parts.spender,
        );
        let (busy, _) = watch::channel(Vec::new());
        Self {
            ledger: parts.ledger,
            guard,
            waiter: parts.waiter,
            journal: parts.journal,
            session: parts.session,
            snapshots: parts.snapshots,
            busy,
            tracker: parts.tracker,
            asset: parts.asset,
            mode: parts.mode,
            advertised_penalty_percent: parts.advertised_penalty_percent,
        }
    }

    /// The most recently started action still in flight, if any.
    pub fn busy(&self) -> Option<OperationKind> {
        self.busy.borrow().last().copied()
    }

    /// Number of actions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.busy.borrow().len()
    }

    fn begin(&self, kind: OperationKind) -> BusyGuard<'_> {
        self.busy.send_modify(|in_flight| in_flight.push(kind));
        BusyGuard {
            busy: &self.busy,
            kind,
        }
    }

    pub async fn stake(&self, amount: BaseUnits) -> Result<ActionReport, StakingError> {
        let account = self.session.current().require_account()?;
        require_positive(&amount)?;
        let _busy = self.begin(OperationKind::Stake);

        let approval_id = match self.guard.ensure(&account, &amount).await? {
            Authorization::Sufficient { .. } => None,
            Authorization::Granted { operation_id } => Some(operation_id),
        };

        let write = WriteCall::Stake {
            asset: self.asset.clone(),
            amount,
        };
        let mut report = self.execute(&account, write).await?;
        report.approval_id = approval_id;
        Ok(report)
    }

    pub async fn unstake(&self, amount: BaseUnits) -> Result<ActionReport, StakingError> {
        let account = self.session.current().require_account()?;
        require_positive(&amount)?;
        let _busy = self.begin(OperationKind::Unstake);

        let notice = self.penalty_notice(&account);
        let write = WriteCall::Withdraw {
            asset: self.asset.clone(),
            amount,
        };
        let mut report = self.execute(&account, write).await?;
        report.penalty_notice = notice;
        Ok(report)
    }

    /// Withdraw `percentage`% of the actual stake in the latest snapshot. 100% is a
    /// full withdrawal rather than a rounded amount.
    pub async fn unstake_by_percentage(
        &self,
        percentage: u32,
    ) -> Result<ActionReport, StakingError> {
        let account = self.session.current().require_account()?;
        if percentage == 0 || percentage > 100 {
            return Err(StakingError::InvalidAmount(format!(
                "percentage must be between 1 and 100, got {}",
                percentage
            )));
        }
        if percentage == 100 {
            return self.withdraw_all().await;
        }

        let actual = self
            .latest_snapshot(&account)
            .map(|s| s.individual_actual_raw.clone())
            .ok_or(StakingError::NoSnapshot)?;
        let amount = actual.percentage(percentage);
        if amount.is_zero() {
            return Err(StakingError::InvalidAmount(format!(
                "{}% of stake {} is zero",
                percentage, actual
            )));
        }
        self.unstake(amount).await
    }

    pub async fn claim_rewards(&self) -> Result<ActionReport, StakingError> {
        let account = self.session.current().require_account()?;
        let _busy = self.begin(OperationKind::Claim);
        let write = WriteCall::ClaimReward {
            asset: self.asset.clone(),
        };
        self.execute(&account, write).await
    }

    /// Not gated on the bonus countdown; the ledger enforces its own policy.
    pub async fn refresh_multiplier(&self) -> Result<ActionReport, StakingError> {
        let account = self.session.current().require_account()?;
        let _busy = self.begin(OperationKind::RefreshMultiplier);
        let write = WriteCall::UpdateUserMultiplier {
            asset: self.asset.clone(),
        };
        self.execute(&account, write).await
    }

    pub async fn withdraw_all(&self) -> Result<ActionReport, StakingError> {
        let account = self.session.current().require_account()?;
        let _busy = self.begin(OperationKind::WithdrawAll);

        let notice = self.penalty_notice(&account);
        let write = WriteCall::WithdrawAll {
            asset: self.asset.clone(),
        };
        let mut report = self.execute(&account, write).await?;
        report.penalty_notice = notice;
        Ok(report)
    }

    /// Submit once, journal, then wait or hand the wait to a tracked background task.
    async fn execute(
        &self,
        account: &Address,
        write: WriteCall,
    ) -> Result<ActionReport, StakingError> {
        let kind = write.kind();
        let id = self
            .ledger
            .submit(account, &write)
            .await
            .map_err(|e| StakingError::from_call(kind, e))?;
        info!("{} submitted: {}", kind, id);

        let mut op = PendingOperation::submitted(kind, id.clone(), account.clone(), write.amount().cloned());
        self.journal.record(&op).await;

        let status = match self.mode {
            ConfirmationMode::Detached => {
                let waiter = self.waiter.clone();
                let journal = self.journal.clone();
                self.tracker.spawn(async move {
                    let outcome = waiter.wait(&op.submitted_id).await;
                    if let Err(e) = settle(&journal, &mut op, outcome).await {
                        warn!("{}", e);
                    }
                });
                OperationStatus::Submitted
            }
            ConfirmationMode::Blocking => {
                let outcome = self.waiter.wait(&id).await;
                settle(&self.journal, &mut op, outcome).await?
            }
        };

        Ok(ActionReport {
            kind,
            operation_id: id,
            status,
            approval_id: None,
            penalty_notice: None,
        })
    }

    fn latest_snapshot(&self, account: &Address) -> Option<Arc<MetricsSnapshot>> {
        self.snapshots
            .borrow()
            .as_ref()
            .filter(|s| &s.account == account)
            .cloned()
    }

    fn penalty_notice(&self, account: &Address) -> Option<PenaltyNotice> {
        let snapshot = self.latest_snapshot(account)?;
        if !snapshot.in_early_withdrawal_period(TimeSecs::now()) {
            return None;
        }

        let ledger_percent = snapshot.early_withdrawal_penalty_percent;
        let advertised_percent = self.advertised_penalty_percent;
        let mismatch = ledger_percent != advertised_percent;
        warn!(
            "Early withdrawal: advertised penalty {}%, ledger penalty {}%{}",
            advertised_percent,
            ledger_percent,
            if mismatch { " (mismatch)" } else { "" }
        );
        Some(PenaltyNotice {
            advertised_percent,
            ledger_percent,
            mismatch,
        })
    }
}

/// Classify the wait outcome and journal it.
async fn settle(
    journal: &Journal,
    op: &mut PendingOperation,
    outcome: Result<Receipt, WaitError>,
) -> Result<OperationStatus, StakingError> {
    let kind = op.kind;
    match outcome {
        Ok(receipt) if receipt.success => {
            op.resolve(OperationStatus::Confirmed, None);
            journal.resolve(op).await;
            info!("{} confirmed: {}", kind, op.submitted_id);
            Ok(OperationStatus::Confirmed)
        }
        Ok(receipt) => {
            op.resolve(OperationStatus::Failed, Some("reverted".to_string()));
            journal.resolve(op).await;
            warn!("{} failed: {}", kind, op.submitted_id);
            Err(StakingError::OperationFailed {
                kind,
                cause: OperationFailure::Reverted(receipt.operation_id),
            })
        }
        Err(e) => {
            // Still pending on the ledger; the journal keeps it as submitted.
            debug!("{} {} left unresolved: {}", kind, op.submitted_id, e);
            Err(StakingError::OperationFailed {
                kind,
                cause: OperationFailure::Wait(e),
            })
        }
    }
}

fn require_positive(amount: &BaseUnits) -> Result<(), StakingError> {
    if amount.is_zero() {
        return Err(StakingError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
