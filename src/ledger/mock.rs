//! Scripted in-memory ledger for tests and offline runs.

use super::{CallError, CallInterface, ReadField, ReadValue, WriteCall};
use crate::domain::{Address, BaseUnits, OperationId, Receipt, RewardData, StakeRecord};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// How the receipt for a submitted write behaves when polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptScript {
    /// Receipt available on the first poll.
    Success,
    Failure,
    /// Pending for `pending_polls` polls, then resolves.
    AfterPolls { pending_polls: u32, success: bool },
    /// Never mined.
    Never,
}

#[derive(Debug)]
struct MockState {
    reward_data: RewardData,
    total_effective: BaseUnits,
    total_actual: BaseUnits,
    earned: BaseUnits,
    stake: StakeRecord,
    min_staking_period: BaseUnits,
    early_withdrawal_period: BaseUnits,
    early_withdrawal_penalty: BaseUnits,
    total_rewards: BaseUnits,
    allowance: BaseUnits,
    balance: BaseUnits,
    receipt_scripts: HashMap<&'static str, ReceiptScript>,
    pending: HashMap<OperationId, (ReceiptScript, u32)>,
    submissions: Vec<WriteCall>,
    reads: Vec<&'static str>,
    failing_reads: HashSet<&'static str>,
    submit_error: Option<CallError>,
    next_id: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            reward_data: RewardData::default(),
            total_effective: BaseUnits::zero(),
            total_actual: BaseUnits::zero(),
            earned: BaseUnits::zero(),
            stake: StakeRecord::default(),
            min_staking_period: BaseUnits::zero(),
            early_withdrawal_period: BaseUnits::zero(),
            early_withdrawal_penalty: BaseUnits::zero(),
            total_rewards: BaseUnits::zero(),
            allowance: BaseUnits::zero(),
            balance: BaseUnits::zero(),
            receipt_scripts: HashMap::new(),
            pending: HashMap::new(),
            submissions: Vec::new(),
            reads: Vec::new(),
            failing_reads: HashSet::new(),
            submit_error: None,
            next_id: 1,
        }
    }
}

/// Mock ledger holding a single asset/account position.
///
/// Clones share state, so a test can keep a handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<MockState>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_reward_data(self, reward_data: RewardData) -> Self {
        self.state().reward_data = reward_data;
        self
    }

    pub fn with_totals(self, actual: BaseUnits, effective: BaseUnits) -> Self {
        {
            let mut s = self.state();
            s.total_actual = actual;
            s.total_effective = effective;
        }
        self
    }

    pub fn with_earned(self, earned: BaseUnits) -> Self {
        self.state().earned = earned;
        self
    }

    pub fn with_stake(self, stake: StakeRecord) -> Self {
        self.set_stake(stake);
        self
    }

    pub fn with_config(
        self,
        min_staking_period_secs: u64,
        early_withdrawal_period_secs: u64,
        early_withdrawal_penalty: BaseUnits,
    ) -> Self {
        {
            let mut s = self.state();
            s.min_staking_period = BaseUnits::from(min_staking_period_secs);
            s.early_withdrawal_period = BaseUnits::from(early_withdrawal_period_secs);
            s.early_withdrawal_penalty = early_withdrawal_penalty;
        }
        self
    }

    pub fn with_total_rewards(self, total: BaseUnits) -> Self {
        self.state().total_rewards = total;
        self
    }

    pub fn with_allowance(self, allowance: BaseUnits) -> Self {
        self.state().allowance = allowance;
        self
    }

    pub fn with_balance(self, balance: BaseUnits) -> Self {
        self.state().balance = balance;
        self
    }

    /// Receipt behavior for every write named `write_name` (e.g. `"approve"`).
    pub fn with_receipt(self, write_name: &'static str, script: ReceiptScript) -> Self {
        self.state().receipt_scripts.insert(write_name, script);
        self
    }

    pub fn set_stake(&self, stake: StakeRecord) {
        self.state().stake = stake;
    }

    pub fn set_total_effective(&self, effective: BaseUnits) {
        self.state().total_effective = effective;
    }

    pub fn fail_read(&self, field_name: &'static str) {
        self.state().failing_reads.insert(field_name);
    }

    pub fn restore_read(&self, field_name: &'static str) {
        self.state().failing_reads.remove(field_name);
    }

    /// Make every subsequent submission fail with `err`.
    pub fn fail_submissions(&self, err: CallError) {
        self.state().submit_error = Some(err);
    }

    pub fn submissions(&self) -> Vec<WriteCall> {
        self.state().submissions.clone()
    }

    pub fn submitted_names(&self) -> Vec<&'static str> {
        self.state().submissions.iter().map(|w| w.name()).collect()
    }

    pub fn read_count(&self, field_name: &str) -> usize {
        self.state().reads.iter().filter(|n| **n == field_name).count()
    }

    pub fn allowance(&self) -> BaseUnits {
        self.state().allowance.clone()
    }
}

#[async_trait]
impl CallInterface for MockLedger {
    async fn read(&self, field: &ReadField) -> Result<ReadValue, CallError> {
        let mut s = self.state();
        s.reads.push(field.name());
        if s.failing_reads.contains(field.name()) {
            return Err(CallError::RemoteUnavailable(format!(
                "mock read failure: {}",
                field.name()
            )));
        }

        let value = match field {
            ReadField::RewardData { .. } => ReadValue::RewardData(s.reward_data.clone()),
            ReadField::TotalEffectiveStaked { .. } => ReadValue::Uint(s.total_effective.clone()),
            ReadField::TotalActualStaked { .. } => ReadValue::Uint(s.total_actual.clone()),
            ReadField::Earned { .. } => ReadValue::Uint(s.earned.clone()),
            ReadField::Stakes { .. } => ReadValue::Stake(s.stake.clone()),
            ReadField::MinStakingPeriod => ReadValue::Uint(s.min_staking_period.clone()),
            ReadField::EarlyWithdrawalPeriod => ReadValue::Uint(s.early_withdrawal_period.clone()),
            ReadField::EarlyWithdrawalPenalty => {
                ReadValue::Uint(s.early_withdrawal_penalty.clone())
            }
            ReadField::TotalRewardsAccumulated { .. } => ReadValue::Uint(s.total_rewards.clone()),
            ReadField::Allowance { .. } => ReadValue::Uint(s.allowance.clone()),
            ReadField::BalanceOf { .. } => ReadValue::Uint(s.balance.clone()),
            ReadField::Receipt { id } => {
                let Some((script, polls)) = s.pending.get_mut(id) else {
                    return Ok(ReadValue::Receipt(None));
                };
                *polls += 1;
                let success = match *script {
                    ReceiptScript::Success => Some(true),
                    ReceiptScript::Failure => Some(false),
                    ReceiptScript::AfterPolls {
                        pending_polls,
                        success,
                    } => (*polls > pending_polls).then_some(success),
                    ReceiptScript::Never => None,
                };
                ReadValue::Receipt(success.map(|success| Receipt {
                    operation_id: id.clone(),
                    success,
                    block_number: None,
                }))
            }
        };
        Ok(value)
    }

    async fn submit(&self, _from: &Address, write: &WriteCall) -> Result<OperationId, CallError> {
        let mut s = self.state();
        if let Some(err) = s.submit_error.clone() {
            return Err(err);
        }

        let id = OperationId::new(format!("0x{:064x}", s.next_id));
        s.next_id += 1;
        s.submissions.push(write.clone());

        let script = s
            .receipt_scripts
            .get(write.name())
            .copied()
            .unwrap_or(ReceiptScript::Success);
        if let WriteCall::Approve { amount, .. } = write {
            if !matches!(script, ReceiptScript::Failure) {
                s.allowance = amount.clone();
            }
        }
        s.pending.insert(id.clone(), (script, 0));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    fn asset() -> Address {
        addr("0x38b54f147303887bd2e932373432ffcbd11ff6a5")
    }

    #[tokio::test]
    async fn test_mock_records_submissions_and_ids() {
        let mock = MockLedger::new();
        let from = addr("0x00000000000000000000000000000000000000aa");
        let id1 = mock
            .submit(&from, &WriteCall::ClaimReward { asset: asset() })
            .await
            .unwrap();
        let id2 = mock
            .submit(&from, &WriteCall::WithdrawAll { asset: asset() })
            .await
            .unwrap();
        assert_ne!(id1, id2);
        assert_eq!(mock.submitted_names(), vec!["claimReward", "withdrawAll"]);
    }

    #[tokio::test]
    async fn test_mock_receipt_after_polls() {
        let mock = MockLedger::new().with_receipt(
            "claimReward",
            ReceiptScript::AfterPolls {
                pending_polls: 2,
                success: false,
            },
        );
        let from = addr("0x00000000000000000000000000000000000000aa");
        let id = mock
            .submit(&from, &WriteCall::ClaimReward { asset: asset() })
            .await
            .unwrap();

        let field = ReadField::Receipt { id };
        assert_eq!(mock.read(&field).await.unwrap(), ReadValue::Receipt(None));
        assert_eq!(mock.read(&field).await.unwrap(), ReadValue::Receipt(None));
        let receipt = mock.read(&field).await.unwrap().into_receipt().unwrap();
        assert!(!receipt.unwrap().success);
        assert_eq!(mock.read_count("receipt"), 3);
    }

    #[tokio::test]
    async fn test_mock_failing_read() {
        let mock = MockLedger::new();
        mock.fail_read("earned");
        let result = mock
            .read(&ReadField::Earned {
                asset: asset(),
                account: asset(),
            })
            .await;
        assert!(matches!(result, Err(CallError::RemoteUnavailable(_))));
        mock.restore_read("earned");
        assert!(mock
            .read(&ReadField::Earned {
                asset: asset(),
                account: asset(),
            })
            .await
            .is_ok());
    }
}
