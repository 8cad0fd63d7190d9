//! Receipt polling: turns a submitted operation id into a confirmed or failed outcome.

use crate::domain::{OperationId, Receipt};
use crate::ledger::{CallError, CallInterface, ReadField};
use backoff::backoff::Backoff;
use backoff::future::retry_notify;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("no receipt for {id} after {attempts} polls")]
    Timeout { id: OperationId, attempts: u32 },
    #[error("confirmation wait for {id} cancelled")]
    Cancelled { id: OperationId },
}

#[derive(Debug)]
enum PollError {
    Pending,
    Remote(CallError),
    Stop(WaitError),
}

/// Polls the receipt lookup at a fixed interval until a receipt appears.
///
/// Only ever reads: a waiter never submits anything. Without `max_attempts` the wait is
/// unbounded and ends only on a receipt or cancellation of its token.
#[derive(Debug, Clone)]
pub struct ConfirmationWaiter {
    ledger: Arc<dyn CallInterface>,
    poll_interval: Duration,
    max_attempts: Option<u32>,
    cancel: CancellationToken,
}

impl ConfirmationWaiter {
    pub fn new(
        ledger: Arc<dyn CallInterface>,
        poll_interval: Duration,
        max_attempts: Option<u32>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ledger,
            poll_interval,
            max_attempts,
            cancel,
        }
    }

    fn schedule(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.poll_interval)
            .with_max_interval(self.poll_interval)
            .with_multiplier(1.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build();
        backoff.reset();
        backoff
    }

    /// Wait for the receipt of `id`. A receipt with a failure flag is still `Ok`; callers
    /// classify it through [`Receipt::success`].
    pub async fn wait(&self, id: &OperationId) -> Result<Receipt, WaitError> {
        let field = &ReadField::Receipt { id: id.clone() };
        let attempts = &AtomicU32::new(0);

        let poll = move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let pending = match self.ledger.read(field).await {
                Ok(value) => match value.into_receipt() {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => PollError::Pending,
                    Err(e) => PollError::Remote(e),
                },
                Err(e) => PollError::Remote(e),
            };

            match self.max_attempts {
                Some(max) if attempt >= max => Err(backoff::Error::permanent(PollError::Stop(
                    WaitError::Timeout {
                        id: id.clone(),
                        attempts: attempt,
                    },
                ))),
                _ => Err(backoff::Error::transient(pending)),
            }
        };

        let notify = |err: PollError, next: Duration| match err {
            PollError::Remote(e) => warn!("Receipt lookup for {} failed, retrying in {:?}: {}", id, next, e),
            _ => debug!("Receipt for {} pending, next poll in {:?}", id, next),
        };

        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Stopped waiting for {}", id);
                Err(WaitError::Cancelled { id: id.clone() })
            }
            result = retry_notify(self.schedule(), poll, notify) => {
                result.map_err(|e| match e {
                    PollError::Stop(err) => err,
                    PollError::Pending | PollError::Remote(_) => WaitError::Timeout {
                        id: id.clone(),
                        attempts: attempts.load(Ordering::Relaxed),
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use crate::ledger::{CallInterface, MockLedger, ReceiptScript, WriteCall};
    use std::str::FromStr;

    fn asset() -> Address {
        Address::from_str("0x38b54f147303887bd2e932373432ffcbd11ff6a5").unwrap()
    }

    async fn submit_claim(mock: &MockLedger) -> OperationId {
        mock.submit(&asset(), &WriteCall::ClaimReward { asset: asset() })
            .await
            .unwrap()
    }

    fn waiter(mock: &MockLedger, max_attempts: Option<u32>) -> ConfirmationWaiter {
        ConfirmationWaiter::new(
            Arc::new(mock.clone()),
            Duration::from_millis(5),
            max_attempts,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_confirmed_after_pending_polls() {
        let mock = MockLedger::new().with_receipt(
            "claimReward",
            ReceiptScript::AfterPolls {
                pending_polls: 3,
                success: true,
            },
        );
        let id = submit_claim(&mock).await;

        let receipt = waiter(&mock, None).wait(&id).await.unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.operation_id, id);
        assert_eq!(mock.read_count("receipt"), 4);
    }

    #[tokio::test]
    async fn test_failed_receipt_is_returned() {
        let mock = MockLedger::new().with_receipt("claimReward", ReceiptScript::Failure);
        let id = submit_claim(&mock).await;

        let receipt = waiter(&mock, None).wait(&id).await.unwrap();
        assert!(!receipt.success);
    }

    #[tokio::test]
    async fn test_max_attempts_surfaces_timeout() {
        let mock = MockLedger::new().with_receipt("claimReward", ReceiptScript::Never);
        let id = submit_claim(&mock).await;

        let err = waiter(&mock, Some(3)).wait(&id).await.unwrap_err();
        assert_eq!(
            err,
            WaitError::Timeout {
                id: id.clone(),
                attempts: 3
            }
        );
        assert_eq!(mock.read_count("receipt"), 3);
    }

    #[tokio::test]
    async fn test_unbounded_wait_keeps_polling_without_submitting() {
        let mock = MockLedger::new().with_receipt("claimReward", ReceiptScript::Never);
        let id = submit_claim(&mock).await;

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            waiter(&mock, None).wait(&id),
        )
        .await;
        assert!(result.is_err(), "wait should still be pending");
        assert!(mock.read_count("receipt") >= 3);
        assert_eq!(mock.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_end_the_wait() {
        let mock = MockLedger::new().with_receipt(
            "claimReward",
            ReceiptScript::AfterPolls {
                pending_polls: 1,
                success: true,
            },
        );
        let id = submit_claim(&mock).await;
        mock.fail_read("receipt");

        let w = waiter(&mock, None);
        let handle = tokio::spawn(async move { w.wait(&id).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        mock.restore_read("receipt");

        let receipt = handle.await.unwrap().unwrap();
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_cancel_stops_polling() {
        let mock = MockLedger::new().with_receipt("claimReward", ReceiptScript::Never);
        let id = submit_claim(&mock).await;
        let cancel = CancellationToken::new();
        let w = ConfirmationWaiter::new(
            Arc::new(mock.clone()),
            Duration::from_millis(5),
            None,
            cancel.clone(),
        );

        let wait_id = id.clone();
        let handle = tokio::spawn(async move { w.wait(&wait_id).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), Err(WaitError::Cancelled { id }));
        let polls = mock.read_count("receipt");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(mock.read_count("receipt"), polls);
    }
}
