//! Periodic read-refresh of ledger state and the local bonus countdown.

use crate::domain::{Address, DecimalRangeError, MetricsSnapshot, TimeSecs};
use crate::engine::countdown::{BonusCountdown, CountdownTracker};
use crate::engine::metrics::{derive_snapshot, LedgerReadings};
use crate::ledger::{CallError, CallInterface, ReadField, ReadValue};
use crate::orchestration::session::SessionHandle;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("read of {field} failed: {source}")]
    Read {
        field: &'static str,
        #[source]
        source: CallError,
    },
    #[error("derivation failed: {0}")]
    Derive(#[from] DecimalRangeError),
}

/// Reads the full field set each cycle and publishes one [`MetricsSnapshot`] per success.
///
/// A failed cycle publishes nothing, so readers keep seeing the previous snapshot.
pub struct MetricsSynchronizer {
    ledger: Arc<dyn CallInterface>,
    session: SessionHandle,
    asset: Address,
    decimals: u32,
    snapshots: watch::Sender<Option<Arc<MetricsSnapshot>>>,
}

impl MetricsSynchronizer {
    pub fn new(
        ledger: Arc<dyn CallInterface>,
        session: SessionHandle,
        asset: Address,
        decimals: u32,
        snapshots: watch::Sender<Option<Arc<MetricsSnapshot>>>,
    ) -> Self {
        Self {
            ledger,
            session,
            asset,
            decimals,
            snapshots,
        }
    }

    async fn read(&self, field: ReadField) -> Result<ReadValue, SyncError> {
        let name = field.name();
        self.ledger
            .read(&field)
            .await
            .map_err(|source| SyncError::Read { field: name, source })
    }

    async fn read_uint(&self, field: ReadField) -> Result<crate::domain::BaseUnits, SyncError> {
        let name = field.name();
        self.read(field)
            .await?
            .into_uint()
            .map_err(|source| SyncError::Read { field: name, source })
    }

    /// One ordered batch of reads; the first failure aborts the batch.
    pub async fn read_all(&self, account: &Address) -> Result<LedgerReadings, SyncError> {
        let asset = &self.asset;

        let reward_data = self
            .read(ReadField::RewardData {
                asset: asset.clone(),
            })
            .await?
            .into_reward_data()
            .map_err(|source| SyncError::Read {
                field: "rewardData",
                source,
            })?;
        let total_effective = self
            .read_uint(ReadField::TotalEffectiveStaked {
                asset: asset.clone(),
            })
            .await?;
        let total_actual = self
            .read_uint(ReadField::TotalActualStaked {
                asset: asset.clone(),
            })
            .await?;
        let earned = self
            .read_uint(ReadField::Earned {
                asset: asset.clone(),
                account: account.clone(),
            })
            .await?;
        let stake = self
            .read(ReadField::Stakes {
                asset: asset.clone(),
                account: account.clone(),
            })
            .await?
            .into_stake()
            .map_err(|source| SyncError::Read {
                field: "stakes",
                source,
            })?;
        let min_staking_period_secs = self.read_uint(ReadField::MinStakingPeriod).await?;
        let early_withdrawal_period_secs = self.read_uint(ReadField::EarlyWithdrawalPeriod).await?;
        let early_withdrawal_penalty = self.read_uint(ReadField::EarlyWithdrawalPenalty).await?;
        let total_rewards = self
            .read_uint(ReadField::TotalRewardsAccumulated {
                asset: asset.clone(),
            })
            .await?;
        let wallet_balance = self
            .read_uint(ReadField::BalanceOf {
                token: asset.clone(),
                account: account.clone(),
            })
            .await?;

        Ok(LedgerReadings {
            reward_data,
            total_effective,
            total_actual,
            earned,
            stake,
            min_staking_period_secs,
            early_withdrawal_period_secs,
            early_withdrawal_penalty,
            total_rewards,
            wallet_balance,
        })
    }

    /// Run one cycle. Returns `Ok(None)` when no account is connected or the account changed
    /// while reading; the previous snapshot stays published in both cases.
    pub async fn refresh(&self) -> Result<Option<Arc<MetricsSnapshot>>, SyncError> {
        let Some(account) = self.session.current().account().cloned() else {
            debug!("No account connected, skipping refresh");
            return Ok(None);
        };

        let readings = self.read_all(&account).await?;

        if self.session.current().account() != Some(&account) {
            debug!("Account changed during refresh, discarding readings for {}", account);
            return Ok(None);
        }

        let snapshot = Arc::new(derive_snapshot(
            account,
            &readings,
            self.decimals,
            Utc::now(),
        )?);
        self.snapshots.send_replace(Some(snapshot.clone()));
        Ok(Some(snapshot))
    }

    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Metrics synchronizer started ({:?} interval)", interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // Teardown mid-cycle drops the in-flight reads.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = self.refresh() => {
                            if let Err(e) = result {
                                warn!("Refresh cycle aborted: {}", e);
                            }
                        }
                    }
                }
            }
        }
        info!("Metrics synchronizer stopped");
    }
}

/// Recomputes the bonus countdown from the connected account's latest snapshot. Never reads
/// the ledger.
pub struct CountdownTicker {
    snapshots: watch::Receiver<Option<Arc<MetricsSnapshot>>>,
    countdown: watch::Sender<BonusCountdown>,
    session: SessionHandle,
    tracker: CountdownTracker,
}

impl CountdownTicker {
    pub fn new(
        snapshots: watch::Receiver<Option<Arc<MetricsSnapshot>>>,
        countdown: watch::Sender<BonusCountdown>,
        session: SessionHandle,
        window_secs: i64,
    ) -> Self {
        Self {
            snapshots,
            countdown,
            session,
            tracker: CountdownTracker::new(window_secs),
        }
    }

    /// A snapshot left over from another account, or from before a disconnect, counts as
    /// no stake.
    pub fn tick_once(&mut self, now: TimeSecs) -> BonusCountdown {
        let session = self.session.current();
        let stake_ts = self
            .snapshots
            .borrow()
            .as_ref()
            .filter(|s| session.account() == Some(&s.account))
            .map(|s| s.stake_timestamp)
            .unwrap_or_default();

        let state = self.tracker.tick(stake_ts, now);
        self.countdown.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            if state.is_finished() {
                info!("Bonus window finished for stake at {}", stake_ts.as_secs());
            }
            *current = state;
            true
        });
        state
    }

    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick_once(TimeSecs::now());
                }
            }
        }
        debug!("Countdown ticker stopped");
    }
}
