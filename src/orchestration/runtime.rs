//! Wiring of the orchestrator, synchronizer and countdown under one teardown token.

use crate::config::Config;
use crate::db::Repository;
use crate::domain::MetricsSnapshot;
use crate::engine::countdown::BonusCountdown;
use crate::ledger::CallInterface;
use crate::orchestration::journal::Journal;
use crate::orchestration::orchestrator::{Orchestrator, OrchestratorParts};
use crate::orchestration::session::SessionHandle;
use crate::orchestration::synchronizer::{CountdownTicker, MetricsSynchronizer};
use crate::orchestration::waiter::ConfirmationWaiter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Owns every background task of the client. Dropping or shutting it down cancels the
/// periodic tasks and every in-flight confirmation wait.
pub struct StakingEngine {
    orchestrator: Arc<Orchestrator>,
    synchronizer: Arc<MetricsSynchronizer>,
    ticker: Mutex<Option<CountdownTicker>>,
    session: SessionHandle,
    snapshots: watch::Receiver<Option<Arc<MetricsSnapshot>>>,
    countdown: watch::Receiver<BonusCountdown>,
    refresh_interval: Duration,
    countdown_tick: Duration,
    cancel: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
}

impl StakingEngine {
    pub fn new(
        ledger: Arc<dyn CallInterface>,
        repo: Arc<Repository>,
        session: SessionHandle,
        config: &Config,
    ) -> Self {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let (snapshot_tx, snapshots) = watch::channel(None);
        let (countdown_tx, countdown) = watch::channel(BonusCountdown::Inactive);

        let waiter = ConfirmationWaiter::new(
            ledger.clone(),
            config.poll_interval,
            config.max_confirmation_attempts,
            cancel.clone(),
        );

        let orchestrator = Arc::new(Orchestrator::new(OrchestratorParts {
            ledger: ledger.clone(),
            waiter,
            journal: Journal::new(repo),
            session: session.clone(),
            snapshots: snapshots.clone(),
            tracker: tracker.clone(),
            asset: config.asset_token.clone(),
            spender: config.staking_contract.clone(),
            mode: config.confirmation_mode,
            advertised_penalty_percent: config.display.advertised_penalty_percent,
        }));

        let synchronizer = Arc::new(MetricsSynchronizer::new(
            ledger,
            session.clone(),
            config.asset_token.clone(),
            config.token_decimals,
            snapshot_tx,
        ));
        let ticker = CountdownTicker::new(
            snapshots.clone(),
            countdown_tx,
            session.clone(),
            config.bonus_window_secs,
        );

        Self {
            orchestrator,
            synchronizer,
            ticker: Mutex::new(Some(ticker)),
            session,
            snapshots,
            countdown,
            refresh_interval: config.refresh_interval,
            countdown_tick: config.countdown_tick,
            cancel,
            tracker,
            started: AtomicBool::new(false),
        }
    }

    /// Spawn the synchronizer and countdown tasks. Later calls are no-ops.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        self.tracker.spawn(
            self.synchronizer
                .clone()
                .run(self.refresh_interval, self.cancel.clone()),
        );

        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(ticker) = ticker {
            self.tracker
                .spawn(ticker.run(self.countdown_tick, self.cancel.clone()));
        }
        info!("Staking engine started");
    }

    /// Cancel every timer and waiter, then wait for all tracked tasks to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Staking engine stopped");
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn synchronizer(&self) -> &Arc<MetricsSynchronizer> {
        &self.synchronizer
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Latest snapshot, but only while it belongs to the connected account.
    pub fn snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        let session = self.session.current();
        self.snapshots
            .borrow()
            .as_ref()
            .filter(|s| session.account() == Some(&s.account))
            .cloned()
    }

    /// `Inactive` until the connected account has a snapshot, without waiting for the next tick.
    pub fn countdown(&self) -> BonusCountdown {
        if self.snapshot().is_none() {
            return BonusCountdown::Inactive;
        }
        *self.countdown.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }
}

impl Drop for StakingEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
