use stakesync::config::{Config, ConfirmationMode, DisplayConfig};
use stakesync::db::init_db;
use stakesync::domain::{Address, BaseUnits, Decimal, RewardData, StakeRecord, TimeSecs};
use stakesync::engine::BonusCountdown;
use stakesync::ledger::MockLedger;
use stakesync::orchestration::{Session, SessionHandle, StakingEngine};
use stakesync::Repository;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::assert_ok;

const E18: &str = "000000000000000000";
const ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";
const OTHER: &str = "0x00000000000000000000000000000000000000bb";

fn addr(s: &str) -> Address {
    Address::from_str(s).unwrap()
}

fn units(s: &str) -> BaseUnits {
    BaseUnits::from_str(s).unwrap()
}

async fn setup(mock: &MockLedger, session: SessionHandle) -> (StakingEngine, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("journal.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let config = Config {
        port: 0,
        database_path: db_path,
        rpc_url: "http://example.invalid".to_string(),
        staking_contract: addr("0x22fa4f932595114e2115d85320b6d9152447e226"),
        asset_token: addr("0x38b54f147303887bd2e932373432ffcbd11ff6a5"),
        account: None,
        token_decimals: 18,
        refresh_interval: Duration::from_millis(10),
        countdown_tick: Duration::from_millis(5),
        poll_interval: Duration::from_millis(5),
        max_confirmation_attempts: None,
        confirmation_mode: ConfirmationMode::Blocking,
        bonus_window_secs: 30 * 24 * 3600,
        display: DisplayConfig::default(),
    };
    let engine = StakingEngine::new(
        Arc::new(mock.clone()),
        Arc::new(Repository::new(pool)),
        session,
        &config,
    );
    (engine, temp_dir)
}

async fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn test_running_engine_publishes_snapshots() {
    let mock = MockLedger::new()
        .with_reward_data(RewardData {
            rate_per_second: units("100"),
            ..Default::default()
        })
        .with_totals(
            units(&format!("31536000{}", E18)),
            units(&format!("31536000{}", E18)),
        )
        .with_stake(StakeRecord {
            actual_amount: units(&format!("100{}", E18)),
            effective_amount: units(&format!("125{}", E18)),
            stake_timestamp: TimeSecs::new(1_700_000_000),
            multiplier: units("1250000000000000000"),
        });
    let (engine, _temp) = setup(&mock, SessionHandle::new(Session::connected(addr(ACCOUNT)))).await;

    engine.start();
    assert!(wait_for(|| engine.snapshot().is_some()).await);

    let snapshot = engine.snapshot().unwrap();
    assert_eq!(snapshot.apy_percent, Decimal::from_str("0.00000000000001").unwrap());
    assert_eq!(snapshot.individual_multiplier_percent.to_string(), "25");
    assert_eq!(snapshot.individual_effective.to_string(), "125");

    engine.shutdown().await;
}

#[tokio::test]
async fn test_apy_zero_with_nothing_staked() {
    let mock = MockLedger::new().with_reward_data(RewardData {
        rate_per_second: units("1000"),
        ..Default::default()
    });
    let (engine, _temp) = setup(&mock, SessionHandle::new(Session::connected(addr(ACCOUNT)))).await;

    let snapshot = assert_ok!(engine.synchronizer().refresh().await).unwrap();
    assert_eq!(snapshot.apy_percent, Decimal::zero());
}

#[tokio::test]
async fn test_failed_cycle_retains_snapshot_and_recovers() {
    let mock = MockLedger::new().with_totals(units("10"), units("10"));
    let (engine, _temp) = setup(&mock, SessionHandle::new(Session::connected(addr(ACCOUNT)))).await;

    let first = assert_ok!(engine.synchronizer().refresh().await).unwrap();

    mock.fail_read("totalRewardsAccumulated");
    mock.set_total_effective(units("20"));
    assert!(engine.synchronizer().refresh().await.is_err());
    assert_eq!(engine.snapshot().as_deref(), Some(&*first));

    mock.restore_read("totalRewardsAccumulated");
    let next = assert_ok!(engine.synchronizer().refresh().await).unwrap();
    assert_eq!(
        next.total_effective_display,
        BaseUnits::from(20u64).to_display(18).unwrap()
    );
}

#[tokio::test]
async fn test_snapshot_follows_session_account() {
    let mock = MockLedger::new();
    let session = SessionHandle::new(Session::disconnected());
    let (engine, _temp) = setup(&mock, session.clone()).await;

    engine.start();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(engine.snapshot().is_none());
    assert_eq!(mock.read_count("rewardData"), 0);

    session.connect(addr(ACCOUNT));
    assert!(wait_for(|| engine.snapshot().is_some_and(|s| s.account == addr(ACCOUNT))).await);

    session.connect(addr(OTHER));
    assert!(wait_for(|| engine.snapshot().is_some_and(|s| s.account == addr(OTHER))).await);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_countdown_runs_from_stake_timestamp() {
    let staked = TimeSecs::now().as_secs() - 3600;
    let mock = MockLedger::new().with_stake(StakeRecord {
        actual_amount: units("1"),
        effective_amount: units("1"),
        stake_timestamp: TimeSecs::new(staked),
        multiplier: units(&format!("1{}", E18)),
    });
    let (engine, _temp) = setup(&mock, SessionHandle::new(Session::connected(addr(ACCOUNT)))).await;
    assert_eq!(engine.countdown(), BonusCountdown::Inactive);

    engine.start();
    assert!(wait_for(|| matches!(engine.countdown(), BonusCountdown::Running { .. })).await);

    let BonusCountdown::Running { days, .. } = engine.countdown() else {
        panic!("countdown should be running");
    };
    assert_eq!(days, 29);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_countdown_finished_for_old_stake() {
    let mock = MockLedger::new().with_stake(StakeRecord {
        actual_amount: units("1"),
        effective_amount: units("1"),
        stake_timestamp: TimeSecs::new(1_600_000_000),
        multiplier: units(&format!("1{}", E18)),
    });
    let (engine, _temp) = setup(&mock, SessionHandle::new(Session::connected(addr(ACCOUNT)))).await;

    engine.start();
    assert!(wait_for(|| engine.countdown().is_finished()).await);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_all_polling() {
    let mock = MockLedger::new();
    let (engine, _temp) = setup(&mock, SessionHandle::new(Session::connected(addr(ACCOUNT)))).await;

    engine.start();
    assert!(wait_for(|| mock.read_count("rewardData") >= 2).await);
    engine.shutdown().await;
    assert!(!engine.is_running());

    let reads = mock.read_count("rewardData");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.read_count("rewardData"), reads);
}
