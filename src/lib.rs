pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Address, BaseUnits, Decimal, MetricsSnapshot, OperationId, OperationKind, OperationStatus,
    PendingOperation, TimeSecs,
};
pub use error::AppError;
pub use ledger::{CallError, CallInterface, JsonRpcLedger, MockLedger};
pub use orchestration::{Orchestrator, SessionHandle, StakingEngine, StakingError};
