//! Domain types for the staking client.
//!
//! This module provides:
//! - Arbitrary-precision base-unit amounts and exact decimal display values
//! - Domain primitives: TimeSecs, Address, OperationId
//! - Raw ledger records (reward data, stake record, receipt)
//! - Pending operation lifecycle and the derived metrics snapshot

pub mod amount;
pub mod decimal;
pub mod ledger;
pub mod operation;
pub mod primitives;
pub mod snapshot;

pub use amount::{AmountParseError, BaseUnits, DEFAULT_DECIMALS};
pub use decimal::{Decimal, DecimalRangeError};
pub use ledger::{Receipt, RewardData, StakeRecord};
pub use operation::{OperationKind, OperationStatus, PendingOperation};
pub use primitives::{Address, AddressParseError, OperationId, TimeSecs};
pub use snapshot::MetricsSnapshot;
