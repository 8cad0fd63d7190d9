//! Pure derivations: no I/O, no clocks other than the ones passed in.

pub mod countdown;
pub mod metrics;

pub use countdown::{BonusCountdown, CountdownTracker, BONUS_WINDOW_SECS};
pub use metrics::{derive_snapshot, LedgerReadings, SECONDS_PER_YEAR};
