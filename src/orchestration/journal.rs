use crate::db::Repository;
use crate::domain::PendingOperation;
use std::sync::Arc;
use tracing::warn;

/// Best-effort recorder for operation lifecycles.
///
/// The ledger write has already happened by the time anything is recorded, so storage
/// failures are logged and swallowed rather than reported as a failed action.
#[derive(Clone)]
pub struct Journal {
    repo: Arc<Repository>,
}

impl Journal {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, op: &PendingOperation) {
        if let Err(e) = self.repo.insert_operation(op).await {
            warn!(
                "Failed to journal {} {}: {}",
                op.kind, op.submitted_id, e
            );
        }
    }

    pub async fn resolve(&self, op: &PendingOperation) {
        if let Err(e) = self.repo.resolve_operation(op).await {
            warn!(
                "Failed to journal outcome of {} {}: {}",
                op.kind, op.submitted_id, e
            );
        }
    }
}
