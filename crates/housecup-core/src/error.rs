//! Error taxonomy for core ledger operations.
//!
//! Argument errors are raised before the store is touched, so a rejected
//! call has no side effects. Store failures are propagated as-is; the core
//! never retries.

use housecup_db::DbError;
use housecup_types::UnknownHouse;

/// Errors returned by the aggregation engine and the write path.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A caller-supplied argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested resource has no data.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger store failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] DbError),
}

impl From<UnknownHouse> for LedgerError {
    fn from(err: UnknownHouse) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
