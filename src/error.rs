use thiserror::Error;
use tracing::warn;

use crate::model::Group;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors surfaced by the ordered-view extension.
///
/// Recovery policy: only [`ViewError::LookupMiss`] is recovered locally (by
/// `remove`, as a no-op). Every other variant aborts the transaction that
/// produced it; the dirty overlay carried by that transaction is discarded
/// by the caller rather than partially applied.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The view has not been registered against this connection.
    #[error("view not registered")]
    NotRegistered,

    /// The persisted view version does not match the configured version.
    #[error("view version mismatch: persisted {persisted}, configured {configured}")]
    VersionMismatch {
        /// Version number found in the `<view>_info` table.
        persisted: i64,
        /// Version number the caller configured the view with.
        configured: i64,
    },

    /// The underlying SQL engine reported a failure.
    #[error("storage error: {0}")]
    StorageError(#[from] rusqlite::Error),

    /// A concurrent mutation was observed while enumerating a group.
    #[error("group {0:?} was mutated during iteration")]
    MutationDuringIteration(Group),

    /// The page chain for a group failed to reconstruct from disk.
    #[error("invalid page chain for group {0:?}")]
    InvalidPageChain(Group),

    /// A user-supplied grouping/sorting function misbehaved.
    #[error("user callback fault: {0}")]
    UserCallbackFault(String),
}

/// Logs a lookup that resolved no page for a row. `remove` treats this as a
/// successful no-op; bulk-remove calls this when the caller asserted presence.
pub fn log_lookup_miss(context: &str) {
    warn!(context, "lookupKeyMap miss treated as no-op");
}
