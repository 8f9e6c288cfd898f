//! Error types for the Puff core domain.

use crate::ids::IdError;
use crate::transaction::TransactionStatus;

/// Result type for core domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core domain operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A status transition that the transaction state machine forbids.
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidStatusTransition {
        /// The current status.
        from: TransactionStatus,
        /// The requested status.
        to: TransactionStatus,
    },

    /// The points delta sign does not match the transaction kind.
    #[error("points delta {points_delta} has the wrong sign for kind {kind}")]
    PointsSignMismatch {
        /// The offending delta.
        points_delta: i64,
        /// The transaction kind, snake_case.
        kind: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
