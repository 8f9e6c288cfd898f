//! Error types for Puff storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Insufficient points for a debit.
    #[error("insufficient points: balance={balance}, required={required}")]
    InsufficientPoints {
        /// Current spendable balance.
        balance: i64,
        /// Points the operation needs.
        required: i64,
    },

    /// The reward cannot currently be redeemed.
    #[error("reward unavailable: {reason}")]
    RewardUnavailable {
        /// Why the reward is unavailable.
        reason: String,
    },

    /// A transaction with this provider reference already exists.
    #[error("duplicate provider reference: {provider}/{provider_transaction_id}")]
    DuplicateProviderRef {
        /// The provider key.
        provider: String,
        /// The provider's transaction id.
        provider_transaction_id: String,
    },

    /// The points offered do not match the catalog cost.
    #[error("points mismatch: catalog cost is {expected}, request offered {provided}")]
    PointsMismatch {
        /// The catalog entry's current cost.
        expected: i64,
        /// The points the request offered.
        provided: i64,
    },

    /// A transaction constraint was violated (status machine, sign rule).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The redemption is not pending, so it cannot be fulfilled.
    #[error("redemption is {status}, not pending")]
    RedemptionNotPending {
        /// The redemption's effective status.
        status: String,
    },
}

impl From<puff_core::CoreError> for StoreError {
    fn from(err: puff_core::CoreError) -> Self {
        Self::Constraint(err.to_string())
    }
}
