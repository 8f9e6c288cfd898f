//! `RocksDB` storage layer for the Puff settlement and rewards service.
//!
//! This crate provides persistent storage for ledger transactions, points
//! balances, the rewards catalog, redemptions, vault contributions, and the
//! webhook audit log, using `RocksDB` with column families for indexing.
//!
//! # Architecture
//!
//! See [`schema`] for the column family layout. Compound operations
//! (payment insert, webhook status application, redemption) run under a
//! single writer lock and commit through one `WriteBatch`, which is what
//! upholds the ledger invariants under concurrent requests:
//!
//! - `(provider, provider_transaction_id)` is unique across transactions
//! - a balance never goes negative
//! - the materialized balance always equals the sum of confirmed deltas
//!
//! # Example
//!
//! ```no_run
//! use puff_store::{RocksStore, Store};
//! use puff_core::{Transaction, TransactionKind, TransactionStatus, UserId};
//! use rust_decimal::Decimal;
//!
//! let store = RocksStore::open("/tmp/puff-db").unwrap();
//!
//! let tx = Transaction::payment(
//!     UserId::generate(),
//!     TransactionKind::TopUp,
//!     Decimal::new(10000, 2),
//!     "USD".into(),
//!     "cybrid".into(),
//!     "trade_1".into(),
//!     1000,
//!     TransactionStatus::Pending,
//!     serde_json::Value::Null,
//! );
//! store.record_transaction(&tx).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use puff_core::{
    AuditEntry, PointsBalance, ProviderRecord, RedemptionId, RewardId, RewardItem,
    RewardRedemption, Transaction, TransactionId, TransactionStatus, UserId, VaultContribution,
};

/// Outcome of applying one provider webhook event to the ledger.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    /// The transaction moved to the event's status (points applied on
    /// confirmation).
    Applied(Transaction),

    /// The event's terminal status was already applied; nothing changed.
    Replayed(Transaction),

    /// A different terminal status was already applied; nothing changed.
    Conflict(Transaction),

    /// No transaction matches the provider reference.
    Unmatched,
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g. `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Balance Operations
    // =========================================================================

    /// Get the materialized points balance for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_balance(&self, user_id: &UserId) -> Result<Option<PointsBalance>>;

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>>;

    /// Get a transaction by its provider reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction_by_provider_ref(
        &self,
        provider: &str,
        provider_transaction_id: &str,
    ) -> Result<Option<Transaction>>;

    /// List transactions for a user, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Insert a new ledger transaction atomically.
    ///
    /// Maintains the user index and, when the transaction carries a provider
    /// reference, the uniqueness index. A transaction inserted already
    /// `confirmed` applies its `points_delta` to the materialized balance in
    /// the same write.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateProviderRef` if the provider reference exists.
    /// - `StoreError::Constraint` if the points sign violates the kind.
    /// - `StoreError::InsufficientPoints` if a confirmed negative delta would
    ///   overdraw the balance.
    fn record_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// Apply a webhook-reported status to the transaction matching the
    /// provider reference.
    ///
    /// Replays of an already-applied terminal status and conflicting terminal
    /// statuses leave the ledger untouched; confirmation applies the points
    /// delta to the balance in the same write.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn apply_provider_event(
        &self,
        provider: &str,
        provider_transaction_id: &str,
        status: TransactionStatus,
    ) -> Result<EventOutcome>;

    /// Redeem a catalog reward: debit the balance, insert the redemption and
    /// its ledger transaction, and decrement finite availability, all in one
    /// atomic write.
    ///
    /// # Errors
    ///
    /// - `StoreError::InsufficientPoints` if `points_to_spend` exceeds the
    ///   balance.
    /// - `StoreError::RewardUnavailable` if the entry is missing, inactive,
    ///   or out of stock.
    /// - `StoreError::PointsMismatch` if `points_to_spend` differs from the
    ///   catalog cost.
    fn redeem_points(
        &self,
        user_id: &UserId,
        reward_id: &RewardId,
        points_to_spend: i64,
    ) -> Result<(RewardRedemption, Transaction)>;

    // =========================================================================
    // Rewards Catalog Operations
    // =========================================================================

    /// Insert or update a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_reward(&self, reward: &RewardItem) -> Result<()>;

    /// Get a catalog entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_reward(&self, reward_id: &RewardId) -> Result<Option<RewardItem>>;

    /// List all catalog entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_rewards(&self) -> Result<Vec<RewardItem>>;

    // =========================================================================
    // Redemption Operations
    // =========================================================================

    /// Get a redemption by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_redemption(&self, redemption_id: &RedemptionId) -> Result<Option<RewardRedemption>>;

    /// Get a redemption by its unique code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_redemption_by_code(&self, code: &str) -> Result<Option<RewardRedemption>>;

    /// List redemptions for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_redemptions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<RewardRedemption>>;

    /// Mark the redemption with `code` fulfilled.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no redemption has this code.
    /// - `StoreError::RedemptionNotPending` if it is already completed or
    ///   has expired.
    fn fulfill_redemption(&self, code: &str) -> Result<RewardRedemption>;

    // =========================================================================
    // Provider Record Operations
    // =========================================================================

    /// Insert or update a provider record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_provider(&self, record: &ProviderRecord) -> Result<()>;

    /// Get a provider record by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_provider(&self, name: &str) -> Result<Option<ProviderRecord>>;

    /// List all provider records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_providers(&self) -> Result<Vec<ProviderRecord>>;

    /// Save the provider-side customer id provisioned for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_provider_customer(
        &self,
        user_id: &UserId,
        provider: &str,
        customer_id: &str,
    ) -> Result<()>;

    /// Get the provider-side customer id provisioned for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_provider_customer(&self, user_id: &UserId, provider: &str) -> Result<Option<String>>;

    // =========================================================================
    // Vault Operations
    // =========================================================================

    /// Record a vault contribution.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn record_contribution(&self, contribution: &VaultContribution) -> Result<()>;

    /// List all vault contributions (read-side aggregation input).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_contributions(&self) -> Result<Vec<VaultContribution>>;

    // =========================================================================
    // Audit Operations
    // =========================================================================

    /// Append a webhook audit entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_audit_entry(&self, entry: &AuditEntry) -> Result<()>;

    /// List audit entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_audit_entries(&self, limit: usize) -> Result<Vec<AuditEntry>>;
}
