//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Materialized points balances, keyed by `user_id`.
    pub const BALANCES: &str = "balances";

    /// Ledger transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Uniqueness guard and webhook lookup: keyed by
    /// `provider || 0x00 || provider_transaction_id`, value is the 16-byte
    /// transaction id.
    pub const PROVIDER_REFS: &str = "provider_refs";

    /// Registered provider records, keyed by provider name.
    pub const PROVIDERS: &str = "providers";

    /// Provider-side customer ids, keyed by `user_id || provider`. The
    /// fixed-width user id doubles as the per-user prefix.
    pub const PROVIDER_CUSTOMERS: &str = "provider_customers";

    /// Rewards-catalog entries, keyed by `reward_id` (ULID).
    pub const REWARDS: &str = "rewards";

    /// Reward redemptions, keyed by `redemption_id` (ULID).
    pub const REDEMPTIONS: &str = "redemptions";

    /// Index: redemptions by user, keyed by `user_id || redemption_id`.
    /// Value is empty (index only).
    pub const REDEMPTIONS_BY_USER: &str = "redemptions_by_user";

    /// Lookup: redemption code to 16-byte redemption id.
    pub const REDEMPTIONS_BY_CODE: &str = "redemptions_by_code";

    /// Vault contributions, keyed by contribution ULID.
    pub const VAULT_CONTRIBUTIONS: &str = "vault_contributions";

    /// Webhook audit log, keyed by entry ULID.
    pub const AUDIT_LOG: &str = "audit_log";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::BALANCES,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::PROVIDER_REFS,
        cf::PROVIDERS,
        cf::PROVIDER_CUSTOMERS,
        cf::REWARDS,
        cf::REDEMPTIONS,
        cf::REDEMPTIONS_BY_USER,
        cf::REDEMPTIONS_BY_CODE,
        cf::VAULT_CONTRIBUTIONS,
        cf::AUDIT_LOG,
    ]
}
