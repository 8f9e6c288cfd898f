//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families. Composite keys place the 16-byte UUID owner first and the
//! 16-byte ULID second, so per-user prefix scans come back time-ordered.

use puff_core::{RedemptionId, TransactionId, UserId};
use ulid::Ulid;

/// Create a balance key from a user ID.
#[must_use]
pub fn balance_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-transaction index key.
///
/// Format: `user_id (16 bytes) || transaction_id (16 bytes)`
///
/// Since ULIDs are time-ordered, transactions for a user sort by time.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a prefix for iterating all transactions for a user.
#[must_use]
pub fn user_transactions_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the transaction ID from a user-transaction index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_transaction_id_from_user_key(key: &[u8]) -> TransactionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    TransactionId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a provider-reference key.
///
/// Format: `provider || 0x00 || provider_transaction_id`. Provider keys are
/// short ASCII names and never contain NUL, so the separator is unambiguous.
#[must_use]
pub fn provider_ref_key(provider: &str, provider_transaction_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(provider.len() + 1 + provider_transaction_id.len());
    key.extend_from_slice(provider.as_bytes());
    key.push(0);
    key.extend_from_slice(provider_transaction_id.as_bytes());
    key
}

/// Create a provider-record key from a provider name.
#[must_use]
pub fn provider_key(name: &str) -> Vec<u8> {
    name.as_bytes().to_vec()
}

/// Create a provider-customer key.
///
/// Format: `user_id (16 bytes) || provider`. The fixed-width user id makes
/// the key unambiguous without a separator.
#[must_use]
pub fn provider_customer_key(user_id: &UserId, provider: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + provider.len());
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(provider.as_bytes());
    key
}

/// Create a rewards-catalog key from a reward ID.
#[must_use]
pub fn reward_key(reward_id: &puff_core::RewardId) -> Vec<u8> {
    reward_id.to_bytes().to_vec()
}

/// Create a redemption key from a redemption ID.
#[must_use]
pub fn redemption_key(redemption_id: &RedemptionId) -> Vec<u8> {
    redemption_id.to_bytes().to_vec()
}

/// Create a user-redemption index key.
///
/// Format: `user_id (16 bytes) || redemption_id (16 bytes)`.
#[must_use]
pub fn user_redemption_key(user_id: &UserId, redemption_id: &RedemptionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&redemption_id.to_bytes());
    key
}

/// Create a prefix for iterating all redemptions for a user.
#[must_use]
pub fn user_redemptions_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the redemption ID from a user-redemption index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_redemption_id_from_user_key(key: &[u8]) -> RedemptionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    RedemptionId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a redemption-code lookup key.
#[must_use]
pub fn redemption_code_key(code: &str) -> Vec<u8> {
    code.as_bytes().to_vec()
}

/// Create a vault-contribution key from its ULID.
#[must_use]
pub fn contribution_key(id: &Ulid) -> Vec<u8> {
    id.to_bytes().to_vec()
}

/// Create an audit-log key from the entry ULID.
#[must_use]
pub fn audit_key(id: &Ulid) -> Vec<u8> {
    id.to_bytes().to_vec()
}
