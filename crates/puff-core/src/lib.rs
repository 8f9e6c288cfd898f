//! Core types and domain logic for the Puff settlement and rewards platform.
//!
//! This crate provides the foundational types used throughout the service:
//!
//! - **Identifiers**: `UserId`, `MerchantId`, `TransactionId`, `RewardId`, `RedemptionId`
//! - **Transactions**: `Transaction`, `TransactionKind`, `TransactionStatus`
//! - **Rewards**: `PointsBalance`, `Tier`, `PointsPolicy`, `RewardItem`, `RewardRedemption`
//! - **Vault**: `VaultContribution`, `ContributionSource`, `VaultPolicy`, `VaultSummary`
//! - **Providers**: `ProviderRecord`
//! - **Audit**: `AuditEntry`, `AuditStatus`
//!
//! # Puff Points
//!
//! Puff Points are the platform's loyalty currency, stored as `i64`.
//! Monetary amounts are `rust_decimal::Decimal` in provider currency units.
//!
//! - A confirmed $100 purchase at bronze (1.00x) earns 1000 points
//! - The same purchase at platinum (2.00x) earns 2000 points
//! - Redeeming a catalog reward spends points (negative ledger delta)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod audit;
pub mod error;
pub mod ids;
pub mod provider;
pub mod rewards;
pub mod transaction;
pub mod vault;

pub use audit::{AuditEntry, AuditStatus, AUDIT_DETAIL_MAX_LEN};
pub use error::{CoreError, Result};
pub use ids::{IdError, MerchantId, RedemptionId, RewardId, TransactionId, UserId};
pub use provider::ProviderRecord;
pub use rewards::{
    PointsBalance, PointsPolicy, RewardItem, RewardRedemption, RedemptionStatus, Tier,
    DEFAULT_BASE_POINTS_PER_UNIT, REDEMPTION_EXPIRY_DAYS,
};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
pub use vault::{
    ContributionSource, VaultContribution, VaultPolicy, VaultSummary,
    DEFAULT_PROJECTED_APY_PERCENT, DEFAULT_REWARDS_POOL_PERCENT,
    DEFAULT_STABLECOIN_ALLOCATION_PERCENT,
};
