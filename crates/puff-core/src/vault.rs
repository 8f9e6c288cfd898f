//! Puff Vault treasury types.
//!
//! The vault is the pooled treasury funded by merchant fees. Its balances are
//! pure read-side aggregations over the stored contribution rows, recomputed
//! on demand so the numbers can never drift from the underlying records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::MerchantId;

/// Share of fee contributions allocated to the rewards pool, in percent.
pub const DEFAULT_REWARDS_POOL_PERCENT: u32 = 10;

/// Share of the vault float held in stablecoins, in percent.
///
/// Product-owned placeholder pending treasury policy; surfaced to trustees as
/// a projection, never computed from market data.
pub const DEFAULT_STABLECOIN_ALLOCATION_PERCENT: u32 = 70;

/// Projected annual yield on the vault float, in percent. Placeholder like
/// the stablecoin allocation.
pub const DEFAULT_PROJECTED_APY_PERCENT: u32 = 3;

/// Where a vault contribution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionSource {
    /// Fee charged when a merchant withdraws funds.
    WithdrawalFee,

    /// Fee charged on a settled marketplace transaction.
    TransactionFee,
}

impl ContributionSource {
    /// The snake_case wire name of this source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WithdrawalFee => "withdrawal_fee",
            Self::TransactionFee => "transaction_fee",
        }
    }
}

impl fmt::Display for ContributionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A merchant fee flowing into the shared treasury.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultContribution {
    /// Contribution id (ULID, time-ordered).
    pub id: Ulid,

    /// The merchant whose fee this is.
    pub merchant_id: MerchantId,

    /// Fee amount in platform currency units.
    pub amount: Decimal,

    /// Which fee produced the contribution.
    pub source: ContributionSource,

    /// When the contribution was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl VaultContribution {
    /// Record a new contribution.
    #[must_use]
    pub fn new(merchant_id: MerchantId, amount: Decimal, source: ContributionSource) -> Self {
        Self {
            id: Ulid::new(),
            merchant_id,
            amount,
            source,
            recorded_at: Utc::now(),
        }
    }
}

/// Treasury allocation policy constants for the trustee view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultPolicy {
    /// Share of fee contributions feeding the rewards pool, in percent.
    pub rewards_pool_percent: u32,

    /// Projected stablecoin share of the float, in percent.
    pub stablecoin_allocation_percent: u32,

    /// Projected annual yield, in percent.
    pub projected_apy_percent: u32,
}

impl Default for VaultPolicy {
    fn default() -> Self {
        Self {
            rewards_pool_percent: DEFAULT_REWARDS_POOL_PERCENT,
            stablecoin_allocation_percent: DEFAULT_STABLECOIN_ALLOCATION_PERCENT,
            projected_apy_percent: DEFAULT_PROJECTED_APY_PERCENT,
        }
    }
}

/// Aggregated treasury view for admin/trustee consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSummary {
    /// Sum of all contributions.
    pub vault_balance: Decimal,

    /// Rewards-pool share of the fee contributions.
    pub rewards_pool_balance: Decimal,

    /// Number of contribution rows aggregated.
    pub contribution_count: u64,

    /// Total of withdrawal-fee contributions.
    pub withdrawal_fee_total: Decimal,

    /// Total of transaction-fee contributions.
    pub transaction_fee_total: Decimal,

    /// Projected stablecoin float, from the policy percentage.
    pub projected_stablecoin_float: Decimal,

    /// Projected annual yield percentage, from the policy.
    pub projected_apy_percent: u32,
}

impl VaultSummary {
    /// Recompute the summary from contribution rows.
    ///
    /// `vault_balance` is the plain sum; the rewards pool takes the policy
    /// percentage of the fee-sourced sum (both defined sources are fees, so
    /// today those sums coincide, but the filter keeps the formula honest if
    /// a non-fee source ever lands).
    #[must_use]
    pub fn compute<'a, I>(policy: &VaultPolicy, contributions: I) -> Self
    where
        I: IntoIterator<Item = &'a VaultContribution>,
    {
        let mut vault_balance = Decimal::ZERO;
        let mut withdrawal_fee_total = Decimal::ZERO;
        let mut transaction_fee_total = Decimal::ZERO;
        let mut contribution_count = 0u64;

        for contribution in contributions {
            vault_balance += contribution.amount;
            contribution_count += 1;
            match contribution.source {
                ContributionSource::WithdrawalFee => withdrawal_fee_total += contribution.amount,
                ContributionSource::TransactionFee => {
                    transaction_fee_total += contribution.amount;
                }
            }
        }

        let fee_total = withdrawal_fee_total + transaction_fee_total;
        let rewards_pool_balance = percent_of(fee_total, policy.rewards_pool_percent);
        let projected_stablecoin_float =
            percent_of(vault_balance, policy.stablecoin_allocation_percent);

        Self {
            vault_balance,
            rewards_pool_balance,
            contribution_count,
            withdrawal_fee_total,
            transaction_fee_total,
            projected_stablecoin_float,
            projected_apy_percent: policy.projected_apy_percent,
        }
    }
}

fn percent_of(amount: Decimal, percent: u32) -> Decimal {
    amount * Decimal::from(percent) / Decimal::from(100u32)
}
