//! Request and response types for the puff-ledger client.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use puff_core::{RedemptionStatus, Tier, TransactionKind, TransactionStatus};

/// Payment submission.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessPaymentRequest {
    /// Rail to settle through, e.g. "cybrid" or "sphere".
    pub provider: String,
    /// Paying user id.
    pub user_id: String,
    /// Amount in `currency` units.
    pub amount: Decimal,
    /// ISO currency code (server default: USD).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Ledger kind (server default: top-up).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransactionKind>,
    /// Asset pair or token symbol, forwarded to the rail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Destination wallet address, forwarded to the rail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    /// Contact email for rails that provision customers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name for rails that provision customers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Opaque caller metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A ledger transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResponse {
    /// Transaction id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Ledger kind.
    pub kind: TransactionKind,
    /// Amount in `currency` units.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Points earned (positive) or spent (negative).
    pub points_delta: i64,
    /// Settling rail, for provider-settled rows.
    pub provider: Option<String>,
    /// The rail's own transaction id, for provider-settled rows.
    pub provider_transaction_id: Option<String>,
    /// Settlement status.
    pub status: TransactionStatus,
    /// Opaque metadata.
    pub metadata: serde_json::Value,
    /// When the transaction was created (RFC 3339).
    pub created_at: String,
    /// When the transaction reached a terminal status (RFC 3339).
    pub completed_at: Option<String>,
}

/// A user's points balance.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// The balance owner.
    pub user_id: String,
    /// Spendable points.
    pub total_points: i64,
    /// Current loyalty tier.
    pub tier: Tier,
    /// Accrual multiplier for the current tier, in percent.
    pub multiplier_percent: u32,
    /// Cumulative earned points.
    pub tier_points: i64,
    /// Cumulative points spent on redemptions.
    pub lifetime_spent: i64,
    /// Earned points still needed for the next tier, absent at the top tier.
    pub points_to_next_tier: Option<i64>,
    /// When the balance was last adjusted (RFC 3339).
    pub updated_at: String,
}

/// Reward redemption request.
#[derive(Debug, Clone, Serialize)]
pub struct RedeemRequest {
    /// Catalog entry to redeem.
    pub reward_id: String,
    /// Points the caller expects to spend; must match the catalog cost.
    pub points_to_spend: i64,
}

/// A reward redemption.
#[derive(Debug, Clone, Deserialize)]
pub struct RedemptionResponse {
    /// Redemption id.
    pub id: String,
    /// The catalog entry redeemed.
    pub reward_id: String,
    /// Points debited.
    pub points_spent: i64,
    /// Code presented at fulfillment.
    pub redemption_code: String,
    /// Lifecycle status.
    pub status: RedemptionStatus,
    /// When the points were debited (RFC 3339).
    pub redeemed_at: String,
    /// When the reward was handed over (RFC 3339).
    pub fulfilled_at: Option<String>,
    /// When a pending redemption lapses (RFC 3339).
    pub expires_at: Option<String>,
}

/// Redemption result: the redemption plus its ledger row.
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemResponse {
    /// The pending redemption.
    pub redemption: RedemptionResponse,
    /// The spend recorded on the ledger.
    pub transaction: TransactionResponse,
}

/// Vault fee contribution.
#[derive(Debug, Clone, Serialize)]
pub struct RecordContributionRequest {
    /// The merchant whose fee this is.
    pub merchant_id: String,
    /// Fee amount in platform currency units.
    pub amount: Decimal,
    /// Which fee produced the contribution ("withdrawal_fee" or
    /// "transaction_fee").
    pub source: String,
}

/// A recorded vault contribution.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributionResponse {
    /// Contribution id.
    pub id: String,
    /// The merchant whose fee this is.
    pub merchant_id: String,
    /// Fee amount.
    pub amount: Decimal,
    /// Which fee produced the contribution.
    pub source: String,
    /// When the contribution was recorded (RFC 3339).
    pub recorded_at: String,
}

/// Trustee-facing summary of the vault.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultSummaryResponse {
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
    /// Projected annual yield percentage.
    pub projected_apy_percent: u32,
    /// Policy share of fees feeding the rewards pool, in percent.
    pub rewards_pool_percent: u32,
    /// Policy stablecoin allocation, in percent.
    pub stablecoin_allocation_percent: u32,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
