//! Puff Vault handlers: fee contributions and the trustee summary.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use puff_core::{ContributionSource, MerchantId, VaultContribution, VaultSummary};
use puff_store::Store;

use crate::auth::{AdminAuth, ServiceAuth};
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request body for recording a fee contribution.
#[derive(Debug, Deserialize)]
pub struct RecordContributionRequest {
    /// The merchant whose fee this is.
    pub merchant_id: String,
    /// Fee amount in platform currency units.
    pub amount: Decimal,
    /// Which fee produced the contribution.
    pub source: ContributionSource,
}

/// A recorded contribution as returned by the API.
#[derive(Debug, Serialize)]
pub struct ContributionResponse {
    /// Contribution id.
    pub id: String,
    /// The merchant whose fee this is.
    pub merchant_id: String,
    /// Fee amount.
    pub amount: Decimal,
    /// Which fee produced the contribution.
    pub source: ContributionSource,
    /// When the contribution was recorded (RFC 3339).
    pub recorded_at: String,
}

impl From<&VaultContribution> for ContributionResponse {
    fn from(contribution: &VaultContribution) -> Self {
        Self {
            id: contribution.id.to_string(),
            merchant_id: contribution.merchant_id.to_string(),
            amount: contribution.amount,
            source: contribution.source,
            recorded_at: contribution.recorded_at.to_rfc3339(),
        }
    }
}

/// Trustee-facing summary of the vault.
#[derive(Debug, Serialize)]
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

// =============================================================================
// Handlers
// =============================================================================

/// Record a merchant fee contribution to the vault.
///
/// Requires service authentication; fees are reported by the marketplace
/// backend, never by end users.
pub async fn record_contribution(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(request): Json<RecordContributionRequest>,
) -> Result<Json<ContributionResponse>, ApiError> {
    let merchant_id = request
        .merchant_id
        .parse::<MerchantId>()
        .map_err(|_| ApiError::BadRequest("Invalid merchant_id".to_string()))?;

    if request.amount <= Decimal::ZERO {
        return Err(ApiError::BadRequest(
            "amount must be positive".to_string(),
        ));
    }

    let contribution = VaultContribution::new(merchant_id, request.amount, request.source);
    state.store.record_contribution(&contribution)?;

    tracing::info!(
        service = %auth.service_name,
        merchant_id = %merchant_id,
        amount = %contribution.amount,
        source = %contribution.source,
        "Vault contribution recorded"
    );

    Ok(Json(ContributionResponse::from(&contribution)))
}

/// Get the trustee summary of the vault. Admin only.
///
/// The summary is recomputed from the contribution rows on every call; there
/// is no materialized total to drift out of sync.
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
) -> Result<Json<VaultSummaryResponse>, ApiError> {
    let contributions = state.store.list_contributions()?;
    let policy = &state.config.vault;
    let summary = VaultSummary::compute(policy, &contributions);

    Ok(Json(VaultSummaryResponse {
        vault_balance: summary.vault_balance,
        rewards_pool_balance: summary.rewards_pool_balance,
        contribution_count: summary.contribution_count,
        withdrawal_fee_total: summary.withdrawal_fee_total,
        transaction_fee_total: summary.transaction_fee_total,
        projected_stablecoin_float: summary.projected_stablecoin_float,
        projected_apy_percent: summary.projected_apy_percent,
        rewards_pool_percent: policy.rewards_pool_percent,
        stablecoin_allocation_percent: policy.stablecoin_allocation_percent,
    }))
}
