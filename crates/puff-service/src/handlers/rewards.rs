//! Puff Points handlers: balance, catalog, redemptions.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use puff_core::{
    PointsBalance, RedemptionStatus, RewardId, RewardItem, RewardRedemption, Tier,
};
use puff_store::Store;

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::handlers::payments::TransactionResponse;
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// A user's points balance as returned by the API.
#[derive(Debug, Serialize)]
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

impl From<&PointsBalance> for BalanceResponse {
    fn from(balance: &PointsBalance) -> Self {
        Self {
            user_id: balance.user_id.to_string(),
            total_points: balance.total_points,
            tier: balance.tier,
            multiplier_percent: balance.tier.multiplier_percent(),
            tier_points: balance.tier_points,
            lifetime_spent: balance.lifetime_spent,
            points_to_next_tier: balance.points_to_next_tier(),
            updated_at: balance.updated_at.to_rfc3339(),
        }
    }
}

/// A rewards-catalog entry as returned by the API.
#[derive(Debug, Serialize)]
pub struct RewardResponse {
    /// Catalog entry id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display description.
    pub description: String,
    /// Points required to redeem.
    pub points_cost: i64,
    /// Remaining stock; absent means unlimited.
    pub availability: Option<u32>,
    /// Whether the entry is currently offered.
    pub is_active: bool,
    /// When the entry was created (RFC 3339).
    pub created_at: String,
}

impl From<&RewardItem> for RewardResponse {
    fn from(reward: &RewardItem) -> Self {
        Self {
            id: reward.id.to_string(),
            name: reward.name.clone(),
            description: reward.description.clone(),
            points_cost: reward.points_cost,
            availability: reward.availability,
            is_active: reward.is_active,
            created_at: reward.created_at.to_rfc3339(),
        }
    }
}

/// Response for listing the rewards catalog.
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    /// Redeemable catalog entries.
    pub rewards: Vec<RewardResponse>,
}

/// Request body for creating a catalog entry.
#[derive(Debug, Deserialize)]
pub struct CreateRewardRequest {
    /// Display name.
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Points required to redeem.
    pub points_cost: i64,
    /// Initial stock; omit for unlimited.
    #[serde(default)]
    pub availability: Option<u32>,
}

/// Request body for redeeming a reward.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// Catalog entry to redeem.
    pub reward_id: String,
    /// Points the caller expects to spend; must match the catalog cost.
    pub points_to_spend: i64,
}

/// A redemption as returned by the API.
#[derive(Debug, Serialize)]
pub struct RedemptionResponse {
    /// Redemption id.
    pub id: String,
    /// The catalog entry redeemed.
    pub reward_id: String,
    /// Points debited.
    pub points_spent: i64,
    /// Code presented at fulfillment.
    pub redemption_code: String,
    /// Expiry-aware lifecycle status.
    pub status: RedemptionStatus,
    /// When the points were debited (RFC 3339).
    pub redeemed_at: String,
    /// When the reward was handed over (RFC 3339).
    pub fulfilled_at: Option<String>,
    /// When a pending redemption lapses (RFC 3339).
    pub expires_at: Option<String>,
}

impl From<&RewardRedemption> for RedemptionResponse {
    fn from(redemption: &RewardRedemption) -> Self {
        Self {
            id: redemption.id.to_string(),
            reward_id: redemption.reward_id.to_string(),
            points_spent: redemption.points_spent,
            redemption_code: redemption.redemption_code.clone(),
            status: redemption.effective_status(Utc::now()),
            redeemed_at: redemption.redeemed_at.to_rfc3339(),
            fulfilled_at: redemption.fulfilled_at.map(|t| t.to_rfc3339()),
            expires_at: redemption.expires_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response for a successful redemption: the redemption plus its ledger row.
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    /// The pending redemption.
    pub redemption: RedemptionResponse,
    /// The spend recorded on the ledger.
    pub transaction: TransactionResponse,
}

/// Query parameters for listing redemptions.
#[derive(Debug, Deserialize)]
pub struct ListRedemptionsQuery {
    /// Maximum number of rows to return (default 50, capped at 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for listing redemptions.
#[derive(Debug, Serialize)]
pub struct ListRedemptionsResponse {
    /// Redemptions, newest first.
    pub redemptions: Vec<RedemptionResponse>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Get the authenticated user's points balance.
///
/// Users with no confirmed activity get a zeroed bronze balance rather than
/// a 404.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state
        .store
        .get_balance(&auth.user_id)?
        .unwrap_or_else(|| PointsBalance::new(auth.user_id));

    Ok(Json(BalanceResponse::from(&balance)))
}

/// List the rewards catalog.
///
/// Only active entries are shown; sold-out entries stay listed so clients
/// can render them as unavailable.
pub async fn list_catalog(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Result<Json<CatalogResponse>, ApiError> {
    let rewards = state.store.list_rewards()?;

    Ok(Json(CatalogResponse {
        rewards: rewards
            .iter()
            .filter(|r| r.is_active)
            .map(RewardResponse::from)
            .collect(),
    }))
}

/// Create a rewards-catalog entry. Admin only.
pub async fn create_reward(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Json(request): Json<CreateRewardRequest>,
) -> Result<Json<RewardResponse>, ApiError> {
    if request.points_cost <= 0 {
        return Err(ApiError::BadRequest(
            "points_cost must be positive".to_string(),
        ));
    }
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }

    let reward = RewardItem::new(
        request.name,
        request.description,
        request.points_cost,
        request.availability,
    );
    state.store.put_reward(&reward)?;

    tracing::info!(
        admin = %auth.admin_id,
        reward_id = %reward.id,
        points_cost = reward.points_cost,
        "Reward catalog entry created"
    );

    Ok(Json(RewardResponse::from(&reward)))
}

/// Redeem a catalog reward for points.
///
/// The debit, the redemption row, and its ledger transaction land in one
/// atomic store write; a failure anywhere leaves the balance untouched.
pub async fn redeem(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(request): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, ApiError> {
    let reward_id = request
        .reward_id
        .parse::<RewardId>()
        .map_err(|_| ApiError::BadRequest("Invalid reward_id".to_string()))?;

    let (redemption, transaction) =
        state
            .store
            .redeem_points(&auth.user_id, &reward_id, request.points_to_spend)?;

    tracing::info!(
        user_id = %auth.user_id,
        reward_id = %reward_id,
        points = redemption.points_spent,
        code = %redemption.redemption_code,
        "Points redeemed"
    );

    Ok(Json(RedeemResponse {
        redemption: RedemptionResponse::from(&redemption),
        transaction: TransactionResponse::from(&transaction),
    }))
}

/// List the authenticated user's redemptions, newest first.
pub async fn list_redemptions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListRedemptionsQuery>,
) -> Result<Json<ListRedemptionsResponse>, ApiError> {
    let limit = query.limit.min(100);
    let redemptions = state.store.list_redemptions_by_user(&auth.user_id, limit)?;

    Ok(Json(ListRedemptionsResponse {
        redemptions: redemptions.iter().map(RedemptionResponse::from).collect(),
    }))
}

/// Mark a redemption fulfilled by its code. Admin only.
pub async fn fulfill_redemption(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(code): Path<String>,
) -> Result<Json<RedemptionResponse>, ApiError> {
    let redemption = state.store.fulfill_redemption(&code)?;

    tracing::info!(
        admin = %auth.admin_id,
        code = %code,
        redemption_id = %redemption.id,
        "Redemption fulfilled"
    );

    Ok(Json(RedemptionResponse::from(&redemption)))
}
