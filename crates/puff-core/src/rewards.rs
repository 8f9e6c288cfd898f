//! Puff Points balances, tiers, and the rewards catalog.
//!
//! Points accrue from confirmed provider-settled transactions and are spent on
//! catalog rewards. Tier standing is computed from cumulative earned points
//! (`tier_points`), which spending never reduces.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::transaction::TransactionKind;
use crate::{RedemptionId, RewardId, UserId};

/// Default accrual rate: points earned per whole currency unit at bronze.
pub const DEFAULT_BASE_POINTS_PER_UNIT: i64 = 10;

/// Days before a pending redemption expires.
pub const REDEMPTION_EXPIRY_DAYS: i64 = 30;

/// Loyalty tier. Thresholds are over cumulative earned points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Entry tier: [0, 500) earned points, 1.00x accrual.
    Bronze,

    /// [500, 1500) earned points, 1.25x accrual.
    Silver,

    /// [1500, 5000) earned points, 1.50x accrual.
    Gold,

    /// 5000+ earned points, 2.00x accrual.
    Platinum,
}

impl Tier {
    /// Minimum earned points required for this tier.
    #[must_use]
    pub const fn min_points(&self) -> i64 {
        match self {
            Self::Bronze => 0,
            Self::Silver => 500,
            Self::Gold => 1500,
            Self::Platinum => 5000,
        }
    }

    /// Accrual multiplier for this tier, in percent (100 = 1.00x).
    #[must_use]
    pub const fn multiplier_percent(&self) -> u32 {
        match self {
            Self::Bronze => 100,
            Self::Silver => 125,
            Self::Gold => 150,
            Self::Platinum => 200,
        }
    }

    /// The next tier up, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Bronze => Some(Self::Silver),
            Self::Silver => Some(Self::Gold),
            Self::Gold => Some(Self::Platinum),
            Self::Platinum => None,
        }
    }

    /// Select the highest tier whose threshold is at or below `tier_points`.
    #[must_use]
    pub const fn for_points(tier_points: i64) -> Self {
        if tier_points >= Self::Platinum.min_points() {
            Self::Platinum
        } else if tier_points >= Self::Gold.min_points() {
            Self::Gold
        } else if tier_points >= Self::Silver.min_points() {
            Self::Silver
        } else {
            Self::Bronze
        }
    }

    /// The snake_case wire name of this tier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accrual policy: how monetary amounts convert to Puff Points.
///
/// These are product-owned configuration constants, not derived business
/// logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsPolicy {
    /// Points earned per whole currency unit before the tier multiplier.
    pub base_points_per_unit: i64,
}

impl Default for PointsPolicy {
    fn default() -> Self {
        Self {
            base_points_per_unit: DEFAULT_BASE_POINTS_PER_UNIT,
        }
    }
}

impl PointsPolicy {
    /// Points accrued by a transaction of `kind` for `amount` at `tier`.
    ///
    /// Earning kinds accrue `floor(amount x base_rate x tier multiplier)`;
    /// every other kind accrues 0 here (redemptions and grants carry their
    /// own explicit deltas). Non-positive amounts accrue 0.
    #[must_use]
    pub fn earned_points(&self, kind: TransactionKind, amount: Decimal, tier: Tier) -> i64 {
        if !kind.earns_points() || amount <= Decimal::ZERO {
            return 0;
        }
        let base = amount * Decimal::from(self.base_points_per_unit);
        let scaled = base * Decimal::from(tier.multiplier_percent()) / Decimal::from(100u32);
        scaled.floor().to_i64().unwrap_or(0)
    }
}

/// Materialized running Puff Points totals for one user.
///
/// `total_points` always equals the sum of `points_delta` over the user's
/// confirmed transactions and never goes negative; the store adjusts it in
/// the same atomic write as the confirming transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsBalance {
    /// The user this balance belongs to.
    pub user_id: UserId,

    /// Spendable points.
    pub total_points: i64,

    /// Current loyalty tier, derived from `tier_points`.
    pub tier: Tier,

    /// Cumulative earned points; never reduced by spending.
    pub tier_points: i64,

    /// Cumulative points spent on redemptions.
    pub lifetime_spent: i64,

    /// When the balance was last adjusted.
    pub updated_at: DateTime<Utc>,
}

impl PointsBalance {
    /// Create a zeroed balance for a new user.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            total_points: 0,
            tier: Tier::Bronze,
            tier_points: 0,
            lifetime_spent: 0,
            updated_at: Utc::now(),
        }
    }

    /// Check the balance covers a spend of `points`.
    #[must_use]
    pub const fn has_sufficient_points(&self, points: i64) -> bool {
        self.total_points >= points
    }

    /// Apply a confirmed transaction's delta.
    ///
    /// Callers must reject negative deltas that exceed `total_points` before
    /// calling; this method assumes the overdraft check already happened
    /// under the store's write lock.
    pub fn apply_delta(&mut self, points_delta: i64) {
        self.total_points += points_delta;
        if points_delta >= 0 {
            self.tier_points += points_delta;
        } else {
            self.lifetime_spent += -points_delta;
        }
        self.tier = Tier::for_points(self.tier_points);
        self.updated_at = Utc::now();
    }

    /// Earned points still needed to reach the next tier, if there is one.
    #[must_use]
    pub fn points_to_next_tier(&self) -> Option<i64> {
        self.tier
            .next()
            .map(|next| (next.min_points() - self.tier_points).max(0))
    }
}

/// A rewards-catalog entry users can redeem points for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardItem {
    /// Catalog entry id.
    pub id: RewardId,

    /// Display name.
    pub name: String,

    /// Display description.
    pub description: String,

    /// Points required to redeem.
    pub points_cost: i64,

    /// Remaining stock; `None` means unlimited.
    pub availability: Option<u32>,

    /// Whether the entry is currently offered.
    pub is_active: bool,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,

    /// When the entry was last updated.
    pub updated_at: DateTime<Utc>,
}

impl RewardItem {
    /// Create an active catalog entry.
    #[must_use]
    pub fn new(
        name: String,
        description: String,
        points_cost: i64,
        availability: Option<u32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RewardId::generate(),
            name,
            description,
            points_cost,
            availability,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the entry can currently be redeemed.
    #[must_use]
    pub fn is_redeemable(&self) -> bool {
        self.is_active && self.availability.map_or(true, |count| count > 0)
    }
}

/// Lifecycle status of a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    /// Redeemed, awaiting fulfillment.
    Pending,

    /// Fulfilled by a merchant or admin.
    Completed,

    /// Expired before fulfillment.
    Expired,
}

/// A point-for-reward exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardRedemption {
    /// Redemption id.
    pub id: RedemptionId,

    /// The redeeming user.
    pub user_id: UserId,

    /// The catalog entry redeemed.
    pub reward_id: RewardId,

    /// Points debited.
    pub points_spent: i64,

    /// Unique code presented at fulfillment, derived from the redemption id.
    pub redemption_code: String,

    /// Stored lifecycle status. See [`Self::effective_status`] for the
    /// expiry-aware view.
    pub status: RedemptionStatus,

    /// When the points were debited.
    pub redeemed_at: DateTime<Utc>,

    /// When the reward was handed over.
    pub fulfilled_at: Option<DateTime<Utc>>,

    /// When a pending redemption lapses.
    pub expires_at: Option<DateTime<Utc>>,
}

impl RewardRedemption {
    /// Create a pending redemption for `reward`, spending its full cost.
    #[must_use]
    pub fn new(user_id: UserId, reward: &RewardItem) -> Self {
        let id = RedemptionId::generate();
        let now = Utc::now();
        Self {
            id,
            user_id,
            reward_id: reward.id,
            points_spent: reward.points_cost,
            redemption_code: format!("PV-{id}"),
            status: RedemptionStatus::Pending,
            redeemed_at: now,
            fulfilled_at: None,
            expires_at: Some(now + Duration::days(REDEMPTION_EXPIRY_DAYS)),
        }
    }

    /// The status as of `now`: a pending redemption past `expires_at` reads
    /// as expired without a background job ever rewriting it.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> RedemptionStatus {
        match (self.status, self.expires_at) {
            (RedemptionStatus::Pending, Some(expiry)) if now >= expiry => {
                RedemptionStatus::Expired
            }
            (status, _) => status,
        }
    }

    /// Mark the redemption fulfilled.
    pub fn mark_fulfilled(&mut self, now: DateTime<Utc>) {
        self.status = RedemptionStatus::Completed;
        self.fulfilled_at = Some(now);
    }
}
