//! Ledger transaction types.
//!
//! Every monetary or point-denominated event on the platform creates exactly one
//! transaction record. Provider-settled transactions (deposits, on-ramps, top-ups,
//! purchases) are created `pending` and driven to a terminal status by webhook
//! reconciliation; internal ledger transactions (redemptions, reward grants) are
//! created already `confirmed`. Records are append-only and never deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::{TransactionId, UserId};

/// A ledger transaction.
///
/// `points_delta` carries the Puff Points effect of the transaction; it only
/// counts toward the user's balance once the status is `Confirmed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose ledger this transaction belongs to.
    pub user_id: UserId,

    /// What kind of event this records.
    pub kind: TransactionKind,

    /// Monetary amount in provider currency units. Zero for pure point movements.
    pub amount: Decimal,

    /// ISO currency code or trading symbol quote currency (e.g. "USD").
    pub currency: String,

    /// Signed Puff Points effect. Earn kinds carry a non-negative delta,
    /// redemptions a non-positive one. Applied to the balance at confirmation.
    pub points_delta: i64,

    /// Settling provider key ("cybrid", "sphere"). `None` for internal
    /// ledger transactions.
    pub provider: Option<String>,

    /// The provider's own transaction id. Unique per provider when present.
    pub provider_transaction_id: Option<String>,

    /// Current lifecycle status.
    pub status: TransactionStatus,

    /// Additional context (wallet address, symbol, customer id, reward name).
    pub metadata: serde_json::Value,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,

    /// When the transaction was last updated.
    pub updated_at: DateTime<Utc>,

    /// When the transaction reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Create a provider-settled payment transaction.
    ///
    /// The status comes straight from the adapter: providers that settle
    /// synchronously report `confirmed` here and the points apply immediately;
    /// asynchronous rails report `pending` and are reconciled by webhook.
    ///
    /// `points_delta` is taken as given; a wrong-signed delta fails
    /// [`Self::validate_points_sign`] at the persistence boundary rather than
    /// being silently coerced here.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn payment(
        user_id: UserId,
        kind: TransactionKind,
        amount: Decimal,
        currency: String,
        provider: String,
        provider_transaction_id: String,
        points_delta: i64,
        status: TransactionStatus,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::generate(),
            user_id,
            kind,
            amount,
            currency,
            points_delta,
            provider: Some(provider),
            provider_transaction_id: Some(provider_transaction_id),
            status,
            metadata,
            created_at: now,
            updated_at: now,
            completed_at: status.is_terminal().then_some(now),
        }
    }

    /// Create a confirmed redemption transaction (points spent on a reward).
    #[must_use]
    pub fn redemption(user_id: UserId, points_spent: i64, reward_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::generate(),
            user_id,
            kind: TransactionKind::Redemption,
            amount: Decimal::ZERO,
            currency: String::new(),
            points_delta: -points_spent.abs(), // Always negative for redemptions
            provider: None,
            provider_transaction_id: None,
            status: TransactionStatus::Confirmed,
            metadata: serde_json::json!({ "reward": reward_name }),
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        }
    }

    /// Create a confirmed reward-grant transaction (promotional points).
    #[must_use]
    pub fn reward_grant(user_id: UserId, points: i64, reason: String) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::generate(),
            user_id,
            kind: TransactionKind::Reward,
            amount: Decimal::ZERO,
            currency: String::new(),
            points_delta: points.abs(),
            provider: None,
            provider_transaction_id: None,
            status: TransactionStatus::Confirmed,
            metadata: serde_json::json!({ "reason": reason }),
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        }
    }

    /// Check that `points_delta` has the sign the kind demands.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PointsSignMismatch`] when an earn kind carries a
    /// negative delta or a spend kind a positive one.
    pub fn validate_points_sign(&self) -> Result<(), CoreError> {
        let ok = if self.kind.spends_points() {
            self.points_delta <= 0
        } else {
            self.points_delta >= 0
        };
        if ok {
            Ok(())
        } else {
            Err(CoreError::PointsSignMismatch {
                points_delta: self.points_delta,
                kind: self.kind.as_str().to_string(),
            })
        }
    }

    /// Advance the transaction to `next`, stamping `updated_at`/`completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidStatusTransition`] when the state machine
    /// forbids the move (terminal states are final).
    pub fn transition(&mut self, next: TransactionStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }
}

/// Kind of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Crypto funds deposited through a provider.
    CryptoDeposit,

    /// Fiat converted to crypto through an on-ramp provider.
    FiatOnramp,

    /// Points spent on a catalog reward.
    Redemption,

    /// Wallet balance top-up through a provider.
    TopUp,

    /// Promotional or manual point grant.
    Reward,

    /// Marketplace purchase settled through a provider.
    Purchase,
}

impl TransactionKind {
    /// Kinds that settle through an external payment provider.
    #[must_use]
    pub const fn is_provider_settled(&self) -> bool {
        matches!(
            self,
            Self::CryptoDeposit | Self::FiatOnramp | Self::TopUp | Self::Purchase
        )
    }

    /// Kinds whose points accrue from the monetary amount at confirmation.
    #[must_use]
    pub const fn earns_points(&self) -> bool {
        self.is_provider_settled()
    }

    /// Kinds that spend points (negative delta).
    #[must_use]
    pub const fn spends_points(&self) -> bool {
        matches!(self, Self::Redemption)
    }

    /// The snake_case wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CryptoDeposit => "crypto_deposit",
            Self::FiatOnramp => "fiat_onramp",
            Self::Redemption => "redemption",
            Self::TopUp => "top_up",
            Self::Reward => "reward",
            Self::Purchase => "purchase",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a transaction.
///
/// Transitions move only forward: `pending` may become any terminal status,
/// terminal statuses never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Submitted to the provider, awaiting settlement.
    Pending,

    /// Settled successfully; points applied.
    Confirmed,

    /// Rejected or errored at the provider.
    Failed,

    /// Cancelled before settlement.
    Cancelled,
}

impl TransactionStatus {
    /// Whether this status is final.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Confirmed | Self::Failed | Self::Cancelled
            )
        )
    }

    /// The snake_case wire name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
