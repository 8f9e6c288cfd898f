//! Payment processing handlers.
//!
//! Payments enter here from trusted backend services, get routed to the
//! selected provider rail, and come back as ledger transactions.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use puff_core::{Transaction, TransactionId, TransactionKind, TransactionStatus, UserId};
use puff_store::Store;

use crate::auth::{AuthUser, ServiceAuth};
use crate::error::ApiError;
use crate::payments::PaymentSubmission;
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request body for processing a payment.
#[derive(Debug, Deserialize)]
pub struct ProcessPaymentRequest {
    /// Rail to settle through, e.g. "cybrid" or "sphere".
    pub provider: String,
    /// Paying user id.
    pub user_id: String,
    /// Amount in `currency` units.
    pub amount: Decimal,
    /// ISO currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Ledger kind of the resulting transaction.
    #[serde(default = "default_kind")]
    pub kind: TransactionKind,
    /// Asset pair or token symbol, forwarded to the rail.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Destination wallet address, forwarded to the rail.
    #[serde(default)]
    pub wallet_address: Option<String>,
    /// Contact email for rails that provision customers.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name for rails that provision customers.
    #[serde(default)]
    pub name: Option<String>,
    /// Opaque caller metadata, stored on the ledger row.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_kind() -> TransactionKind {
    TransactionKind::TopUp
}

/// A ledger transaction as returned by the API.
#[derive(Debug, Serialize)]
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

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            user_id: tx.user_id.to_string(),
            kind: tx.kind,
            amount: tx.amount,
            currency: tx.currency.clone(),
            points_delta: tx.points_delta,
            provider: tx.provider.clone(),
            provider_transaction_id: tx.provider_transaction_id.clone(),
            status: tx.status,
            metadata: tx.metadata.clone(),
            created_at: tx.created_at.to_rfc3339(),
            completed_at: tx.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Query parameters for listing transactions.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of rows to return (default 50, capped at 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of rows to skip.
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for listing transactions.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions, newest first.
    pub transactions: Vec<TransactionResponse>,
    /// Whether more rows exist beyond this page.
    pub has_more: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Process a payment through a provider rail.
///
/// Requires service authentication. The transaction is recorded pending and
/// confirmed either inline (when the rail settles synchronously) or later by
/// webhook.
pub async fn process_payment(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(request): Json<ProcessPaymentRequest>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let user_id = request
        .user_id
        .parse::<UserId>()
        .map_err(|_| ApiError::BadRequest("Invalid user_id".to_string()))?;

    tracing::debug!(
        service = %auth.service_name,
        provider = %request.provider,
        user_id = %user_id,
        amount = %request.amount,
        "Processing payment"
    );

    let submission = PaymentSubmission {
        user_id,
        provider: request.provider,
        amount: request.amount,
        currency: request.currency,
        kind: request.kind,
        symbol: request.symbol,
        wallet_address: request.wallet_address,
        email: request.email,
        name: request.name,
        metadata: request.metadata,
    };

    let transaction = state.payments.process(submission).await?;
    Ok(Json(TransactionResponse::from(&transaction)))
}

/// Get a transaction by id.
///
/// Pending provider-settled transactions are refreshed against the rail
/// before being returned, so a poll sees settlement as soon as the rail
/// reports it even if the webhook is delayed.
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let transaction_id = id
        .parse::<TransactionId>()
        .map_err(|_| ApiError::BadRequest("Invalid transaction id".to_string()))?;

    let transaction = state
        .store
        .get_transaction(&transaction_id)?
        .ok_or_else(|| ApiError::NotFound("Transaction not found".to_string()))?;

    let transaction = state.payments.refresh_pending(transaction).await?;
    Ok(Json(TransactionResponse::from(&transaction)))
}

/// List the authenticated user's transactions, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let limit = query.limit.min(100);

    // Fetch one extra row to detect whether more pages exist.
    let mut rows = state
        .store
        .list_transactions_by_user(&auth.user_id, limit + 1, query.offset)?;

    let has_more = rows.len() > limit;
    rows.truncate(limit);

    Ok(Json(ListTransactionsResponse {
        transactions: rows.iter().map(TransactionResponse::from).collect(),
        has_more,
    }))
}
