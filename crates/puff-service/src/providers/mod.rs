//! Payment provider adapters.
//!
//! Each on-ramp rail implements the [`PaymentProvider`] trait behind the
//! [`ProviderRegistry`], so the payment flow never branches on a concrete
//! provider. Business rejections (below-minimum amounts, compliance
//! declines) are outcomes, not errors; [`ProviderError`] is reserved for
//! transport and API failures where the payment state may be unknown.

pub mod cybrid;
pub mod registry;
pub mod sphere;

pub use registry::ProviderRegistry;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use puff_core::{TransactionStatus, UserId};

/// Deadline for every outbound provider call.
pub(crate) const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Total attempts for a status poll (first try plus one retry).
///
/// Payment submission is never retried here: a timed-out submission may
/// have gone through, and a blind retry would double-charge.
pub(crate) const STATUS_POLL_ATTEMPTS: u32 = 2;

/// Customer details forwarded to rails that keep provider-side customer
/// objects.
#[derive(Debug, Clone)]
pub struct CustomerProfile {
    /// Platform user the customer object belongs to.
    pub user_id: UserId,
    /// Contact email, when the caller supplied one.
    pub email: Option<String>,
    /// Display name, when the caller supplied one.
    pub name: Option<String>,
}

/// A payment submission normalized for a provider rail.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    /// Paying user.
    pub user_id: UserId,
    /// Amount in `currency` units.
    pub amount: Decimal,
    /// ISO currency code, e.g. "USD".
    pub currency: String,
    /// Asset pair or token symbol, for rails that settle into crypto.
    pub symbol: Option<String>,
    /// Destination wallet, for rails that pay out on-chain.
    pub wallet_address: Option<String>,
    /// Provider-side customer id, for rails that require one.
    pub customer_id: Option<String>,
}

/// Result of provisioning a provider-side customer.
#[derive(Debug, Clone)]
pub enum CustomerOutcome {
    /// The provider created (or already had) a customer object.
    Provisioned {
        /// The provider's customer identifier.
        customer_id: String,
    },
    /// The provider refused to create the customer.
    Declined {
        /// Provider-reported reason.
        reason: String,
    },
}

/// Result of submitting a payment to a rail.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// The provider accepted the submission and assigned it an id.
    Accepted {
        /// The provider's transaction identifier.
        provider_transaction_id: String,
        /// Normalized settlement status at acceptance time.
        status: TransactionStatus,
        /// Optional provider detail (failure codes, notes).
        detail: Option<String>,
    },
    /// The provider rejected the submission outright. Nothing was charged
    /// and nothing should be recorded.
    Declined {
        /// Provider-reported reason.
        reason: String,
    },
}

/// Point-in-time provider view of a payment.
#[derive(Debug, Clone)]
pub struct PaymentStatusSnapshot {
    /// The provider's transaction identifier.
    pub provider_transaction_id: String,
    /// Normalized settlement status.
    pub status: TransactionStatus,
    /// On-chain transaction hash, once known.
    pub tx_hash: Option<String>,
    /// On-chain confirmation count, once known.
    pub confirmations: Option<u32>,
    /// When the provider finalized the payment.
    pub completed_at: Option<DateTime<Utc>>,
}

/// A provider webhook event reduced to what reconciliation needs.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    /// The provider's event type string, verbatim.
    pub event_type: String,
    /// The provider transaction id the event refers to, when present.
    pub object_ref: Option<String>,
}

/// Errors from provider adapters.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider did not answer within [`PROVIDER_TIMEOUT`].
    #[error("provider request timed out")]
    Timeout,

    /// Transport-level failure (connect, TLS, read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("provider API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or provider-reported message.
        message: String,
    },

    /// The provider answered 2xx with a body we could not parse.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl ProviderError {
    /// Whether a status poll may try again after this error.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Malformed(_) => false,
        }
    }
}

/// A payment rail the platform can settle through.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Registry key for this rail (stable, lowercase).
    fn name(&self) -> &'static str;

    /// Human-readable rail name.
    fn display_name(&self) -> &'static str;

    /// Smallest amount this rail accepts, in currency units.
    fn minimum_amount(&self) -> Decimal;

    /// Whether this rail needs a provider-side customer object before a
    /// user's first payment.
    fn requires_customer(&self) -> bool {
        false
    }

    /// Provision a provider-side customer for `profile`.
    async fn create_customer(
        &self,
        profile: &CustomerProfile,
    ) -> Result<CustomerOutcome, ProviderError>;

    /// Submit a payment to the rail.
    async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentOutcome, ProviderError>;

    /// Fetch the provider's current view of a payment.
    async fn get_payment_status(
        &self,
        provider_transaction_id: &str,
    ) -> Result<PaymentStatusSnapshot, ProviderError>;
}

/// Decode a success response, mapping non-2xx statuses to [`ProviderError::Api`].
pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pull a human-readable reason out of a provider error body.
///
/// Providers disagree on the envelope (`{"message"}` vs `{"error":{"message"}}`),
/// so this tries both before falling back to the raw body.
pub(crate) async fn read_error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if let Ok(body) = serde_json::from_str::<serde_json::Value>(&text) {
        let message = body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .or_else(|| body.pointer("/error/message").and_then(serde_json::Value::as_str));
        if let Some(message) = message {
            return message.to_string();
        }
    }

    if text.is_empty() {
        format!("request rejected with status {status}")
    } else {
        text
    }
}
