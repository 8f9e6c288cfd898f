//! Cybrid rail adapter.
//!
//! Fiat on-ramp that settles buy trades. The rail keeps provider-side
//! customer objects, so a user's first payment provisions one. Webhooks
//! are signed with a plain hex HMAC-SHA256 over the raw body.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use async_trait::async_trait;
use puff_core::TransactionStatus;

use super::{
    handle_response, read_error_message, CustomerOutcome, CustomerProfile, PaymentOutcome,
    PaymentProvider, PaymentRequest, PaymentStatusSnapshot, ProviderError, ProviderEvent,
};
use crate::crypto;

/// Registry key for this rail.
pub const PROVIDER_NAME: &str = "cybrid";

/// Webhook signature header, carrying `hex(hmac_sha256(secret, body))`.
pub const SIGNATURE_HEADER: &str = "x-cybrid-signature";

/// Asset pair bought when the caller does not name one.
const DEFAULT_SYMBOL: &str = "BTC-USD";

/// Smallest accepted fiat amount, in currency units.
const MINIMUM_AMOUNT: i64 = 50;

/// Cybrid API adapter.
pub struct CybridProvider {
    client: Client,
    api_url: String,
    api_key: String,
}

impl CybridProvider {
    /// Create an adapter for the given API endpoint.
    #[must_use]
    pub fn new(api_url: &str, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(super::PROVIDER_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn fetch_status(
        &self,
        provider_transaction_id: &str,
    ) -> Result<PaymentStatusSnapshot, ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/trades/{provider_transaction_id}", self.api_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let trade: TradeResource = handle_response(response).await?;

        Ok(PaymentStatusSnapshot {
            provider_transaction_id: trade.guid,
            status: normalize_state(&trade.state),
            tx_hash: trade.tx_hash,
            confirmations: trade.confirmations,
            completed_at: trade.completed_at,
        })
    }
}

#[async_trait]
impl PaymentProvider for CybridProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &'static str {
        "Cybrid"
    }

    fn minimum_amount(&self) -> Decimal {
        Decimal::from(MINIMUM_AMOUNT)
    }

    fn requires_customer(&self) -> bool {
        true
    }

    async fn create_customer(
        &self,
        profile: &CustomerProfile,
    ) -> Result<CustomerOutcome, ProviderError> {
        let body = CreateCustomerRequest {
            customer_type: "individual",
            name: profile.name.as_deref(),
            email: profile.email.as_deref(),
            external_customer_id: profile.user_id.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/customers", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_client_error() {
            return Ok(CustomerOutcome::Declined {
                reason: read_error_message(response).await,
            });
        }

        let customer: CustomerResource = handle_response(response).await?;

        Ok(CustomerOutcome::Provisioned {
            customer_id: customer.guid,
        })
    }

    async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentOutcome, ProviderError> {
        if request.amount < self.minimum_amount() {
            return Ok(PaymentOutcome::Declined {
                reason: format!(
                    "amount {} is below the Cybrid minimum of {}",
                    request.amount,
                    self.minimum_amount()
                ),
            });
        }

        let body = CreateTradeRequest {
            customer_guid: request.customer_id.as_deref(),
            symbol: request.symbol.as_deref().unwrap_or(DEFAULT_SYMBOL),
            side: "buy",
            fiat_amount: request.amount.to_string(),
            fiat_currency: &request.currency,
        };

        let response = self
            .client
            .post(format!("{}/api/trades", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_client_error() {
            return Ok(PaymentOutcome::Declined {
                reason: read_error_message(response).await,
            });
        }

        let trade: TradeResource = handle_response(response).await?;

        Ok(PaymentOutcome::Accepted {
            provider_transaction_id: trade.guid,
            status: normalize_state(&trade.state),
            detail: trade.failure_code,
        })
    }

    async fn get_payment_status(
        &self,
        provider_transaction_id: &str,
    ) -> Result<PaymentStatusSnapshot, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_status(provider_transaction_id).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_retryable() && attempt < super::STATUS_POLL_ATTEMPTS => {
                    tracing::debug!(
                        provider = PROVIDER_NAME,
                        attempt,
                        error = %e,
                        "Status poll failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map a trade state to the ledger status machine.
///
/// Anything not terminal ("storing", "pending", "settling") stays pending.
fn normalize_state(state: &str) -> TransactionStatus {
    match state {
        "completed" => TransactionStatus::Confirmed,
        "failed" => TransactionStatus::Failed,
        "cancelled" => TransactionStatus::Cancelled,
        _ => TransactionStatus::Pending,
    }
}

/// Ledger effect of a webhook event type, or `None` for event types the
/// platform deliberately ignores.
///
/// The table is an allow-list: new provider event types have no effect
/// until they are added here.
#[must_use]
pub fn map_event(event_type: &str) -> Option<TransactionStatus> {
    match event_type {
        "trade.completed" | "transfer.completed" => Some(TransactionStatus::Confirmed),
        "trade.failed" | "transfer.failed" => Some(TransactionStatus::Failed),
        "trade.cancelled" | "transfer.cancelled" => Some(TransactionStatus::Cancelled),
        _ => None,
    }
}

/// Parse a raw webhook body into the normalized event form.
pub fn parse_event(body: &[u8]) -> Result<ProviderEvent, serde_json::Error> {
    let envelope: WebhookEnvelope = serde_json::from_slice(body)?;
    Ok(ProviderEvent {
        event_type: envelope.event_type,
        object_ref: envelope.object.and_then(|o| o.guid),
    })
}

/// Verify the hex HMAC signature header against the raw body bytes.
#[must_use]
pub fn verify_signature(secret: &str, payload: &[u8], headers: &HeaderMap) -> bool {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    crypto::verify_hex_signature(secret, payload, signature)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateCustomerRequest<'a> {
    #[serde(rename = "type")]
    customer_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    external_customer_id: String,
}

#[derive(Debug, Deserialize)]
struct CustomerResource {
    guid: String,
}

#[derive(Debug, Serialize)]
struct CreateTradeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_guid: Option<&'a str>,
    symbol: &'a str,
    side: &'a str,
    fiat_amount: String,
    fiat_currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct TradeResource {
    guid: String,
    state: String,
    #[serde(default)]
    failure_code: Option<String>,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    confirmations: Option<u32>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event_type: String,
    #[serde(default)]
    object: Option<WebhookObject>,
}

#[derive(Debug, Deserialize)]
struct WebhookObject {
    #[serde(default)]
    guid: Option<String>,
}
