//! Sphere rail adapter.
//!
//! Stablecoin payment rail with on-chain payouts. No provider-side
//! customer objects; payments reference the user directly. Webhooks carry
//! a timestamped `t=...,v1=...` signature over `"{t}.{body}"`.

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
pub const PROVIDER_NAME: &str = "sphere";

/// Webhook signature header, carrying `t=<unix>,v1=<hex hmac>`.
pub const SIGNATURE_HEADER: &str = "sphere-signature";

/// Maximum webhook timestamp age accepted during verification.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Smallest accepted amount, in currency units.
const MINIMUM_AMOUNT: i64 = 10;

/// Sphere API adapter.
pub struct SphereProvider {
    client: Client,
    api_url: String,
    api_key: String,
}

impl SphereProvider {
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
            .get(format!(
                "{}/v1/payments/{provider_transaction_id}",
                self.api_url
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let payment: PaymentResource = handle_response(response).await?;

        Ok(PaymentStatusSnapshot {
            provider_transaction_id: payment.id,
            status: normalize_status(&payment.status),
            tx_hash: payment.tx_hash,
            confirmations: payment.confirmations,
            completed_at: payment.completed_at,
        })
    }
}

#[async_trait]
impl PaymentProvider for SphereProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &'static str {
        "Sphere"
    }

    fn minimum_amount(&self) -> Decimal {
        Decimal::from(MINIMUM_AMOUNT)
    }

    async fn create_customer(
        &self,
        _profile: &CustomerProfile,
    ) -> Result<CustomerOutcome, ProviderError> {
        // The rail has no customer objects; payments carry the user
        // reference directly.
        Ok(CustomerOutcome::Provisioned {
            customer_id: String::new(),
        })
    }

    async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentOutcome, ProviderError> {
        if request.amount < self.minimum_amount() {
            return Ok(PaymentOutcome::Declined {
                reason: format!(
                    "amount {} is below the Sphere minimum of {}",
                    request.amount,
                    self.minimum_amount()
                ),
            });
        }

        let body = CreatePaymentRequest {
            amount: request.amount.to_string(),
            currency: &request.currency,
            receiver: request.wallet_address.as_deref(),
            token: request.symbol.as_deref(),
            reference: request.user_id.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/v1/payments", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_client_error() {
            return Ok(PaymentOutcome::Declined {
                reason: read_error_message(response).await,
            });
        }

        let payment: PaymentResource = handle_response(response).await?;

        Ok(PaymentOutcome::Accepted {
            provider_transaction_id: payment.id,
            status: normalize_status(&payment.status),
            detail: payment.failure_reason,
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

/// Map a payment status to the ledger status machine.
fn normalize_status(status: &str) -> TransactionStatus {
    match status {
        "succeeded" => TransactionStatus::Confirmed,
        "failed" => TransactionStatus::Failed,
        "cancelled" => TransactionStatus::Cancelled,
        _ => TransactionStatus::Pending,
    }
}

/// Ledger effect of a webhook event type, or `None` for event types the
/// platform deliberately ignores.
#[must_use]
pub fn map_event(event_type: &str) -> Option<TransactionStatus> {
    match event_type {
        "payment.succeeded" => Some(TransactionStatus::Confirmed),
        "payment.failed" => Some(TransactionStatus::Failed),
        "payment.cancelled" => Some(TransactionStatus::Cancelled),
        _ => None,
    }
}

/// Parse a raw webhook body into the normalized event form.
pub fn parse_event(body: &[u8]) -> Result<ProviderEvent, serde_json::Error> {
    let envelope: WebhookEnvelope = serde_json::from_slice(body)?;
    Ok(ProviderEvent {
        event_type: envelope.event_type,
        object_ref: envelope.data.and_then(|d| d.payment).map(|p| p.id),
    })
}

/// Verify the timestamped signature header against the raw body bytes.
#[must_use]
pub fn verify_signature(secret: &str, payload: &[u8], headers: &HeaderMap) -> bool {
    let Some(header) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    crypto::verify_timestamped_signature(
        secret,
        payload,
        header,
        SIGNATURE_TOLERANCE_SECS,
        Utc::now().timestamp(),
    )
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreatePaymentRequest<'a> {
    amount: String,
    currency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    receiver: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResource {
    id: String,
    status: String,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    confirmations: Option<u32>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    #[serde(default)]
    payment: Option<WebhookPayment>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayment {
    id: String,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use puff_core::UserId;

    use super::*;

    fn request(amount: i64) -> PaymentRequest {
        PaymentRequest {
            user_id: UserId::generate(),
            amount: Decimal::from(amount),
            currency: "USD".to_string(),
            symbol: Some("USDC".to_string()),
            wallet_address: Some("0xfeed".to_string()),
            customer_id: None,
        }
    }

    #[test]
    fn event_table_is_an_allow_list() {
        assert_eq!(map_event("payment.succeeded"), Some(TransactionStatus::Confirmed));
        assert_eq!(map_event("payment.failed"), Some(TransactionStatus::Failed));
        assert_eq!(map_event("payment.cancelled"), Some(TransactionStatus::Cancelled));

        assert_eq!(map_event("payment.created"), None);
        assert_eq!(map_event("payout.succeeded"), None);
    }

    #[test]
    fn parses_webhook_envelope() {
        let body = br#"{"type":"payment.succeeded","data":{"payment":{"id":"pay_7"}}}"#;
        let event = parse_event(body).unwrap();
        assert_eq!(event.event_type, "payment.succeeded");
        assert_eq!(event.object_ref.as_deref(), Some("pay_7"));

        let bare = parse_event(br#"{"type":"ping"}"#).unwrap();
        assert!(bare.object_ref.is_none());
    }

    #[test]
    fn signature_scheme_is_timestamped() {
        let body = r#"{"type":"payment.succeeded"}"#;
        let now = Utc::now().timestamp();
        let sig = crypto::hmac_sha256_hex("whsec", format!("{now}.{body}").as_bytes());

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, format!("t={now},v1={sig}").parse().unwrap());
        assert!(verify_signature("whsec", body.as_bytes(), &headers));

        // A bare hex signature (the other rail's scheme) must not pass.
        let mut wrong = HeaderMap::new();
        wrong.insert(
            SIGNATURE_HEADER,
            crypto::hmac_sha256_hex("whsec", body.as_bytes()).parse().unwrap(),
        );
        assert!(!verify_signature("whsec", body.as_bytes(), &wrong));
    }

    #[tokio::test]
    async fn below_minimum_declines_without_a_request() {
        let server = MockServer::start().await;
        let provider = SphereProvider::new(&server.uri(), "key");

        let outcome = provider.process_payment(&request(5)).await.unwrap();
        match outcome {
            PaymentOutcome::Declined { reason } => assert!(reason.contains("minimum")),
            PaymentOutcome::Accepted { .. } => panic!("expected decline"),
        }

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accepted_payment_carries_provider_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pay_1",
                "status": "processing"
            })))
            .mount(&server)
            .await;

        let provider = SphereProvider::new(&server.uri(), "key");
        let outcome = provider.process_payment(&request(25)).await.unwrap();

        match outcome {
            PaymentOutcome::Accepted {
                provider_transaction_id,
                status,
                ..
            } => {
                assert_eq!(provider_transaction_id, "pay_1");
                assert_eq!(status, TransactionStatus::Pending);
            }
            PaymentOutcome::Declined { reason } => panic!("unexpected decline: {reason}"),
        }
    }

    #[tokio::test]
    async fn immediate_settlement_is_confirmed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pay_2",
                "status": "succeeded"
            })))
            .mount(&server)
            .await;

        let provider = SphereProvider::new(&server.uri(), "key");
        let outcome = provider.process_payment(&request(25)).await.unwrap();

        match outcome {
            PaymentOutcome::Accepted { status, .. } => {
                assert_eq!(status, TransactionStatus::Confirmed);
            }
            PaymentOutcome::Declined { reason } => panic!("unexpected decline: {reason}"),
        }
    }

    #[tokio::test]
    async fn status_snapshot_includes_chain_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments/pay_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pay_1",
                "status": "succeeded",
                "tx_hash": "0xdeadbeef",
                "confirmations": 12,
                "completed_at": "2026-01-10T12:00:00Z"
            })))
            .mount(&server)
            .await;

        let provider = SphereProvider::new(&server.uri(), "key");
        let snapshot = provider.get_payment_status("pay_1").await.unwrap();

        assert_eq!(snapshot.status, TransactionStatus::Confirmed);
        assert_eq!(snapshot.tx_hash.as_deref(), Some("0xdeadbeef"));
        assert_eq!(snapshot.confirmations, Some(12));
        assert!(snapshot.completed_at.is_some());
    }
}
