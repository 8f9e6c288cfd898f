//! Puff Ledger HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, ContributionResponse, ProcessPaymentRequest,
    RecordContributionRequest, RedeemRequest, RedeemResponse, TransactionResponse,
    VaultSummaryResponse,
};

/// Puff Ledger API client.
///
/// Provides methods for settling payments, reporting vault contributions,
/// and reading balances.
#[derive(Debug, Clone)]
pub struct PuffClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl PuffClient {
    /// Create a new puff-ledger client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the puff-ledger service (e.g., `"http://puff-ledger:8080"`)
    /// * `api_key` - Service API key for authentication
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new puff-ledger client with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with default settings).
    #[must_use]
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        }
    }

    /// Process a payment through a provider rail.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    /// A [`ClientError::ProviderTimeout`] means the payment state is unknown
    /// on the provider side; do not resubmit blindly.
    pub async fn process_payment(
        &self,
        request: ProcessPaymentRequest,
    ) -> Result<TransactionResponse, ClientError> {
        let url = format!("{}/v1/payments/process", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a transaction by id.
    ///
    /// Pending provider-settled transactions are refreshed against the rail
    /// server-side before being returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_payment(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionResponse, ClientError> {
        let url = format!("{}/v1/payments/{transaction_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Record a merchant fee contribution to the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn record_contribution(
        &self,
        request: RecordContributionRequest,
    ) -> Result<ContributionResponse, ClientError> {
        let url = format!("{}/v1/vault/contributions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the trustee summary of the vault (requires the admin key, not the
    /// service API key).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_vault_summary(
        &self,
        admin_key: &str,
    ) -> Result<VaultSummaryResponse, ClientError> {
        let url = format!("{}/v1/vault/summary", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-admin-key", admin_key)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a user's points balance (requires user JWT, not service API key).
    ///
    /// This method is typically used by the user-facing app, not by services.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_balance(&self, user_jwt: &str) -> Result<BalanceResponse, ClientError> {
        let url = format!("{}/v1/rewards/balance", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Redeem a catalog reward (requires user JWT, not service API key).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InsufficientBalance`] when the user cannot
    /// afford the reward, or another error if the request fails.
    pub async fn redeem(
        &self,
        user_jwt: &str,
        request: RedeemRequest,
    ) -> Result<RedeemResponse, ClientError> {
        let url = format!("{}/v1/rewards/redeem", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;

                // Map specific error codes to typed errors
                match code {
                    "insufficient_balance" => {
                        let balance = api_error
                            .error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("balance"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);
                        let required = api_error
                            .error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("required"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);

                        Err(ClientError::InsufficientBalance { balance, required })
                    }
                    "unknown_provider" => Err(ClientError::UnknownProvider {
                        provider: message
                            .rsplit(": ")
                            .next()
                            .unwrap_or(&message)
                            .to_string(),
                    }),
                    "provider_timeout" => Err(ClientError::ProviderTimeout),
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}
