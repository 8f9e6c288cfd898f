//! Client error types.

/// Errors that can occur when using the puff-ledger client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Insufficient points for a redemption.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current spendable points.
        balance: i64,
        /// Points the redemption needs.
        required: i64,
    },

    /// The requested provider rail is not available.
    #[error("provider not available: {provider}")]
    UnknownProvider {
        /// The provider name.
        provider: String,
    },

    /// The provider timed out; the payment state is unknown on its side.
    #[error("provider timed out; payment state is unknown")]
    ProviderTimeout,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
