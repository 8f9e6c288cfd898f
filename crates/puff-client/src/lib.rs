//! Puff Ledger Client SDK.
//!
//! This crate provides a client library for services to interact with the
//! puff-ledger API.
//!
//! # Example
//!
//! ```no_run
//! use puff_client::{PuffClient, ProcessPaymentRequest};
//! use rust_decimal::Decimal;
//!
//! # async fn example() -> Result<(), puff_client::ClientError> {
//! let client = PuffClient::new(
//!     "http://puff-ledger.payments.svc:8080",
//!     "your-service-api-key",
//! );
//!
//! // Settle a top-up through the Cybrid rail
//! let transaction = client.process_payment(ProcessPaymentRequest {
//!     provider: "cybrid".to_string(),
//!     user_id: "user-uuid".to_string(),
//!     amount: Decimal::from(100),
//!     currency: None,
//!     kind: None,
//!     symbol: None,
//!     wallet_address: None,
//!     email: None,
//!     name: None,
//!     metadata: None,
//! }).await?;
//!
//! println!("Recorded {} ({} points)", transaction.id, transaction.points_delta);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, PuffClient};
pub use error::ClientError;
pub use types::*;
