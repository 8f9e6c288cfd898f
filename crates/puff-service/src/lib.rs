//! Puff HTTP API Service.
//!
//! This crate provides the HTTP API for the Puff ledger, including:
//!
//! - Unified payment processing across crypto on-ramp providers
//! - Provider webhook ingestion with signature verification
//! - Reward points balances, catalog, and redemptions
//! - Merchant vault contributions and allocation summaries
//!
//! # Authentication
//!
//! The service supports three authentication methods:
//!
//! 1. **Identity JWT tokens** - For end-user requests (balance, redemptions)
//! 2. **Service API keys** - For service-to-service requests (checkout, ingestion)
//! 3. **Admin API keys** - For operational endpoints (catalog, providers, audit)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod payments;
pub mod providers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use payments::PaymentService;
pub use providers::{PaymentProvider, ProviderError, ProviderRegistry};
pub use routes::create_router;
pub use state::AppState;
