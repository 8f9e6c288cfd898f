//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, health, payments, rewards, vault, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Payments (Service API Key auth)
/// - `POST /v1/payments/process` - Process a payment through a provider rail
/// - `GET /v1/payments/:id` - Get a transaction, refreshing pending status
///
/// ## Ledger and rewards (Puff ID JWT auth)
/// - `GET /v1/transactions` - List the caller's transactions
/// - `GET /v1/rewards/balance` - Get the caller's points balance
/// - `GET /v1/rewards/catalog` - List active catalog entries
/// - `POST /v1/rewards/redeem` - Redeem a reward for points
/// - `GET /v1/rewards/redemptions` - List the caller's redemptions
///
/// ## Vault (Service API Key / Admin API Key auth)
/// - `POST /v1/vault/contributions` - Record a merchant fee contribution
/// - `GET /v1/vault/summary` - Trustee summary
///
/// ## Admin (Admin API Key auth)
/// - `POST /v1/rewards/catalog` - Create a catalog entry
/// - `POST /v1/rewards/redemptions/:code/fulfill` - Fulfill a redemption
/// - `GET /v1/providers` - List provider records
/// - `POST /v1/providers/:name/activate` - Enable a provider rail
/// - `POST /v1/providers/:name/deactivate` - Disable a provider rail
/// - `GET /v1/audit` - List webhook audit entries
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/:provider` - Provider settlement events
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Create concurrency-limited API routes
    let api_routes = Router::new()
        // Payments
        .route("/payments/process", post(payments::process_payment))
        .route("/payments/:id", get(payments::get_payment))
        // Ledger
        .route("/transactions", get(payments::list_transactions))
        // Rewards
        .route("/rewards/balance", get(rewards::get_balance))
        .route(
            "/rewards/catalog",
            get(rewards::list_catalog).post(rewards::create_reward),
        )
        .route("/rewards/redeem", post(rewards::redeem))
        .route("/rewards/redemptions", get(rewards::list_redemptions))
        .route(
            "/rewards/redemptions/:code/fulfill",
            post(rewards::fulfill_redemption),
        )
        // Vault
        .route("/vault/contributions", post(vault::record_contribution))
        .route("/vault/summary", get(vault::get_summary))
        // Admin
        .route("/providers", get(admin::list_providers))
        .route("/providers/:name/activate", post(admin::activate_provider))
        .route(
            "/providers/:name/deactivate",
            post(admin::deactivate_provider),
        )
        .route("/audit", get(admin::list_audit_entries))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health_check))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - delivery is controlled by the providers)
        .route("/webhooks/:provider", post(webhooks::provider_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
