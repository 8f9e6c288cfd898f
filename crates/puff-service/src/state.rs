//! Application state.

use std::sync::Arc;

use puff_store::{RocksStore, StoreError};

use crate::config::ServiceConfig;
use crate::payments::PaymentService;
use crate::providers::cybrid::CybridProvider;
use crate::providers::sphere::SphereProvider;
use crate::providers::ProviderRegistry;

/// Application state shared across handlers.
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Registered provider rails.
    pub registry: Arc<ProviderRegistry>,

    /// The unified payment flow.
    pub payments: PaymentService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Builds the provider registry from whichever rails are configured and
    /// seeds their provider records.
    ///
    /// # Errors
    ///
    /// Returns an error if seeding provider records fails.
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Result<Self, StoreError> {
        let registry = Arc::new(build_registry(&config));
        let payments = PaymentService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            config.points.clone(),
        );
        payments.seed_provider_records()?;

        Ok(Self {
            store,
            config,
            registry,
            payments,
        })
    }
}

/// Build the provider registry from configuration.
fn build_registry(config: &ServiceConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    let cybrid = config
        .cybrid_api_url
        .as_ref()
        .zip(config.cybrid_api_key.as_ref());
    if let Some((url, key)) = cybrid {
        tracing::info!(api_url = %url, "Cybrid rail enabled");
        registry.register(Arc::new(CybridProvider::new(url, key.clone())));
    } else {
        tracing::warn!("Cybrid not configured - payments through that rail will be rejected");
    }

    let sphere = config
        .sphere_api_url
        .as_ref()
        .zip(config.sphere_api_key.as_ref());
    if let Some((url, key)) = sphere {
        tracing::info!(api_url = %url, "Sphere rail enabled");
        registry.register(Arc::new(SphereProvider::new(url, key.clone())));
    } else {
        tracing::warn!("Sphere not configured - payments through that rail will be rejected");
    }

    registry
}
