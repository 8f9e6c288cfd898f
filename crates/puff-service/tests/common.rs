//! Common test utilities for puff-ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use puff_core::UserId;
use puff_service::{create_router, AppState, ServiceConfig};
use puff_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle to the store, for seeding and inspecting state.
    pub store: Arc<RocksStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
    /// The admin API key for admin requests.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and no provider rails.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness with the Cybrid rail pointed at a mock server.
    pub fn with_cybrid(api_url: &str) -> Self {
        let api_url = api_url.to_string();
        Self::with_config(move |config| {
            config.cybrid_api_url = Some(api_url);
            config.cybrid_api_key = Some("cybrid-test-key".to_string());
        })
    }

    /// Create a harness with the Sphere rail pointed at a mock server.
    pub fn with_sphere(api_url: &str) -> Self {
        let api_url = api_url.to_string();
        Self::with_config(move |config| {
            config.sphere_api_url = Some(api_url);
            config.sphere_api_key = Some("sphere-test-key".to_string());
        })
    }

    /// Create a harness with a customized configuration.
    ///
    /// The base configuration has both webhook secrets set and no provider
    /// rails; `customize` runs before the router is built.
    pub fn with_config(customize: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let service_api_key = "test-service-key".to_string();
        let admin_api_key = "test-admin-key".to_string();

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_base_url: "http://localhost".into(),
            auth_audience: "puff-ledger".into(),
            service_api_key: Some(service_api_key.clone()),
            admin_api_key: Some(admin_api_key.clone()),
            cybrid_api_url: None,
            cybrid_api_key: None,
            cybrid_webhook_secret: Some("cybrid-test-secret".into()),
            sphere_api_url: None,
            sphere_api_key: None,
            sphere_webhook_secret: Some("sphere-test-secret".into()),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            points: puff_core::PointsPolicy::default(),
            vault: puff_core::VaultPolicy::default(),
        };
        customize(&mut config);

        let state = AppState::new(Arc::clone(&store), config).expect("Failed to build app state");
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            store,
            _temp_dir: temp_dir,
            test_user_id,
            service_api_key,
            admin_api_key,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        let other_user = UserId::generate();
        format!("Bearer test-token:{other_user}")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
