//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use puff_core::{PointsPolicy, VaultPolicy};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/puff-ledger").
    pub data_dir: String,

    /// Identity provider base URL for JWT validation.
    pub auth_base_url: String,

    /// Expected JWT audience (default: "puff-ledger").
    pub auth_audience: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Admin API key for operational endpoints.
    pub admin_api_key: Option<String>,

    /// Cybrid API URL (optional; the rail is disabled without it).
    pub cybrid_api_url: Option<String>,

    /// Cybrid API key (optional).
    pub cybrid_api_key: Option<String>,

    /// Cybrid webhook signing secret (optional).
    pub cybrid_webhook_secret: Option<String>,

    /// Sphere API URL (optional; the rail is disabled without it).
    pub sphere_api_url: Option<String>,

    /// Sphere API key (optional).
    pub sphere_api_key: Option<String>,

    /// Sphere webhook signing secret (optional).
    pub sphere_webhook_secret: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Reward points accrual policy.
    pub points: PointsPolicy,

    /// Merchant vault allocation policy.
    pub vault: VaultPolicy,
}

/// Provider rail secrets file structure.
#[derive(Debug, Deserialize)]
struct RailSecrets {
    api_url: String,
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        // Try to load rail secrets from file first, then fall back to env vars
        let (cybrid_api_url, cybrid_api_key, cybrid_webhook_secret) =
            load_rail_secrets("cybrid", "CYBRID");
        let (sphere_api_url, sphere_api_key, sphere_webhook_secret) =
            load_rail_secrets("sphere", "SPHERE");

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/puff-ledger".into()),
            auth_base_url: std::env::var("AUTH_BASE_URL")
                .unwrap_or_else(|_| "https://id.puff.app".into()),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "puff-ledger".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            cybrid_api_url,
            cybrid_api_key,
            cybrid_webhook_secret,
            sphere_api_url,
            sphere_api_key,
            sphere_webhook_secret,
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            points: PointsPolicy::default(),
            vault: VaultPolicy::default(),
        }
    }
}

/// Load one rail's secrets from file or environment.
fn load_rail_secrets(
    rail: &str,
    env_prefix: &str,
) -> (Option<String>, Option<String>, Option<String>) {
    // Try multiple paths for the secrets file
    let secret_paths = [
        format!(".secrets/{rail}.json"),
        format!("puff/.secrets/{rail}.json"),
        format!("puff/service/.secrets/{rail}.json"),
        format!("../.secrets/{rail}.json"),
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<RailSecrets>(path) {
            tracing::info!(rail = %rail, path = %path, "Loaded rail secrets from file");
            return (
                Some(secrets.api_url),
                Some(secrets.api_key),
                secrets.webhook_secret,
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!(rail = %rail, "Rail secrets file not found, using environment variables");
    (
        std::env::var(format!("{env_prefix}_API_URL")).ok(),
        std::env::var(format!("{env_prefix}_API_KEY")).ok(),
        std::env::var(format!("{env_prefix}_WEBHOOK_SECRET")).ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/puff-ledger".into(),
            auth_base_url: "https://id.puff.app".into(),
            auth_audience: "puff-ledger".into(),
            service_api_key: None,
            admin_api_key: None,
            cybrid_api_url: None,
            cybrid_api_key: None,
            cybrid_webhook_secret: None,
            sphere_api_url: None,
            sphere_api_key: None,
            sphere_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            points: PointsPolicy::default(),
            vault: VaultPolicy::default(),
        }
    }
}
