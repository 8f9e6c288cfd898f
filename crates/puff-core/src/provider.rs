//! Registered payment-provider records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered payment rail.
///
/// Records are seeded at startup for every adapter the service is configured
/// with and consulted (through the process-wide cache) on every payment
/// request. Deactivation flips `is_active`; records are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Stable record id.
    pub id: uuid::Uuid,

    /// Unique provider key ("cybrid", "sphere"); the registry lookup key.
    pub name: String,

    /// Human-readable name for admin views.
    pub display_name: String,

    /// Whether payments may currently route through this provider.
    pub is_active: bool,

    /// Opaque provider-specific settings (never secrets).
    pub config: serde_json::Value,

    /// When the record was seeded.
    pub created_at: DateTime<Utc>,

    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

impl ProviderRecord {
    /// Seed an active record for a configured adapter.
    #[must_use]
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            display_name: display_name.into(),
            is_active: true,
            config: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    /// Flip the active flag, stamping `updated_at`.
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.updated_at = Utc::now();
    }
}
