//! Admin handlers: provider records and the webhook audit log.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use puff_core::{AuditEntry, AuditStatus, ProviderRecord};
use puff_store::Store;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// A provider record as returned by the API.
#[derive(Debug, Serialize)]
pub struct ProviderResponse {
    /// Unique provider key.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Whether payments may currently route through this provider.
    pub is_active: bool,
    /// Whether an adapter is configured for this provider in this process.
    pub is_configured: bool,
    /// When the record was last changed (RFC 3339).
    pub updated_at: String,
}

/// Response for listing provider records.
#[derive(Debug, Serialize)]
pub struct ListProvidersResponse {
    /// Provider records, sorted by name.
    pub providers: Vec<ProviderResponse>,
}

/// An audit-log row as returned by the API.
#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    /// Entry id.
    pub id: String,
    /// Provider key the webhook endpoint belongs to.
    pub provider: String,
    /// Provider-reported event type.
    pub event_type: String,
    /// Provider transaction id the event referenced, when known.
    pub object_ref: Option<String>,
    /// Branch the call took.
    pub status: AuditStatus,
    /// Truncated error chain or context.
    pub detail: Option<String>,
    /// When the webhook arrived (RFC 3339).
    pub received_at: String,
}

impl From<&AuditEntry> for AuditEntryResponse {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            provider: entry.provider.clone(),
            event_type: entry.event_type.clone(),
            object_ref: entry.object_ref.clone(),
            status: entry.status,
            detail: entry.detail.clone(),
            received_at: entry.received_at.to_rfc3339(),
        }
    }
}

/// Query parameters for listing audit entries.
#[derive(Debug, Deserialize)]
pub struct ListAuditQuery {
    /// Maximum number of rows to return (default 50, capped at 500).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for listing audit entries.
#[derive(Debug, Serialize)]
pub struct ListAuditResponse {
    /// Audit entries, newest first.
    pub entries: Vec<AuditEntryResponse>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List provider records. Admin only.
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
) -> Result<Json<ListProvidersResponse>, ApiError> {
    let mut records = state.store.list_providers()?;
    records.sort_by(|a, b| a.name.cmp(&b.name));

    let providers = records
        .iter()
        .map(|record| provider_response(&state, record))
        .collect();

    Ok(Json(ListProvidersResponse { providers }))
}

/// Enable payment routing through a provider. Admin only.
pub async fn activate_provider(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(name): Path<String>,
) -> Result<Json<ProviderResponse>, ApiError> {
    set_provider_active(&state, &auth, &name, true)
}

/// Disable payment routing through a provider. Admin only.
///
/// Deactivation stops new payments only; pending transactions still settle
/// through status polls and webhooks.
pub async fn deactivate_provider(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(name): Path<String>,
) -> Result<Json<ProviderResponse>, ApiError> {
    set_provider_active(&state, &auth, &name, false)
}

/// List webhook audit entries, newest first. Admin only.
pub async fn list_audit_entries(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<ListAuditResponse>, ApiError> {
    let limit = query.limit.min(500);
    let entries = state.store.list_audit_entries(limit)?;

    Ok(Json(ListAuditResponse {
        entries: entries.iter().map(AuditEntryResponse::from).collect(),
    }))
}

// =============================================================================
// Helpers
// =============================================================================

fn provider_response(state: &AppState, record: &ProviderRecord) -> ProviderResponse {
    ProviderResponse {
        name: record.name.clone(),
        display_name: record.display_name.clone(),
        is_active: record.is_active,
        is_configured: state.registry.get(&record.name).is_some(),
        updated_at: record.updated_at.to_rfc3339(),
    }
}

fn set_provider_active(
    state: &AppState,
    auth: &AdminAuth,
    name: &str,
    active: bool,
) -> Result<Json<ProviderResponse>, ApiError> {
    let mut record = state
        .store
        .get_provider(name)?
        .ok_or_else(|| ApiError::NotFound(format!("Provider not found: {name}")))?;

    record.set_active(active);
    state.store.put_provider(&record)?;
    state.payments.refresh_provider_record(&record);

    tracing::info!(
        admin = %auth.admin_id,
        provider = %record.name,
        is_active = record.is_active,
        "Provider routing flag changed"
    );

    Ok(Json(provider_response(state, &record)))
}
