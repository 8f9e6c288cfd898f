//! Inbound provider webhook handler.
//!
//! One endpoint serves every rail: `POST /v1/webhooks/:provider`. The
//! per-rail pieces (secret, signature scheme, payload shape, event mapping)
//! come from a small dispatch table; everything else, including the audit
//! trail and the idempotent status transition, is shared.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use puff_core::{AuditEntry, AuditStatus, TransactionStatus};
use puff_store::{EventOutcome, Store};

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::providers::{cybrid, sphere, ProviderEvent};
use crate::state::AppState;

/// Acknowledgement returned for every verified webhook call.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Always true; providers only check for a 2xx.
    pub ok: bool,
}

/// Per-rail webhook plumbing driven by the shared handler.
struct WebhookRail {
    secret: Option<String>,
    verify: fn(&str, &[u8], &HeaderMap) -> bool,
    parse: fn(&[u8]) -> Result<ProviderEvent, serde_json::Error>,
    map: fn(&str) -> Option<TransactionStatus>,
}

fn rail_for(config: &ServiceConfig, provider: &str) -> Option<WebhookRail> {
    match provider {
        cybrid::PROVIDER_NAME => Some(WebhookRail {
            secret: config.cybrid_webhook_secret.clone(),
            verify: cybrid::verify_signature,
            parse: cybrid::parse_event,
            map: cybrid::map_event,
        }),
        sphere::PROVIDER_NAME => Some(WebhookRail {
            secret: config.sphere_webhook_secret.clone(),
            verify: sphere::verify_signature,
            parse: sphere::parse_event,
            map: sphere::map_event,
        }),
        _ => None,
    }
}

/// Handle an inbound provider webhook.
///
/// The body is taken as raw bytes: the signature covers the payload exactly
/// as the provider sent it, and a body that is not valid UTF-8 (or not JSON)
/// must still reach the audit trail rather than being bounced by an
/// extractor. Every call for a known provider writes exactly one audit row
/// recording the branch taken. Verified events return 200 even when nothing
/// can be applied (replays, conflicts, untracked event types, malformed
/// payloads) so the provider stops redelivering them; only a bad signature
/// earns a 401.
pub async fn provider_webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let Some(rail) = rail_for(&state.config, &provider) else {
        return Err(ApiError::UnknownProvider(provider));
    };

    // Fail closed: with no shared secret there is nothing to verify against.
    let Some(secret) = rail.secret else {
        tracing::error!(
            provider = %provider,
            "Webhook rejected: no webhook secret configured for this provider"
        );
        audit(
            &state,
            &provider,
            "unknown",
            None,
            AuditStatus::InvalidSignature,
            Some("no webhook secret configured"),
        );
        return Err(ApiError::InvalidSignature);
    };

    if !(rail.verify)(&secret, &body, &headers) {
        tracing::warn!(provider = %provider, "Webhook rejected: bad signature");
        audit(
            &state,
            &provider,
            "unknown",
            None,
            AuditStatus::InvalidSignature,
            None,
        );
        return Err(ApiError::InvalidSignature);
    }

    let event = match (rail.parse)(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(
                provider = %provider,
                error = %err,
                "Webhook payload failed to parse"
            );
            audit(
                &state,
                &provider,
                "unknown",
                None,
                AuditStatus::Error,
                Some(&err.to_string()),
            );
            // Redelivering a malformed body would change nothing; acknowledge
            // it and leave the audit row as the record.
            return Ok(Json(WebhookAck { ok: true }));
        }
    };

    let Some(status) = (rail.map)(&event.event_type) else {
        tracing::debug!(
            provider = %provider,
            event_type = %event.event_type,
            "Webhook event type not tracked, ignoring"
        );
        audit(
            &state,
            &provider,
            &event.event_type,
            event.object_ref,
            AuditStatus::Ignored,
            None,
        );
        return Ok(Json(WebhookAck { ok: true }));
    };

    let Some(object_ref) = event.object_ref else {
        tracing::warn!(
            provider = %provider,
            event_type = %event.event_type,
            "Webhook event carried no transaction reference"
        );
        audit(
            &state,
            &provider,
            &event.event_type,
            None,
            AuditStatus::Error,
            Some("event carried no transaction reference"),
        );
        return Ok(Json(WebhookAck { ok: true }));
    };

    let outcome = match state.store.apply_provider_event(&provider, &object_ref, status) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(
                provider = %provider,
                object_ref = %object_ref,
                error = %err,
                "Failed to apply webhook event"
            );
            audit(
                &state,
                &provider,
                &event.event_type,
                Some(object_ref),
                AuditStatus::Error,
                Some(&err.to_string()),
            );
            return Err(err.into());
        }
    };

    match outcome {
        EventOutcome::Applied(tx) => {
            tracing::info!(
                provider = %provider,
                event_type = %event.event_type,
                transaction_id = %tx.id,
                status = %tx.status,
                points_delta = tx.points_delta,
                "Webhook event applied"
            );
            audit(
                &state,
                &provider,
                &event.event_type,
                Some(object_ref),
                AuditStatus::Processed,
                None,
            );
        }
        EventOutcome::Replayed(tx) => {
            tracing::debug!(
                provider = %provider,
                event_type = %event.event_type,
                transaction_id = %tx.id,
                "Webhook event already applied, replay acknowledged"
            );
            audit(
                &state,
                &provider,
                &event.event_type,
                Some(object_ref),
                AuditStatus::Replayed,
                None,
            );
        }
        EventOutcome::Conflict(tx) => {
            tracing::warn!(
                provider = %provider,
                event_type = %event.event_type,
                transaction_id = %tx.id,
                applied = %tx.status,
                requested = %status,
                "Webhook event conflicts with already-settled status"
            );
            audit(
                &state,
                &provider,
                &event.event_type,
                Some(object_ref),
                AuditStatus::Conflict,
                Some(&format!(
                    "transaction already {}; event asked for {}",
                    tx.status, status
                )),
            );
        }
        EventOutcome::Unmatched => {
            tracing::warn!(
                provider = %provider,
                event_type = %event.event_type,
                object_ref = %object_ref,
                "Webhook event matched no transaction"
            );
            audit(
                &state,
                &provider,
                &event.event_type,
                Some(object_ref),
                AuditStatus::Unmatched,
                None,
            );
        }
    }

    Ok(Json(WebhookAck { ok: true }))
}

/// Write the one audit row for this webhook call.
///
/// Audit writes are best effort; a failure is logged, never surfaced to the
/// provider.
fn audit(
    state: &AppState,
    provider: &str,
    event_type: &str,
    object_ref: Option<String>,
    status: AuditStatus,
    detail: Option<&str>,
) {
    let mut entry = AuditEntry::new(provider, event_type, object_ref, status);
    if let Some(detail) = detail {
        entry = entry.with_detail(detail);
    }
    if let Err(err) = state.store.put_audit_entry(&entry) {
        tracing::error!(
            provider = %provider,
            event_type = %event_type,
            error = %err,
            "Failed to write webhook audit entry"
        );
    }
}
