//! Webhook audit-log entries.
//!
//! Every inbound webhook call writes exactly one audit entry, whichever
//! branch it takes. Replays therefore produce one entry per delivery, which
//! is expected and what makes the trail useful for compliance review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Maximum stored length of an audit detail string.
pub const AUDIT_DETAIL_MAX_LEN: usize = 512;

/// Outcome of one inbound webhook call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Event mapped and applied to the matching transaction.
    Processed,

    /// Event re-delivered after its terminal status was already applied;
    /// no mutation.
    Replayed,

    /// Event type not in the provider's mapping table; no mutation.
    Ignored,

    /// No transaction matched the provider reference; no mutation.
    Unmatched,

    /// Event asked for a different terminal status than the one already
    /// applied; no mutation.
    Conflict,

    /// Signature verification failed; payload discarded unparsed.
    InvalidSignature,

    /// Internal error while applying the event.
    Error,
}

impl AuditStatus {
    /// The snake_case wire name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Replayed => "replayed",
            Self::Ignored => "ignored",
            Self::Unmatched => "unmatched",
            Self::Conflict => "conflict",
            Self::InvalidSignature => "invalid_signature",
            Self::Error => "error",
        }
    }
}

/// One audit-log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry id (ULID, time-ordered).
    pub id: Ulid,

    /// Provider key the webhook endpoint belongs to.
    pub provider: String,

    /// Provider-reported event type, verbatim ("unknown" when the payload
    /// never parsed).
    pub event_type: String,

    /// Provider transaction id the event referenced, when known.
    pub object_ref: Option<String>,

    /// Branch the call took.
    pub status: AuditStatus,

    /// Truncated error chain or context, at most
    /// [`AUDIT_DETAIL_MAX_LEN`] characters.
    pub detail: Option<String>,

    /// When the webhook arrived.
    pub received_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Create an entry for one webhook delivery.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        event_type: impl Into<String>,
        object_ref: Option<String>,
        status: AuditStatus,
    ) -> Self {
        Self {
            id: Ulid::new(),
            provider: provider.into(),
            event_type: event_type.into(),
            object_ref,
            status,
            detail: None,
            received_at: Utc::now(),
        }
    }

    /// Attach a detail string, truncated to [`AUDIT_DETAIL_MAX_LEN`] chars.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail: String = detail.into();
        self.detail = Some(if detail.chars().count() > AUDIT_DETAIL_MAX_LEN {
            detail.chars().take(AUDIT_DETAIL_MAX_LEN).collect()
        } else {
            detail
        });
        self
    }
}
