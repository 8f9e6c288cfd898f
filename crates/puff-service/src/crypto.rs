//! Cryptographic utilities for webhook verification.
//!
//! This module provides shared cryptographic functions for verifying webhook
//! signatures from the payment provider rails.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 over raw bytes and return the hex-encoded result.
///
/// Webhook signatures are computed over the body exactly as received, so the
/// message is bytes, not text; the body need not be valid UTF-8.
///
/// # Panics
///
/// This function will never panic in practice. The `expect` call is guarded by
/// the invariant that HMAC-SHA256 accepts keys of any size per RFC 2104.
#[must_use]
pub fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
    // INVARIANT: HMAC-SHA256 accepts keys of any size per RFC 2104, so
    // `new_from_slice` only fails if the Hmac implementation is broken.
    // This is a library invariant, not a runtime condition.
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC-SHA256 accepts any key size");
    mac.update(message);
    let result = mac.finalize();

    hex::encode(result.into_bytes())
}

/// Constant-time string comparison to prevent timing attacks.
///
/// This function compares two strings in constant time to prevent timing
/// side-channel attacks when verifying cryptographic signatures.
///
/// # Arguments
///
/// * `a` - First string to compare
/// * `b` - Second string to compare
///
/// # Returns
///
/// `true` if the strings are equal, `false` otherwise.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Verify a plain hex HMAC-SHA256 signature over the raw payload.
///
/// Used by rails that send `hex(hmac_sha256(secret, body))` in a single
/// signature header.
#[must_use]
pub fn verify_hex_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let expected = hmac_sha256_hex(secret, payload);
    constant_time_eq(&expected, signature)
}

/// Verify a timestamped signature header of the form
/// `t=<unix seconds>,v1=<hex signature>[,v1=...]`.
///
/// The signed payload is `"{t}.{body}"`. The timestamp must be within
/// `tolerance_secs` of `now_unix` (in either direction, to absorb clock
/// skew); any one matching `v1` entry verifies the payload.
#[must_use]
pub fn verify_timestamped_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance_secs: i64,
    now_unix: i64,
) -> bool {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    if signatures.is_empty() {
        return false;
    }

    // Stale (or far-future) timestamps are replayable, so reject them even
    // when the signature itself matches.
    if (now_unix - ts).abs() > tolerance_secs {
        return false;
    }

    let mut signed_payload = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed_payload.extend_from_slice(timestamp.as_bytes());
    signed_payload.push(b'.');
    signed_payload.extend_from_slice(payload);
    let expected = hmac_sha256_hex(secret, &signed_payload);

    signatures.iter().any(|sig| constant_time_eq(&expected, sig))
}
