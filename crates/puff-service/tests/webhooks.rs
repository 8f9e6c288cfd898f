//! Provider webhook integration tests.
//!
//! Transactions are seeded straight into the store, then settled by posting
//! signed webhook payloads the way each provider would.

mod common;

use chrono::Utc;
use common::TestHarness;
use rust_decimal::Decimal;
use serde_json::json;

use puff_core::{Transaction, TransactionKind, TransactionStatus};
use puff_service::crypto::hmac_sha256_hex;
use puff_store::Store;

const CYBRID_SECRET: &str = "cybrid-test-secret";
const SPHERE_SECRET: &str = "sphere-test-secret";

// ============================================================================
// Helpers
// ============================================================================

/// Seed a pending provider-settled transaction directly into the store.
fn seed_pending_payment(harness: &TestHarness, provider: &str, provider_tx_id: &str) -> Transaction {
    let transaction = Transaction::payment(
        harness.test_user_id,
        TransactionKind::TopUp,
        Decimal::from(100),
        "USD".to_string(),
        provider.to_string(),
        provider_tx_id.to_string(),
        1000,
        TransactionStatus::Pending,
        json!({}),
    );
    harness.store.record_transaction(&transaction).unwrap();
    transaction
}

fn cybrid_event(event_type: &str, guid: &str) -> String {
    json!({
        "event_type": event_type,
        "object": { "guid": guid }
    })
    .to_string()
}

fn sphere_event(event_type: &str, payment_id: &str) -> String {
    json!({
        "type": event_type,
        "data": { "payment": { "id": payment_id } }
    })
    .to_string()
}

fn sphere_signature(secret: &str, body: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let signature = hmac_sha256_hex(secret, format!("{timestamp}.{body}").as_bytes());
    format!("t={timestamp},v1={signature}")
}

async fn audit_entries(harness: &TestHarness) -> Vec<serde_json::Value> {
    let response = harness
        .server
        .get("/v1/audit")
        .add_header("x-admin-key", &harness.admin_api_key)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    body["entries"].as_array().unwrap().clone()
}

// ============================================================================
// Cybrid (hex HMAC signature)
// ============================================================================

#[tokio::test]
async fn valid_cybrid_webhook_confirms_and_credits_points() {
    let harness = TestHarness::new();
    let transaction = seed_pending_payment(&harness, "cybrid", "trade-77");

    let body = cybrid_event("trade.completed", "trade-77");
    let response = harness
        .server
        .post("/webhooks/cybrid")
        .add_header("x-cybrid-signature", hmac_sha256_hex(CYBRID_SECRET, body.as_bytes()))
        .add_header("content-type", "application/json")
        .text(body)
        .await;

    response.assert_status_ok();
    let ack: serde_json::Value = response.json();
    assert_eq!(ack["ok"], true);

    let updated = harness
        .store
        .get_transaction(&transaction.id)
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Confirmed);

    let balance = harness
        .store
        .get_balance(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(balance.total_points, 1000);

    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "processed");
    assert_eq!(entries[0]["event_type"], "trade.completed");
    assert_eq!(entries[0]["object_ref"], "trade-77");
}

#[tokio::test]
async fn replayed_webhook_is_idempotent() {
    let harness = TestHarness::new();
    let transaction = seed_pending_payment(&harness, "cybrid", "trade-88");

    let body = cybrid_event("trade.completed", "trade-88");
    for _ in 0..2 {
        harness
            .server
            .post("/webhooks/cybrid")
            .add_header("x-cybrid-signature", hmac_sha256_hex(CYBRID_SECRET, body.as_bytes()))
            .add_header("content-type", "application/json")
            .text(body.clone())
            .await
            .assert_status_ok();
    }

    // Points applied exactly once
    let balance = harness
        .store
        .get_balance(&harness.test_user_id)
        .unwrap()
        .unwrap();
    assert_eq!(balance.total_points, 1000);

    let updated = harness
        .store
        .get_transaction(&transaction.id)
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Confirmed);

    // Both deliveries are audited
    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 2);
    let statuses: Vec<_> = entries
        .iter()
        .map(|e| e["status"].as_str().unwrap().to_string())
        .collect();
    assert!(statuses.contains(&"processed".to_string()));
    assert!(statuses.contains(&"replayed".to_string()));
}

#[tokio::test]
async fn invalid_signature_is_rejected_and_audited() {
    let harness = TestHarness::new();
    let transaction = seed_pending_payment(&harness, "cybrid", "trade-99");

    let body = cybrid_event("trade.completed", "trade-99");
    let response = harness
        .server
        .post("/webhooks/cybrid")
        .add_header(
            "x-cybrid-signature",
            hmac_sha256_hex("wrong-secret", body.as_bytes()),
        )
        .add_header("content-type", "application/json")
        .text(body)
        .await;

    response.assert_status_unauthorized();
    let error: serde_json::Value = response.json();
    assert_eq!(error["error"]["code"], "invalid_signature");

    // No mutation
    let updated = harness
        .store
        .get_transaction(&transaction.id)
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Pending);
    assert!(harness
        .store
        .get_balance(&harness.test_user_id)
        .unwrap()
        .is_none());

    // Exactly one audit row
    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "invalid_signature");
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let harness = TestHarness::new();
    seed_pending_payment(&harness, "cybrid", "trade-100");

    let response = harness
        .server
        .post("/webhooks/cybrid")
        .add_header("content-type", "application/json")
        .text(cybrid_event("trade.completed", "trade-100"))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn missing_webhook_secret_fails_closed() {
    let harness = TestHarness::with_config(|config| {
        config.cybrid_webhook_secret = None;
    });
    seed_pending_payment(&harness, "cybrid", "trade-101");

    let body = cybrid_event("trade.completed", "trade-101");
    let response = harness
        .server
        .post("/webhooks/cybrid")
        .add_header("x-cybrid-signature", hmac_sha256_hex(CYBRID_SECRET, body.as_bytes()))
        .add_header("content-type", "application/json")
        .text(body)
        .await;

    response.assert_status_unauthorized();

    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "invalid_signature");
}

#[tokio::test]
async fn unknown_event_type_is_ignored() {
    let harness = TestHarness::new();
    let transaction = seed_pending_payment(&harness, "cybrid", "trade-102");

    let body = cybrid_event("trade.created", "trade-102");
    let response = harness
        .server
        .post("/webhooks/cybrid")
        .add_header("x-cybrid-signature", hmac_sha256_hex(CYBRID_SECRET, body.as_bytes()))
        .add_header("content-type", "application/json")
        .text(body)
        .await;

    response.assert_status_ok();

    let updated = harness
        .store
        .get_transaction(&transaction.id)
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Pending);

    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "ignored");
}

#[tokio::test]
async fn unmatched_reference_is_acknowledged_and_audited() {
    let harness = TestHarness::new();

    let body = cybrid_event("trade.completed", "trade-nobody-knows");
    let response = harness
        .server
        .post("/webhooks/cybrid")
        .add_header("x-cybrid-signature", hmac_sha256_hex(CYBRID_SECRET, body.as_bytes()))
        .add_header("content-type", "application/json")
        .text(body)
        .await;

    response.assert_status_ok();

    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "unmatched");
}

#[tokio::test]
async fn conflicting_terminal_status_does_not_overwrite() {
    let harness = TestHarness::new();
    let transaction = seed_pending_payment(&harness, "cybrid", "trade-103");

    // Settle as failed first
    let failed = cybrid_event("trade.failed", "trade-103");
    harness
        .server
        .post("/webhooks/cybrid")
        .add_header(
            "x-cybrid-signature",
            hmac_sha256_hex(CYBRID_SECRET, failed.as_bytes()),
        )
        .add_header("content-type", "application/json")
        .text(failed)
        .await
        .assert_status_ok();

    // A later "completed" for the same trade conflicts
    let completed = cybrid_event("trade.completed", "trade-103");
    harness
        .server
        .post("/webhooks/cybrid")
        .add_header(
            "x-cybrid-signature",
            hmac_sha256_hex(CYBRID_SECRET, completed.as_bytes()),
        )
        .add_header("content-type", "application/json")
        .text(completed)
        .await
        .assert_status_ok();

    let updated = harness
        .store
        .get_transaction(&transaction.id)
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Failed);
    // No points for a failed payment
    assert!(harness
        .store
        .get_balance(&harness.test_user_id)
        .unwrap()
        .is_none());

    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 2);
    let statuses: Vec<_> = entries
        .iter()
        .map(|e| e["status"].as_str().unwrap().to_string())
        .collect();
    assert!(statuses.contains(&"processed".to_string()));
    assert!(statuses.contains(&"conflict".to_string()));
}

#[tokio::test]
async fn unparseable_payload_is_audited_and_acknowledged() {
    let harness = TestHarness::new();

    let body = "not json at all";
    let response = harness
        .server
        .post("/webhooks/cybrid")
        .add_header(
            "x-cybrid-signature",
            hmac_sha256_hex(CYBRID_SECRET, body.as_bytes()),
        )
        .text(body)
        .await;

    // A redelivery could never parse either; acknowledge and keep the record.
    response.assert_status_ok();

    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "error");
}

#[tokio::test]
async fn non_utf8_body_is_still_audited() {
    let harness = TestHarness::new();

    // Correctly signed, but not text at all. The call must still leave its
    // one audit row instead of being bounced before the handler runs.
    let body: &[u8] = &[0x80, 0xFF, 0x00, 0x01];
    let response = harness
        .server
        .post("/webhooks/cybrid")
        .add_header("x-cybrid-signature", hmac_sha256_hex(CYBRID_SECRET, body))
        .bytes(body.to_vec().into())
        .await;

    response.assert_status_ok();

    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "error");
}

#[tokio::test]
async fn event_without_a_reference_is_audited_and_acknowledged() {
    let harness = TestHarness::new();

    // Tracked event type, but the envelope names no trade.
    let body = json!({ "event_type": "trade.completed" }).to_string();
    let response = harness
        .server
        .post("/webhooks/cybrid")
        .add_header(
            "x-cybrid-signature",
            hmac_sha256_hex(CYBRID_SECRET, body.as_bytes()),
        )
        .add_header("content-type", "application/json")
        .text(body)
        .await;

    response.assert_status_ok();

    let entries = audit_entries(&harness).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "error");
}

#[tokio::test]
async fn unknown_provider_webhook_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/webhooks/acme-pay")
        .text("{}")
        .await;

    response.assert_status_not_found();

    // Unknown endpoints are not audited
    let entries = audit_entries(&harness).await;
    assert!(entries.is_empty());
}

// ============================================================================
// Sphere (timestamped signature)
// ============================================================================

#[tokio::test]
async fn valid_sphere_webhook_confirms_payment() {
    let harness = TestHarness::new();
    let transaction = seed_pending_payment(&harness, "sphere", "pay-55");

    let body = sphere_event("payment.succeeded", "pay-55");
    let response = harness
        .server
        .post("/webhooks/sphere")
        .add_header("sphere-signature", sphere_signature(SPHERE_SECRET, &body))
        .add_header("content-type", "application/json")
        .text(body)
        .await;

    response.assert_status_ok();

    let updated = harness
        .store
        .get_transaction(&transaction.id)
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Confirmed);
}

#[tokio::test]
async fn stale_sphere_timestamp_is_rejected() {
    let harness = TestHarness::new();
    let transaction = seed_pending_payment(&harness, "sphere", "pay-56");

    let body = sphere_event("payment.succeeded", "pay-56");
    // Timestamp far outside the tolerance window
    let timestamp = Utc::now().timestamp() - 3600;
    let signature = hmac_sha256_hex(SPHERE_SECRET, format!("{timestamp}.{body}").as_bytes());

    let response = harness
        .server
        .post("/webhooks/sphere")
        .add_header("sphere-signature", format!("t={timestamp},v1={signature}"))
        .add_header("content-type", "application/json")
        .text(body)
        .await;

    response.assert_status_unauthorized();

    let updated = harness
        .store
        .get_transaction(&transaction.id)
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn sphere_cancellation_is_applied() {
    let harness = TestHarness::new();
    let transaction = seed_pending_payment(&harness, "sphere", "pay-57");

    let body = sphere_event("payment.cancelled", "pay-57");
    harness
        .server
        .post("/webhooks/sphere")
        .add_header("sphere-signature", sphere_signature(SPHERE_SECRET, &body))
        .add_header("content-type", "application/json")
        .text(body)
        .await
        .assert_status_ok();

    let updated = harness
        .store
        .get_transaction(&transaction.id)
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Cancelled);
    assert!(harness
        .store
        .get_balance(&harness.test_user_id)
        .unwrap()
        .is_none());
}
