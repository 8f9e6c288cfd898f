//! Puff Points integration tests: balance, catalog, redemption flow.

mod common;

use common::TestHarness;
use serde_json::json;

use puff_core::Transaction;
use puff_store::Store;

// ============================================================================
// Helpers
// ============================================================================

/// Grant confirmed points directly through the store.
fn grant_points(harness: &TestHarness, points: i64) {
    let grant = Transaction::reward_grant(
        harness.test_user_id,
        points,
        "test seed".to_string(),
    );
    harness.store.record_transaction(&grant).unwrap();
}

/// Create a catalog entry through the admin endpoint, returning its id.
async fn create_reward(harness: &TestHarness, name: &str, points_cost: i64) -> String {
    let response = harness
        .server
        .post("/v1/rewards/catalog")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({
            "name": name,
            "description": "integration test reward",
            "points_cost": points_cost
        }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    body["id"].as_str().unwrap().to_string()
}

// ============================================================================
// Balance
// ============================================================================

#[tokio::test]
async fn balance_starts_zeroed_at_bronze() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/rewards/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_points"], 0);
    assert_eq!(body["tier"], "bronze");
    assert_eq!(body["multiplier_percent"], 100);
    assert_eq!(body["points_to_next_tier"], 500);
}

#[tokio::test]
async fn balance_reflects_tier_progression() {
    let harness = TestHarness::new();
    grant_points(&harness, 1600);

    let response = harness
        .server
        .get("/v1/rewards/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_points"], 1600);
    assert_eq!(body["tier"], "gold");
    assert_eq!(body["multiplier_percent"], 150);
    assert_eq!(body["points_to_next_tier"], 3400);
}

#[tokio::test]
async fn balance_requires_user_auth() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/rewards/balance")
        .await
        .assert_status_unauthorized();
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn catalog_lists_active_entries() {
    let harness = TestHarness::new();
    create_reward(&harness, "Free Coffee", 100).await;
    create_reward(&harness, "Hat", 500).await;

    let response = harness
        .server
        .get("/v1/rewards/catalog")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let rewards = body["rewards"].as_array().unwrap();
    assert_eq!(rewards.len(), 2);
}

#[tokio::test]
async fn catalog_creation_requires_admin_key() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/rewards/catalog")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "name": "Hat", "points_cost": 500 }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn catalog_rejects_non_positive_cost() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/rewards/catalog")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({ "name": "Freebie", "points_cost": 0 }))
        .await;

    response.assert_status_bad_request();
}

// ============================================================================
// Redemption
// ============================================================================

#[tokio::test]
async fn redeem_debits_balance_and_issues_code() {
    let harness = TestHarness::new();
    grant_points(&harness, 1000);
    let reward_id = create_reward(&harness, "Free Coffee", 300).await;

    let response = harness
        .server
        .post("/v1/rewards/redeem")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "reward_id": reward_id, "points_to_spend": 300 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["redemption"]["status"], "pending");
    assert_eq!(body["redemption"]["points_spent"], 300);
    assert!(!body["redemption"]["redemption_code"]
        .as_str()
        .unwrap()
        .is_empty());
    assert_eq!(body["transaction"]["kind"], "redemption");
    assert_eq!(body["transaction"]["points_delta"], -300);

    let balance: serde_json::Value = harness
        .server
        .get("/v1/rewards/balance")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(balance["total_points"], 700);
    // Spending does not demote the earned-points tier standing
    assert_eq!(balance["tier_points"], 1000);
    assert_eq!(balance["lifetime_spent"], 300);
}

#[tokio::test]
async fn redeem_with_insufficient_balance_fails() {
    let harness = TestHarness::new();
    grant_points(&harness, 100);
    let reward_id = create_reward(&harness, "Hat", 500).await;

    let response = harness
        .server
        .post("/v1/rewards/redeem")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "reward_id": reward_id, "points_to_spend": 500 }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_balance");
    assert_eq!(body["error"]["details"]["balance"], 100);
    assert_eq!(body["error"]["details"]["required"], 500);

    // Balance untouched
    let balance: serde_json::Value = harness
        .server
        .get("/v1/rewards/balance")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(balance["total_points"], 100);
}

#[tokio::test]
async fn redeem_with_mismatched_cost_fails() {
    let harness = TestHarness::new();
    grant_points(&harness, 1000);
    let reward_id = create_reward(&harness, "Hat", 500).await;

    let response = harness
        .server
        .post("/v1/rewards/redeem")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "reward_id": reward_id, "points_to_spend": 400 }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn redeem_unknown_reward_fails() {
    let harness = TestHarness::new();
    grant_points(&harness, 1000);

    let response = harness
        .server
        .post("/v1/rewards/redeem")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({
            "reward_id": puff_core::RewardId::generate().to_string(),
            "points_to_spend": 500
        }))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "reward_unavailable");
}

#[tokio::test]
async fn finite_availability_runs_out() {
    let harness = TestHarness::new();
    grant_points(&harness, 1000);

    let response = harness
        .server
        .post("/v1/rewards/catalog")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({
            "name": "Limited Pin",
            "points_cost": 100,
            "availability": 1
        }))
        .await;
    response.assert_status_ok();
    let reward: serde_json::Value = response.json();
    let reward_id = reward["id"].as_str().unwrap();

    harness
        .server
        .post("/v1/rewards/redeem")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "reward_id": reward_id, "points_to_spend": 100 }))
        .await
        .assert_status_ok();

    let second = harness
        .server
        .post("/v1/rewards/redeem")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "reward_id": reward_id, "points_to_spend": 100 }))
        .await;

    second.assert_status_bad_request();
    let body: serde_json::Value = second.json();
    assert_eq!(body["error"]["code"], "reward_unavailable");
}

#[tokio::test]
async fn redemptions_list_is_per_user() {
    let harness = TestHarness::new();
    grant_points(&harness, 1000);
    let reward_id = create_reward(&harness, "Free Coffee", 300).await;

    harness
        .server
        .post("/v1/rewards/redeem")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "reward_id": reward_id, "points_to_spend": 300 }))
        .await
        .assert_status_ok();

    let mine: serde_json::Value = harness
        .server
        .get("/v1/rewards/redemptions")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(mine["redemptions"].as_array().unwrap().len(), 1);

    let theirs: serde_json::Value = harness
        .server
        .get("/v1/rewards/redemptions")
        .add_header("authorization", TestHarness::other_user_auth_header())
        .await
        .json();
    assert!(theirs["redemptions"].as_array().unwrap().is_empty());
}

// ============================================================================
// Fulfillment
// ============================================================================

#[tokio::test]
async fn fulfill_transitions_redemption_once() {
    let harness = TestHarness::new();
    grant_points(&harness, 1000);
    let reward_id = create_reward(&harness, "Free Coffee", 300).await;

    let redeemed: serde_json::Value = harness
        .server
        .post("/v1/rewards/redeem")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "reward_id": reward_id, "points_to_spend": 300 }))
        .await
        .json();
    let code = redeemed["redemption"]["redemption_code"]
        .as_str()
        .unwrap()
        .to_string();

    let response = harness
        .server
        .post(&format!("/v1/rewards/redemptions/{code}/fulfill"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "completed");
    assert!(body["fulfilled_at"].as_str().is_some());

    // A second fulfillment of the same code conflicts
    let again = harness
        .server
        .post(&format!("/v1/rewards/redemptions/{code}/fulfill"))
        .add_header("x-admin-key", &harness.admin_api_key)
        .await;
    again.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn fulfill_unknown_code_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/rewards/redemptions/PUFF-NOPE/fulfill")
        .add_header("x-admin-key", &harness.admin_api_key)
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn transactions_list_paginates_newest_first() {
    let harness = TestHarness::new();
    for i in 1..=5 {
        grant_points(&harness, i * 10);
        // ULID ids order by millisecond; keep the grants in distinct ones
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let page: serde_json::Value = harness
        .server
        .get("/v1/transactions?limit=3")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();

    let rows = page["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(page["has_more"], true);
    // Newest grant first
    assert_eq!(rows[0]["points_delta"], 50);

    let rest: serde_json::Value = harness
        .server
        .get("/v1/transactions?limit=3&offset=3")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(rest["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(rest["has_more"], false);
}

#[tokio::test]
async fn transactions_require_user_auth() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/transactions")
        .await
        .assert_status_unauthorized();
}
