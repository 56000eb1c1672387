//! Account initialisation, balance and history integration tests.

mod common;

use chrono::{Duration, Utc};
use common::TestHarness;
use jarvas_core::{Generation, GenerationId, UserId};
use jarvas_store::Store;
use ulid::Ulid;

// ============================================================================
// Init
// ============================================================================

#[tokio::test]
async fn init_creates_account_with_default_credits() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/users/init")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 1);
    assert_eq!(harness.balance(), 1);
}

#[tokio::test]
async fn init_is_idempotent_and_keeps_balance() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/users/init")
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_ok();
    harness.fund(9);

    let response = harness
        .server
        .post("/v1/users/init")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 10);
}

#[tokio::test]
async fn init_does_not_reset_purchased_credits() {
    let harness = TestHarness::new();
    // Credits bought before the first init (webhook upsert).
    harness.fund(25);

    let response = harness
        .server
        .post("/v1/users/init")
        .add_header("authorization", harness.user_auth_header())
        .await;

    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 25);
}

#[tokio::test]
async fn init_without_auth_fails() {
    let harness = TestHarness::new();

    let response = harness.server.post("/v1/users/init").await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Balance
// ============================================================================

#[tokio::test]
async fn balance_of_unknown_account_is_zero() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 0);
}

#[tokio::test]
async fn balance_reflects_ledger() {
    let harness = TestHarness::new();
    harness.fund(42);

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    let body: serde_json::Value = response.json();
    assert_eq!(body["credits"], 42);
}

#[tokio::test]
async fn balance_with_invalid_token_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", "Bearer forged")
        .await;

    response.assert_status_unauthorized();
}

// ============================================================================
// History
// ============================================================================

fn generation(user_id: &UserId, minutes_ago: i64, n: u64) -> Generation {
    let created_at = Utc::now() - Duration::minutes(minutes_ago);
    let ms = u64::try_from(created_at.timestamp_millis()).unwrap();
    Generation {
        id: GenerationId::from_ulid(Ulid::from_parts(ms, u128::from(n))),
        user_id: user_id.clone(),
        image_url: format!("https://storage.test/{n}.png"),
        sector: "food".into(),
        style: "realistic".into(),
        created_at,
    }
}

#[tokio::test]
async fn history_is_newest_first_and_capped() {
    let harness = TestHarness::new();
    for n in 0..60 {
        harness
            .store
            .put_generation(&generation(&harness.test_user_id, 60 - i64::try_from(n).unwrap(), n))
            .unwrap();
    }

    let response = harness
        .server
        .get("/v1/users/history")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let generations = body["generations"].as_array().unwrap();
    assert_eq!(generations.len(), 50);
    assert_eq!(generations[0]["imageUrl"], "https://storage.test/59.png");
    assert_eq!(generations[49]["imageUrl"], "https://storage.test/10.png");
}

#[tokio::test]
async fn history_is_per_user() {
    let harness = TestHarness::new();
    let other = UserId::new("someone-else").unwrap();
    harness.store.put_generation(&generation(&other, 1, 1)).unwrap();

    let response = harness
        .server
        .get("/v1/users/history")
        .add_header("authorization", harness.user_auth_header())
        .await;

    let body: serde_json::Value = response.json();
    assert!(body["generations"].as_array().unwrap().is_empty());
}
