//! Enhancement flow integration tests.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::http::StatusCode;
use common::{png_data_url, test_config, TestHarness};
use jarvas_service::ServiceConfig;
use jarvas_store::Store;
use serde_json::json;

const PATH: &str = "/v1/enhance";

fn request_body() -> serde_json::Value {
    json!({ "image": png_data_url(), "sector": "food" })
}

// ============================================================================
// Paid
// ============================================================================

#[tokio::test]
async fn paid_enhancement_debits_and_records_history() {
    let harness = TestHarness::new();
    harness.fund(3);

    let response = harness
        .server
        .post(PATH)
        .add_header("authorization", harness.user_auth_header())
        .json(&request_body())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["isTrial"], false);
    let url = body["enhancedUrl"].as_str().unwrap();
    assert!(url.starts_with("https://storage.test/enhanced/user-test-1/"));
    assert!(url.ends_with(".png"));

    assert_eq!(harness.balance(), 2);

    let history = harness
        .store
        .list_generations(&harness.test_user_id, 50)
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].image_url, url);
    assert_eq!(history[0].sector, "food");
    assert_eq!(history[0].style, "realistic");
}

#[tokio::test]
async fn insufficient_credits_returns_402_without_calling_model() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post(PATH)
        .add_header("authorization", harness.user_auth_header())
        .json(&request_body())
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_credits");
    assert_eq!(harness.model.calls.load(Ordering::SeqCst), 0);
    assert!(harness.storage.paths().is_empty());
}

#[tokio::test]
async fn model_failure_refunds_reservation() {
    let harness = TestHarness::new();
    harness.fund(1);
    harness.model.fail.store(true, Ordering::SeqCst);

    let response = harness
        .server
        .post(PATH)
        .add_header("authorization", harness.user_auth_header())
        .json(&request_body())
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.balance(), 1);
    assert!(harness
        .store
        .list_generations(&harness.test_user_id, 50)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn timed_out_enhancement_refunds_reservation() {
    let harness = TestHarness::with_config(ServiceConfig {
        request_timeout_seconds: 1,
        ..test_config()
    });
    harness.fund(3);
    harness.model.delay_ms.store(5_000, Ordering::SeqCst);

    let response = harness
        .server
        .post(PATH)
        .add_header("authorization", harness.user_auth_header())
        .json(&request_body())
        .await;

    response.assert_status(StatusCode::REQUEST_TIMEOUT);

    // The handler is cancelled once the timeout fires; its refund runs on drop.
    for _ in 0..50 {
        if harness.balance() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(harness.balance(), 3);
    assert!(harness.storage.paths().is_empty());
    assert!(harness
        .store
        .list_generations(&harness.test_user_id, 50)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn non_png_output_is_stored_as_png() {
    let harness = TestHarness::new();
    harness.fund(1);
    harness.model.jpeg.store(true, Ordering::SeqCst);

    harness
        .server
        .post(PATH)
        .add_header("authorization", harness.user_auth_header())
        .json(&request_body())
        .await
        .assert_status_ok();

    let objects = harness.storage.objects.lock().unwrap();
    assert_eq!(objects.len(), 1);
    let (path, content_type, data) = &objects[0];
    assert!(path.ends_with(".png"));
    assert_eq!(content_type, "image/png");
    assert_eq!(image::guess_format(data).unwrap(), image::ImageFormat::Png);
}

#[tokio::test]
async fn storage_failure_refunds_reservation() {
    let harness = TestHarness::new();
    harness.fund(2);
    harness.storage.fail.store(true, Ordering::SeqCst);

    let response = harness
        .server
        .post(PATH)
        .add_header("authorization", harness.user_auth_header())
        .json(&request_body())
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "upstream_failure");
    assert_eq!(harness.balance(), 2);
}

// ============================================================================
// Trial
// ============================================================================

#[tokio::test]
async fn anonymous_caller_gets_watermarked_trial() {
    let harness = TestHarness::new();

    let response = harness.server.post(PATH).json(&request_body()).await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["isTrial"], true);
    assert!(body["enhancedUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://storage.test/enhanced/guest/"));

    let objects = harness.storage.objects.lock().unwrap();
    assert_eq!(objects.len(), 1);
    let (_, content_type, data) = &objects[0];
    assert_eq!(content_type, "image/png");
    assert_ne!(data, &common::solid_png(32, 32));
    assert!(image::load_from_memory(data).is_ok());
}

#[tokio::test]
async fn invalid_token_degrades_to_trial() {
    let harness = TestHarness::new();
    harness.fund(5);

    let response = harness
        .server
        .post(PATH)
        .add_header("authorization", "Bearer expired-or-forged")
        .json(&request_body())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["isTrial"], true);
    assert_eq!(harness.balance(), 5);
}

#[tokio::test]
async fn trial_never_touches_ledger() {
    let harness = TestHarness::new();

    harness
        .server
        .post(PATH)
        .json(&request_body())
        .await
        .assert_status_ok();

    assert_eq!(harness.balance(), 0);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn missing_image_or_sector_is_rejected() {
    let harness = TestHarness::new();
    harness.fund(1);

    for body in [
        json!({ "sector": "food" }),
        json!({ "image": png_data_url() }),
        json!({ "image": "", "sector": "food" }),
    ] {
        harness
            .server
            .post(PATH)
            .add_header("authorization", harness.user_auth_header())
            .json(&body)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    assert_eq!(harness.balance(), 1);
    assert_eq!(harness.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_data_url_image_is_rejected() {
    let harness = TestHarness::new();

    harness
        .server
        .post(PATH)
        .json(&json!({ "image": "https://example.com/cat.jpg", "sector": "food" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
