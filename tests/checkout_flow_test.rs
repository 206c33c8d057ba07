mod common;

use axum::http::{Method, StatusCode};
use cartpay_api::models::Product;
use cartpay_api::repositories::OrderRecordRepository;
use cartpay_api::services::PriceList;
use common::{response_json, signed, verify_body, FailingRepository, TestApp};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

#[tokio::test]
async fn create_order_returns_gateway_handle_in_minor_units() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/order/create",
            json!({
                "amount": 18.5,
                "currency": "INR",
                "receipt": "rcpt_1",
                "notes": { "source": "web" }
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = response_json(response).await;
    assert_eq!(body["id"], "order_test_0");
    assert_eq!(body["amount"], 1850);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["status"], "created");
}

#[tokio::test]
async fn create_order_retry_with_same_receipt_is_idempotent() {
    let app = TestApp::new();
    let body = json!({ "amount": 18, "currency": "INR", "receipt": "rcpt_retry" });

    let first = response_json(app.post_json("/order/create", body.clone()).await).await;
    let second = response_json(app.post_json("/order/create", body).await).await;

    assert_eq!(first, second);
    assert_eq!(app.gateway.as_ref().unwrap().calls(), 1);

    let conflict = app
        .post_json(
            "/order/create",
            json!({ "amount": 20, "currency": "INR", "receipt": "rcpt_retry" }),
        )
        .await;
    assert_eq!(conflict.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn create_order_without_gateway_is_500() {
    let app = TestApp::builder().without_gateway().build();

    let response = app
        .post_json(
            "/order/create",
            json!({ "amount": 18, "currency": "INR", "receipt": "rcpt_1" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "gateway_not_configured");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn gateway_failure_is_500_and_hides_upstream_details() {
    let app = TestApp::new();
    app.gateway.as_ref().unwrap().set_failing(true);

    let response = app
        .post_json(
            "/order/create",
            json!({ "amount": 18, "currency": "INR", "receipt": "rcpt_1" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["code"], "order_creation_failed");
    assert_eq!(body["error"], "Failed to create payment order");

    // the failed attempt does not pin the receipt
    app.gateway.as_ref().unwrap().set_failing(false);
    let retry = app
        .post_json(
            "/order/create",
            json!({ "amount": 18, "currency": "INR", "receipt": "rcpt_1" }),
        )
        .await;
    assert_eq!(retry.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_create_order_bodies_are_400() {
    let app = TestApp::new();

    for body in [
        json!({ "amount": "lots", "currency": "INR", "receipt": "r" }),
        json!({ "amount": 18, "currency": "INR" }),
        json!({ "amount": -5, "currency": "INR", "receipt": "r" }),
        json!({ "amount": 18.555, "currency": "INR", "receipt": "r" }),
        json!({ "amount": 18, "currency": "RUPEES", "receipt": "r" }),
    ] {
        let response = app.post_json("/order/create", body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(response_json(response).await["success"], false);
    }
    assert_eq!(app.gateway.as_ref().unwrap().calls(), 0);
}

#[tokio::test]
async fn out_of_range_amounts_are_400() {
    let app = TestApp::new();

    for body in [
        json!({ "amount": "79228162514264337593543950335", "currency": "INR", "receipt": "r1" }),
        json!({ "amount": 1e27, "currency": "INR", "receipt": "r2" }),
        json!({ "amount": "100000000000000000", "currency": "INR", "receipt": "r3" }),
    ] {
        let response = app.post_json("/order/create", body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(response_json(response).await["code"], "validation_error");
    }
    assert_eq!(app.gateway.as_ref().unwrap().calls(), 0);
}

#[tokio::test]
async fn create_order_without_currency_uses_configured_default() {
    let app = TestApp::new();

    let response = app
        .post_json("/order/create", json!({ "amount": 18, "receipt": "rcpt_nocur" }))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["currency"], "INR");
}

#[tokio::test]
async fn tampered_amount_is_rejected_when_prices_are_known() {
    let app = TestApp::builder()
        .prices(PriceList::new([Product::new("tee", "T-shirt", 1000)]), false)
        .build();

    let honest = app
        .post_json(
            "/order/create",
            json!({
                "amount": 18, "currency": "INR", "receipt": "rcpt_a",
                "items": [{ "productId": "tee", "quantity": 2 }], "couponCode": "SAVE10"
            }),
        )
        .await;
    assert_eq!(honest.status(), StatusCode::OK);

    let tampered = app
        .post_json(
            "/order/create",
            json!({
                "amount": 1, "currency": "INR", "receipt": "rcpt_b",
                "items": [{ "productId": "tee", "quantity": 2 }], "couponCode": "SAVE10"
            }),
        )
        .await;
    assert_eq!(tampered.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(tampered).await["code"], "amount_mismatch");
    assert_eq!(app.gateway.as_ref().unwrap().calls(), 1);
}

#[tokio::test]
async fn verify_payment_accepts_genuine_signature_once() {
    let app = TestApp::new();
    let body = verify_body("order_1", "pay_1", &signed("order_1", "pay_1"));

    let first = app.post_json("/payment/verify", body.clone()).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = response_json(first).await;
    assert_eq!(
        first,
        json!({ "success": true, "orderId": "order_1", "paymentId": "pay_1", "recorded": true })
    );

    let second = response_json(app.post_json("/payment/verify", body).await).await;
    assert_eq!(second, first);

    let records = app.repo.find_by_order_id("order_1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].total_amount, 1800);
}

#[tokio::test]
async fn verify_payment_rejects_bad_signature() {
    let app = TestApp::new();

    let response = app
        .post_json("/payment/verify", verify_body("order_1", "pay_1", "bad"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Payment verification failed");
    assert_eq!(body["success"], false);
    assert!(app.repo.find("order_1", "pay_1").await.unwrap().is_none());
}

#[tokio::test]
async fn verify_payment_without_secret_is_500() {
    let app = TestApp::builder().without_gateway().build();

    let response = app
        .post_json(
            "/payment/verify",
            verify_body("order_1", "pay_1", &signed("order_1", "pay_1")),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn storage_outage_still_reports_verified_payment() {
    let repo = Arc::new(FailingRepository::default());
    let app = TestApp::builder().repo(repo.clone()).build();

    let response = app
        .post_json(
            "/payment/verify",
            verify_body("order_1", "pay_1", &signed("order_1", "pay_1")),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["recorded"], false);
    assert_eq!(app.pending.len().await, 1);

    repo.heal();
    let report = app
        .pending
        .drain_once(repo.as_ref(), Instant::now() + Duration::from_secs(60))
        .await;
    assert_eq!(report.stored, 1);
    assert_eq!(repo.stored(), 1);
}

#[tokio::test]
async fn repeated_callback_during_outage_is_queued_once() {
    let repo = Arc::new(FailingRepository::default());
    let app = TestApp::builder().repo(repo.clone()).build();
    let body = verify_body("order_1", "pay_1", &signed("order_1", "pay_1"));

    for _ in 0..3 {
        let response = app.post_json("/payment/verify", body.clone()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["recorded"], false);
    }
    assert_eq!(app.pending.len().await, 1);

    repo.heal();
    let report = app
        .pending
        .drain_once(repo.as_ref(), Instant::now() + Duration::from_secs(60))
        .await;
    assert_eq!(report.stored, 1);
    assert_eq!(repo.stored(), 1);
}

#[tokio::test]
async fn confirmation_lookup_returns_records_or_404() {
    let app = TestApp::new();
    app.post_json(
        "/payment/verify",
        verify_body("order_9", "pay_9", &signed("order_9", "pay_9")),
    )
    .await;

    let found = app.request(Method::GET, "/orders/order_9", None).await;
    assert_eq!(found.status(), StatusCode::OK);
    let body = response_json(found).await;
    assert_eq!(body["orderId"], "order_9");
    assert_eq!(body["records"][0]["paymentId"], "pay_9");
    assert_eq!(body["records"][0]["status"], "confirmed");

    let missing = app.request(Method::GET, "/orders/nope", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(missing).await["code"], "not_found");
}

#[tokio::test]
async fn ops_endpoints_respond() {
    let app = TestApp::new();

    let health = app.request(Method::GET, "/health", None).await;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(response_json(health).await["status"], "up");

    let metrics = app.request(Method::GET, "/metrics", None).await;
    assert_eq!(metrics.status(), StatusCode::OK);

    let openapi = app.request(Method::GET, "/openapi.json", None).await;
    assert_eq!(openapi.status(), StatusCode::OK);
    let doc = response_json(openapi).await;
    assert!(doc["paths"]["/payment/verify"].is_object());
}

#[tokio::test]
async fn error_bodies_echo_the_request_id() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/payment/verify")
        .header("content-type", "application/json")
        .header("x-request-id", "req-abc123")
        .body(axum::body::Body::from(
            serde_json::to_vec(&verify_body("o", "p", "00")).unwrap(),
        ))
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router(), request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-abc123");
    let body = response_json(response).await;
    assert_eq!(body["requestId"], "req-abc123");
}
