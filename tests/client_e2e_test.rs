//! Cart, checkout client and server wired together over a real socket.

mod common;

use std::sync::Arc;
use std::time::Duration;

use cartpay_api::{
    cart::{CartStore, InMemoryCartPersistence},
    client::CheckoutClient,
    models::{PaymentCallback, Product},
    repositories::OrderRecordRepository,
    services::StaticCouponCatalog,
};
use chrono::{TimeZone, Utc};
use common::{customer, signed, TestApp};
use tokio::net::TcpListener;

async fn serve(app: &TestApp) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let router = app.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}", addr)
}

fn cart_with_items() -> CartStore {
    let mut cart = CartStore::new(
        Arc::new(InMemoryCartPersistence::new()),
        StaticCouponCatalog::reference().into_shared(),
    );
    cart.add_item(Product::new("tee", "T-shirt", 1000));
    cart.add_item(Product::new("tee", "T-shirt", 1000));
    cart.add_item(Product::new("mug", "Mug", 450));
    cart.apply_coupon_at("SAVE10", Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap())
        .unwrap();
    cart
}

#[tokio::test]
async fn verified_checkout_clears_the_cart() {
    let app = TestApp::new();
    let client = CheckoutClient::new(serve(&app).await, Duration::from_secs(5)).unwrap();
    let mut cart = cart_with_items();

    let intent = cart.begin_checkout("inr").unwrap();
    assert_eq!(intent.total, 2205);

    let handle = client.create_order(&intent).await.unwrap();
    assert_eq!(handle.amount, 2205);
    assert_eq!(handle.currency, "INR");

    let callback = PaymentCallback {
        order_id: handle.id.clone(),
        payment_id: "pay_e2e_1".into(),
        signature: signed(&handle.id, "pay_e2e_1"),
    };
    let response = client
        .settle(&mut cart, &callback, &customer(), &intent)
        .await
        .unwrap();

    assert!(response.success);
    assert!(response.recorded);
    assert!(cart.is_empty());
    assert!(cart.applied_coupon().is_none());

    let stored = app
        .repo
        .find(&handle.id, "pay_e2e_1")
        .await
        .unwrap()
        .expect("order record");
    assert_eq!(stored.total_amount, 2205);
    assert_eq!(stored.coupon_code.as_deref(), Some("SAVE10"));
}

#[tokio::test]
async fn rejected_signature_keeps_the_cart() {
    let app = TestApp::new();
    let client = CheckoutClient::new(serve(&app).await, Duration::from_secs(5)).unwrap();
    let mut cart = cart_with_items();

    let intent = cart.begin_checkout("INR").unwrap();
    let handle = client.create_order(&intent).await.unwrap();

    let callback = PaymentCallback {
        order_id: handle.id.clone(),
        payment_id: "pay_e2e_2".into(),
        signature: signed(&handle.id, "pay_other"),
    };
    let err = client
        .settle(&mut cart, &callback, &customer(), &intent)
        .await
        .unwrap_err();

    assert!(err.is_verification_failure());
    assert_eq!(cart.item_count(), 3);
    assert_eq!(cart.final_total(), 2205);
    assert!(app.repo.find(&handle.id, "pay_e2e_2").await.unwrap().is_none());
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let client = CheckoutClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    let intent = cart_with_items().begin_checkout("INR").unwrap();

    let err = client.create_order(&intent).await.unwrap_err();
    assert!(matches!(err, cartpay_api::client::ClientError::Transport(_)));
}
