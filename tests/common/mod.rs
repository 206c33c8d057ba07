#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    Router,
};
use cartpay_api::{
    config::AppConfig,
    errors::ServiceError,
    gateway::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway},
    models::{CustomerData, OrderLineItem, OrderRecord},
    repositories::{InMemoryOrderRecordRepository, InsertOutcome, OrderRecordRepository},
    services::{
        payments, OrderCreationService, PaymentVerificationService, PendingOrderQueue, PriceList,
        PricingService, StaticCouponCatalog,
    },
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub const SECRET: &str = "test_key_secret";

/// Gateway double that mints sequential order ids.
#[derive(Default)]
pub struct FakeGateway {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeGateway {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn create_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 502,
                body: "upstream unavailable".into(),
            });
        }
        Ok(GatewayOrder {
            id: format!("order_test_{}", n),
            amount: request.amount,
            currency: request.currency.clone(),
            status: "created".into(),
            receipt: Some(request.receipt.clone()),
        })
    }
}

/// Store whose writes fail until `heal` is called.
#[derive(Default)]
pub struct FailingRepository {
    healed: AtomicBool,
    inner: InMemoryOrderRecordRepository,
}

impl FailingRepository {
    pub fn heal(&self) {
        self.healed.store(true, Ordering::SeqCst);
    }

    pub fn stored(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl OrderRecordRepository for FailingRepository {
    async fn insert_if_absent(&self, record: OrderRecord) -> Result<InsertOutcome, ServiceError> {
        if !self.healed.load(Ordering::SeqCst) {
            return Err(ServiceError::InternalError("database unavailable".into()));
        }
        self.inner.insert_if_absent(record).await
    }

    async fn find(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> Result<Option<OrderRecord>, ServiceError> {
        self.inner.find(order_id, payment_id).await
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<OrderRecord>, ServiceError> {
        self.inner.find_by_order_id(order_id).await
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".into(),
        "127.0.0.1".into(),
        0,
        "test".into(),
    );
    cfg.cors_allow_any_origin = true;
    cfg
}

pub struct TestAppBuilder {
    gateway: Option<Arc<FakeGateway>>,
    secret: Option<String>,
    repo: Arc<dyn OrderRecordRepository>,
    prices: Option<PriceList>,
    require_priced_intents: bool,
}

impl TestAppBuilder {
    pub fn without_gateway(mut self) -> Self {
        self.gateway = None;
        self.secret = None;
        self
    }

    pub fn repo(mut self, repo: Arc<dyn OrderRecordRepository>) -> Self {
        self.repo = repo;
        self
    }

    pub fn prices(mut self, prices: PriceList, require_priced_intents: bool) -> Self {
        self.prices = Some(prices);
        self.require_priced_intents = require_priced_intents;
        self
    }

    pub fn build(self) -> TestApp {
        let cfg = test_config();
        let gateway = self.gateway.clone();

        let mut orders = OrderCreationService::new(
            gateway.clone().map(|g| g as Arc<dyn PaymentGateway>),
            Duration::from_secs(2),
        )
        .with_default_currency(cfg.default_currency.clone())
        .with_receipt_ttl(cfg.receipt_ttl());
        if let Some(prices) = self.prices {
            orders = orders.with_pricing(
                PricingService::new(
                    Arc::new(prices),
                    StaticCouponCatalog::reference().into_shared(),
                ),
                self.require_priced_intents,
            );
        }

        let pending = Arc::new(PendingOrderQueue::default());
        let payments =
            PaymentVerificationService::new(self.secret, self.repo.clone(), pending.clone());

        let state = AppState {
            config: Arc::new(cfg),
            orders: Arc::new(orders),
            payments: Arc::new(payments),
        };
        let router = cartpay_api::build_router(state.clone()).expect("router");

        TestApp {
            router,
            state,
            gateway,
            repo: self.repo,
            pending,
        }
    }
}

/// Router plus the doubles behind it.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Option<Arc<FakeGateway>>,
    pub repo: Arc<dyn OrderRecordRepository>,
    pub pending: Arc<PendingOrderQueue>,
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            gateway: Some(Arc::new(FakeGateway::default())),
            secret: Some(SECRET.to_string()),
            repo: Arc::new(InMemoryOrderRecordRepository::new()),
            prices: None,
            require_priced_intents: false,
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> axum::response::Response {
        self.request(Method::POST, uri, Some(body)).await
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn customer() -> CustomerData {
    CustomerData {
        full_name: "Asha Rao".into(),
        email: "asha@example.com".into(),
        phone: "9876543210".into(),
        address: "12 MG Road".into(),
        city: "Pune".into(),
        state: "MH".into(),
        pin_code: "411001".into(),
    }
}

pub fn line(product_id: &str, unit_price: i64, quantity: u32) -> OrderLineItem {
    OrderLineItem {
        product_id: product_id.into(),
        name: format!("Product {}", product_id),
        unit_price,
        quantity,
    }
}

pub fn signed(order_id: &str, payment_id: &str) -> String {
    payments::sign(SECRET, order_id, payment_id).expect("sign")
}

/// JSON body for `POST /payment/verify`.
pub fn verify_body(order_id: &str, payment_id: &str, signature: &str) -> Value {
    serde_json::json!({
        "orderId": order_id,
        "paymentId": payment_id,
        "signature": signature,
        "customerData": customer(),
        "orderData": {
            "items": [line("tee", 1000, 2)],
            "subtotal": 2000,
            "discount": 200,
            "couponCode": "SAVE10",
            "totalAmount": 1800
        }
    })
}
