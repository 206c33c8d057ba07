use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cartpay API",
        version = "1.0.0",
        description = r#"
# Cartpay checkout API

Opens payment-gateway orders for checkout intents and verifies the signed
payment callbacks before an order is treated as paid.

## Error Handling

Every failure uses the same body:

```json
{
  "success": false,
  "error": "Payment verification failed",
  "code": "payment_verification_failed",
  "requestId": "3f0f8c1e-1d2b-4a5c-9e61-0c2f7d0b7a11",
  "timestamp": "2026-01-01T00:00:00Z"
}
```

## Idempotency

- `POST /order/create` returns the same gateway order for a repeated `receipt`.
- `POST /payment/verify` stores one order record per `(orderId, paymentId)`.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "checkout", description = "Order creation and payment verification"),
        (name = "ops", description = "Health and metrics")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order_records,
        crate::handlers::payments::verify_payment,
        crate::handlers::health::health,
        crate::handlers::health::metrics,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::GatewayOrderHandle,
            crate::services::pricing::IntentLine,
            crate::services::payments::VerifyPaymentRequest,
            crate::handlers::payments::VerifyPaymentResponse,
            crate::handlers::orders::OrderRecordsResponse,
            crate::handlers::health::HealthResponse,
            crate::models::CustomerData,
            crate::models::OrderData,
            crate::models::OrderLineItem,
            crate::models::OrderRecord,
            crate::models::OrderStatus,
        )
    )
)]
pub struct ApiDoc;

/// Serves the generated document at `/openapi.json`.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
