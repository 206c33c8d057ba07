use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::json_rejection;
use crate::errors::ServiceError;
use crate::models::OrderRecord;
use crate::services::orders::{CreateOrderRequest, GatewayOrderHandle};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecordsResponse {
    pub order_id: String,
    pub records: Vec<OrderRecord>,
}

#[utoipa::path(
    post,
    path = "/order/create",
    summary = "Create gateway order",
    description = "Open a payment-gateway order for a checkout intent. Retrying with the same receipt returns the same order.",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Gateway order created", body = GatewayOrderHandle,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request or amount mismatch", body = crate::errors::ErrorResponse),
        (status = 409, description = "Receipt already used for a different amount", body = crate::errors::ErrorResponse),
        (status = 500, description = "Gateway not configured or gateway call failed", body = crate::errors::ErrorResponse),
    ),
    tag = "checkout"
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<GatewayOrderHandle>, ServiceError> {
    let Json(request) = payload.map_err(json_rejection)?;
    let handle = state.orders.create_order(request).await?;
    Ok(Json(handle))
}

#[utoipa::path(
    get,
    path = "/orders/{orderId}",
    summary = "Get order records",
    description = "Confirmed order records stored for a gateway order id",
    params(("orderId" = String, Path, description = "Gateway order id")),
    responses(
        (status = 200, description = "Order records found", body = OrderRecordsResponse),
        (status = 404, description = "No records for this order", body = crate::errors::ErrorResponse),
    ),
    tag = "checkout"
)]
pub async fn get_order_records(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderRecordsResponse>, ServiceError> {
    let records = state.payments.orders_for(&order_id).await?;
    Ok(Json(OrderRecordsResponse { order_id, records }))
}
