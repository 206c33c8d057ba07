use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::json_rejection;
use crate::errors::ServiceError;
use crate::services::payments::VerifyPaymentRequest;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub order_id: String,
    pub payment_id: String,
    /// False while the order record waits in the retry queue.
    pub recorded: bool,
}

#[utoipa::path(
    post,
    path = "/payment/verify",
    summary = "Verify payment callback",
    description = "Check the gateway signature of a payment callback and record the confirmed order",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified", body = VerifyPaymentResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Payment verification failed", body = crate::errors::ErrorResponse),
        (status = 500, description = "Gateway secret missing or unexpected failure", body = crate::errors::ErrorResponse),
    ),
    tag = "checkout"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<VerifyPaymentResponse>, ServiceError> {
    let Json(request) = payload.map_err(json_rejection)?;
    let outcome = state.payments.verify_payment(request).await?;

    Ok(Json(VerifyPaymentResponse {
        success: true,
        order_id: outcome.record.order_id,
        payment_id: outcome.record.payment_id,
        recorded: outcome.recorded,
    }))
}
