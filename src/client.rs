//! HTTP client for the checkout half that runs next to the cart.

use crate::cart::CartStore;
use crate::errors::ErrorResponse;
use crate::handlers::payments::VerifyPaymentResponse;
use crate::models::{CustomerData, OrderIntent, PaymentCallback};
use crate::services::orders::{CreateOrderRequest, GatewayOrderHandle};
use crate::services::payments::VerifyPaymentRequest;
use crate::services::pricing::IntentLine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("could not decode server response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Signature mismatches are final; the user has to contact support.
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, ClientError::Api { code, .. } if code == "payment_verification_failed")
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutClient {
    base_url: String,
    http: reqwest::Client,
}

impl CheckoutClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Opens the gateway order for a frozen cart.
    #[instrument(skip(self, intent), fields(receipt = %intent.receipt, total = intent.total))]
    pub async fn create_order(
        &self,
        intent: &OrderIntent,
    ) -> Result<GatewayOrderHandle, ClientError> {
        let request = CreateOrderRequest {
            amount: intent.amount_major(),
            currency: intent.currency.clone(),
            receipt: intent.receipt.clone(),
            notes: None,
            items: Some(
                intent
                    .items
                    .iter()
                    .map(|item| IntentLine {
                        product_id: item.product.id.clone(),
                        quantity: i64::from(item.quantity),
                    })
                    .collect(),
            ),
            coupon_code: intent.coupon_code.clone(),
        };
        self.post("/order/create", &request).await
    }

    pub async fn verify_payment(
        &self,
        callback: &PaymentCallback,
        customer: &CustomerData,
        intent: &OrderIntent,
    ) -> Result<VerifyPaymentResponse, ClientError> {
        let request = VerifyPaymentRequest {
            order_id: callback.order_id.clone(),
            payment_id: callback.payment_id.clone(),
            signature: callback.signature.clone(),
            customer_data: customer.clone(),
            order_data: intent.order_data(),
        };
        self.post("/payment/verify", &request).await
    }

    /// Verifies the callback and clears the cart once the server confirms.
    /// The cart is left untouched on any failure.
    #[instrument(skip_all, fields(order_id = %callback.order_id))]
    pub async fn settle(
        &self,
        cart: &mut CartStore,
        callback: &PaymentCallback,
        customer: &CustomerData,
        intent: &OrderIntent,
    ) -> Result<VerifyPaymentResponse, ClientError> {
        let response = self.verify_payment(callback, customer, intent).await?;
        if response.success {
            cart.clear();
            info!(payment_id = %response.payment_id, "checkout settled");
        } else {
            warn!("server answered without success flag; cart kept");
        }
        Ok(response)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_slice::<ErrorResponse>(&bytes) {
                Ok(body) => (body.code, body.error),
                Err(_) => (
                    "unknown".to_string(),
                    String::from_utf8_lossy(&bytes).into_owned(),
                ),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}
