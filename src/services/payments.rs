use crate::errors::ServiceError;
use crate::metrics::{
    DUPLICATE_CALLBACKS, ORDER_PERSIST_FAILURES, PAYMENTS_REJECTED, PAYMENTS_VERIFIED,
};
use crate::models::{CustomerData, OrderData, OrderRecord, PaymentCallback};
use crate::repositories::{InsertOutcome, OrderRecordRepository};
use crate::services::order_recovery::{Enqueued, PendingOrderQueue};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(secret: &str, order_id: &str, payment_id: &str) -> Result<HmacSha256, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("invalid HMAC key: {}", e)))?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 of `order_id|payment_id`, the signature the gateway
/// attaches to a payment callback.
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> Result<String, ServiceError> {
    let mac = keyed_mac(secret, order_id, payment_id)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a callback signature. Malformed hex is rejected
/// outright.
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    match keyed_mac(secret, order_id, payment_id) {
        Ok(mac) => mac.verify_slice(&provided).is_ok(),
        Err(_) => false,
    }
}

/// Body of `POST /payment/verify`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[schema(example = "order_NGdT4lnCMxkjxA")]
    pub order_id: String,
    #[schema(example = "pay_NGdTBb3wR5ZoVz")]
    pub payment_id: String,
    pub signature: String,
    #[validate]
    pub customer_data: CustomerData,
    #[validate]
    pub order_data: OrderData,
}

impl VerifyPaymentRequest {
    pub fn callback(&self) -> PaymentCallback {
        PaymentCallback {
            order_id: self.order_id.clone(),
            payment_id: self.payment_id.clone(),
            signature: self.signature.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub record: OrderRecord,
    /// False when an earlier callback for the same payment already stored it.
    pub newly_created: bool,
    /// False when the record is waiting in the retry queue.
    pub recorded: bool,
}

/// Decides whether a payment callback is genuine and records the order.
pub struct PaymentVerificationService {
    secret: Option<String>,
    repo: Arc<dyn OrderRecordRepository>,
    pending: Arc<PendingOrderQueue>,
}

impl fmt::Debug for PaymentVerificationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentVerificationService")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl PaymentVerificationService {
    pub fn new(
        secret: Option<String>,
        repo: Arc<dyn OrderRecordRepository>,
        pending: Arc<PendingOrderQueue>,
    ) -> Self {
        Self {
            secret: secret.filter(|s| !s.trim().is_empty()),
            repo,
            pending,
        }
    }

    pub async fn verify_payment(
        &self,
        request: VerifyPaymentRequest,
    ) -> Result<VerificationOutcome, ServiceError> {
        self.verify_payment_at(request, Utc::now()).await
    }

    #[instrument(
        skip(self, request, now),
        fields(order_id = %request.order_id, payment_id = %request.payment_id)
    )]
    pub async fn verify_payment_at(
        &self,
        request: VerifyPaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, ServiceError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(ServiceError::GatewayNotConfigured)?;

        if !verify_signature(secret, &request.order_id, &request.payment_id, &request.signature) {
            PAYMENTS_REJECTED.inc();
            warn!("payment signature mismatch");
            return Err(ServiceError::PaymentVerificationFailed);
        }
        PAYMENTS_VERIFIED.inc();

        // The payment is real from here on; bad customer or order details
        // are flagged but never turn into a payment failure.
        if let Err(e) = request.validate() {
            warn!("verified payment carries invalid order details: {}", e);
        }

        let callback = request.callback();
        let record =
            OrderRecord::confirmed(&callback, request.customer_data, request.order_data, now);

        match self.repo.insert_if_absent(record.clone()).await {
            Ok(InsertOutcome::Inserted(record)) => {
                info!(total = record.total_amount, "payment verified, order confirmed");
                Ok(VerificationOutcome {
                    record,
                    newly_created: true,
                    recorded: true,
                })
            }
            Ok(InsertOutcome::AlreadyExists(existing)) => {
                DUPLICATE_CALLBACKS.inc();
                info!("payment already recorded, returning existing order");
                Ok(VerificationOutcome {
                    record: existing,
                    newly_created: false,
                    recorded: true,
                })
            }
            Err(e) => match self.pending.push(record.clone()).await {
                Enqueued::Queued => {
                    ORDER_PERSIST_FAILURES.inc();
                    error!(
                        total = record.total_amount,
                        "payment verified but order record could not be stored, queued for retry: {}",
                        e
                    );
                    Ok(VerificationOutcome {
                        record,
                        newly_created: true,
                        recorded: false,
                    })
                }
                Enqueued::AlreadyQueued(queued) => {
                    DUPLICATE_CALLBACKS.inc();
                    warn!("payment already waiting in the retry queue: {}", e);
                    Ok(VerificationOutcome {
                        record: queued,
                        newly_created: false,
                        recorded: false,
                    })
                }
            },
        }
    }

    /// Stored records for a gateway order, for the confirmation page.
    pub async fn orders_for(&self, order_id: &str) -> Result<Vec<OrderRecord>, ServiceError> {
        let records = self.repo.find_by_order_id(order_id).await?;
        if records.is_empty() {
            return Err(ServiceError::NotFound(format!("order {}", order_id)));
        }
        Ok(records)
    }
}
