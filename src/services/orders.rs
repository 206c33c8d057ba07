use crate::errors::ServiceError;
use crate::gateway::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway};
use crate::metrics::{
    AMOUNT_MISMATCHES, GATEWAY_FAILURES, GATEWAY_ORDERS_CREATED, GATEWAY_ORDER_REPLAYS,
};
use crate::models::{MinorUnits, MINOR_UNITS_PER_MAJOR};
use crate::services::pricing::{IntentLine, PricingService};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount must be greater than 0".into());
        Err(err)
    }
}

fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency");
        err.message = Some("Currency must be a 3-letter ISO code".into());
        Err(err)
    }
}

/// Body of `POST /order/create`. `amount` is in major units (e.g. rupees).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(custom = "validate_positive_decimal")]
    #[schema(value_type = f64, example = 18.0)]
    pub amount: Decimal,
    /// Falls back to the configured default currency when omitted
    #[serde(default)]
    #[validate(custom = "validate_currency")]
    #[schema(example = "INR")]
    pub currency: String,
    #[validate(length(min = 1, max = 40))]
    #[schema(example = "rcpt_4f1c2d")]
    pub receipt: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub notes: Option<Map<String, Value>>,
    /// Cart lines for server-side recomputation of `amount`.
    #[serde(default)]
    pub items: Option<Vec<IntentLine>>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// Gateway order handle returned to the client; `amount` is in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GatewayOrderHandle {
    pub id: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: String,
}

impl From<GatewayOrder> for GatewayOrderHandle {
    fn from(order: GatewayOrder) -> Self {
        Self {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
            status: order.status,
        }
    }
}

/// Converts a major-unit amount to minor units. Fractions of a minor unit
/// are rejected rather than rounded.
pub fn to_minor_units(amount: Decimal) -> Result<MinorUnits, ServiceError> {
    let scaled = amount
        .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("amount {} is out of range", amount))
        })?;
    if !scaled.fract().is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "amount {} has more precision than the currency allows",
            amount
        )));
    }
    match scaled.to_i64() {
        Some(minor) if minor > 0 => Ok(minor),
        _ => Err(ServiceError::ValidationError(format!(
            "amount {} is out of range",
            amount
        ))),
    }
}

pub const DEFAULT_RECEIPT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
struct ReceiptSlot {
    cell: Arc<OnceCell<GatewayOrderHandle>>,
    created_at: Instant,
}

/// Opens gateway orders for checkout intents.
///
/// Each receipt maps to at most one gateway order until its entry expires.
/// Concurrent calls for the same receipt share one gateway call; a failed
/// call leaves no entry behind.
pub struct OrderCreationService {
    gateway: Option<Arc<dyn PaymentGateway>>,
    pricing: Option<PricingService>,
    require_priced_intents: bool,
    default_currency: String,
    gateway_timeout: Duration,
    receipt_ttl: Duration,
    receipts: DashMap<String, ReceiptSlot>,
}

impl OrderCreationService {
    pub fn new(gateway: Option<Arc<dyn PaymentGateway>>, gateway_timeout: Duration) -> Self {
        Self {
            gateway,
            pricing: None,
            require_priced_intents: false,
            default_currency: "INR".to_string(),
            gateway_timeout,
            receipt_ttl: DEFAULT_RECEIPT_TTL,
            receipts: DashMap::new(),
        }
    }

    /// Currency applied to requests that do not name one.
    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into().trim().to_ascii_uppercase();
        self
    }

    /// How long a receipt keeps answering with its gateway order.
    pub fn with_receipt_ttl(mut self, ttl: Duration) -> Self {
        self.receipt_ttl = ttl;
        self
    }

    /// Receipts currently remembered.
    pub fn receipt_count(&self) -> usize {
        self.receipts.len()
    }

    /// Forgets receipts older than the TTL at `now`.
    pub fn evict_stale_receipts(&self, now: Instant) -> usize {
        let before = self.receipts.len();
        let ttl = self.receipt_ttl;
        self.receipts
            .retain(|_, slot| now.saturating_duration_since(slot.created_at) < ttl);
        let evicted = before.saturating_sub(self.receipts.len());
        if evicted > 0 {
            debug!(evicted, "expired receipts evicted");
        }
        evicted
    }

    /// Enables recomputation of declared amounts against server prices.
    pub fn with_pricing(mut self, pricing: PricingService, require_priced_intents: bool) -> Self {
        self.pricing = Some(pricing);
        self.require_priced_intents = require_priced_intents;
        self
    }

    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<GatewayOrderHandle, ServiceError> {
        self.create_order_at(request, Utc::now()).await
    }

    #[instrument(skip(self, request, now), fields(receipt = %request.receipt))]
    pub async fn create_order_at(
        &self,
        mut request: CreateOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<GatewayOrderHandle, ServiceError> {
        let gateway = self
            .gateway
            .clone()
            .ok_or(ServiceError::GatewayNotConfigured)?;

        if request.currency.trim().is_empty() {
            request.currency = self.default_currency.clone();
        }
        request.validate()?;
        let amount = to_minor_units(request.amount)?;
        let currency = request.currency.to_ascii_uppercase();

        self.check_declared_amount(&request, amount, now)?;

        let arrived_at = Instant::now();
        self.evict_stale_receipts(arrived_at);
        let cell = self
            .receipts
            .entry(request.receipt.clone())
            .or_insert_with(|| ReceiptSlot {
                cell: Arc::new(OnceCell::new()),
                created_at: arrived_at,
            })
            .cell
            .clone();

        let mut created_here = false;
        let gateway_request = GatewayOrderRequest {
            amount,
            currency: currency.clone(),
            receipt: request.receipt.clone(),
            notes: request.notes.clone().unwrap_or_default(),
        };
        let created = &mut created_here;
        let result = cell
            .get_or_try_init(|| async move {
                *created = true;
                self.call_gateway(gateway.as_ref(), &gateway_request)
                    .await
                    .map(GatewayOrderHandle::from)
            })
            .await
            .map(GatewayOrderHandle::clone);

        let handle = match result {
            Ok(handle) => {
                if created_here {
                    // an overlapping failure may have dropped the slot while this call succeeded
                    self.receipts
                        .entry(request.receipt.clone())
                        .or_insert_with(|| ReceiptSlot {
                            cell: cell.clone(),
                            created_at: arrived_at,
                        });
                }
                handle
            }
            Err(e) => {
                self.receipts.remove_if(&request.receipt, |_, slot| {
                    Arc::ptr_eq(&slot.cell, &cell) && !slot.cell.initialized()
                });
                return Err(e);
            }
        };

        if handle.amount != amount || !handle.currency.eq_ignore_ascii_case(&currency) {
            warn!(
                existing_amount = handle.amount,
                requested_amount = amount,
                "receipt reused for a different amount"
            );
            return Err(ServiceError::Conflict(format!(
                "receipt {} already has an order for a different amount",
                request.receipt
            )));
        }

        if !created_here {
            GATEWAY_ORDER_REPLAYS.inc();
            info!(order_id = %handle.id, "returning existing gateway order for receipt");
        }
        Ok(handle)
    }

    fn check_declared_amount(
        &self,
        request: &CreateOrderRequest,
        declared: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let Some(pricing) = &self.pricing else {
            return Ok(());
        };

        match &request.items {
            Some(lines) => {
                let quote = pricing.quote(lines, request.coupon_code.as_deref(), now)?;
                if quote.total != declared {
                    AMOUNT_MISMATCHES.inc();
                    warn!(
                        declared,
                        computed = quote.total,
                        "declared amount does not match server quote"
                    );
                    return Err(ServiceError::AmountMismatch {
                        declared,
                        computed: quote.total,
                    });
                }
                Ok(())
            }
            None if self.require_priced_intents => Err(ServiceError::ValidationError(
                "items are required to price this order".to_string(),
            )),
            None => {
                warn!(declared, "accepting client-declared amount without recomputation");
                Ok(())
            }
        }
    }

    async fn call_gateway(
        &self,
        gateway: &dyn PaymentGateway,
        request: &GatewayOrderRequest,
    ) -> Result<GatewayOrder, ServiceError> {
        let result = tokio::time::timeout(self.gateway_timeout, gateway.create_order(request))
            .await
            .unwrap_or(Err(GatewayError::Timeout));

        match result {
            Ok(order) => {
                GATEWAY_ORDERS_CREATED.inc();
                info!(
                    gateway = gateway.name(),
                    order_id = %order.id,
                    amount = order.amount,
                    "gateway order created"
                );
                Ok(order)
            }
            Err(e) => {
                GATEWAY_FAILURES.inc();
                error!(gateway = gateway.name(), "gateway order creation failed: {}", e);
                Err(ServiceError::OrderCreationFailed(e.to_string()))
            }
        }
    }
}
