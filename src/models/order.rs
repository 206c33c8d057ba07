use super::MinorUnits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Values the gateway hands back to the client after it collects a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerData {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 3, max = 12))]
    pub pin_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[validate(range(min = 0))]
    pub unit_price: i64,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

/// Client-declared cart summary attached to a payment callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    #[validate]
    pub items: Vec<OrderLineItem>,
    #[validate(range(min = 0))]
    pub subtotal: i64,
    #[validate(range(min = 0))]
    pub discount: i64,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[validate(range(min = 0))]
    pub total_amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Confirmed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Confirmed => "confirmed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirmed" => Some(OrderStatus::Confirmed),
            _ => None,
        }
    }
}

/// Durable result of a verified payment. Only the verification service
/// creates these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub customer: CustomerData,
    pub items: Vec<OrderLineItem>,
    pub subtotal: MinorUnits,
    pub discount: MinorUnits,
    pub coupon_code: Option<String>,
    pub total_amount: MinorUnits,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn confirmed(
        callback: &PaymentCallback,
        customer: CustomerData,
        order: OrderData,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: callback.order_id.clone(),
            payment_id: callback.payment_id.clone(),
            signature: callback.signature.clone(),
            customer,
            items: order.items,
            subtotal: order.subtotal,
            discount: order.discount,
            coupon_code: order.coupon_code,
            total_amount: order.total_amount,
            status: OrderStatus::Confirmed,
            created_at,
        }
    }
}
