use super::{Coupon, MinorUnits, OrderData, OrderLineItem, Product, MINOR_UNITS_PER_MAJOR};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product: Product,
    /// Always at least 1 while the item is in a cart
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            quantity: 1,
        }
    }

    pub fn line_total(&self) -> MinorUnits {
        self.product
            .unit_price
            .saturating_mul(MinorUnits::from(self.quantity))
    }

    pub fn to_line_item(&self) -> OrderLineItem {
        OrderLineItem {
            product_id: self.product.id.clone(),
            name: self.product.name.clone(),
            unit_price: self.product.unit_price,
            quantity: self.quantity,
        }
    }
}

/// Client-persisted cart object: `{ items, appliedCoupon }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub applied_coupon: Option<Coupon>,
}

/// Derived price breakdown, all in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: MinorUnits,
    pub discount: MinorUnits,
    pub total: MinorUnits,
}

impl Totals {
    pub fn new(subtotal: MinorUnits, discount: MinorUnits) -> Self {
        Self {
            subtotal,
            discount,
            total: subtotal.saturating_sub(discount).max(0),
        }
    }
}

/// Snapshot of a cart at the moment checkout begins. Untrusted once it
/// leaves the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIntent {
    /// Generated once per intent and reused across order-creation retries
    pub receipt: String,
    pub currency: String,
    pub items: Vec<CartItem>,
    pub subtotal: MinorUnits,
    pub discount: MinorUnits,
    pub coupon_code: Option<String>,
    pub total: MinorUnits,
    pub created_at: DateTime<Utc>,
}

impl OrderIntent {
    /// Total expressed in major units, the shape `POST /order/create` expects.
    pub fn amount_major(&self) -> Decimal {
        Decimal::from(self.total) / Decimal::from(MINOR_UNITS_PER_MAJOR)
    }

    pub fn line_items(&self) -> Vec<OrderLineItem> {
        self.items.iter().map(CartItem::to_line_item).collect()
    }

    pub fn order_data(&self) -> OrderData {
        OrderData {
            items: self.line_items(),
            subtotal: self.subtotal,
            discount: self.discount,
            coupon_code: self.coupon_code.clone(),
            total_amount: self.total,
        }
    }
}
