use super::MinorUnits;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `discount` is a percent of the subtotal
    Percentage,
    /// `discount` is an amount in minor units
    Fixed,
}

/// Immutable promotional rule. Codes compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    pub discount: Decimal,
    pub discount_type: DiscountType,
    /// Subtotal floor required to apply, in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<MinorUnits>,
    /// Cap on the computed discount, in minor units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<MinorUnits>,
    pub expiry_date: DateTime<Utc>,
}

impl Coupon {
    pub fn percentage(
        code: impl Into<String>,
        percent: Decimal,
        expiry_date: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            discount: percent,
            discount_type: DiscountType::Percentage,
            min_amount: None,
            max_discount: None,
            expiry_date,
        }
    }

    pub fn fixed(code: impl Into<String>, amount: MinorUnits, expiry_date: DateTime<Utc>) -> Self {
        Self {
            code: code.into(),
            discount: Decimal::from(amount),
            discount_type: DiscountType::Fixed,
            min_amount: None,
            max_discount: None,
            expiry_date,
        }
    }

    pub fn with_min_amount(mut self, min_amount: MinorUnits) -> Self {
        self.min_amount = Some(min_amount);
        self
    }

    pub fn with_max_discount(mut self, max_discount: MinorUnits) -> Self {
        self.max_discount = Some(max_discount);
        self
    }

    /// A coupon is still valid at the exact expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }
}
