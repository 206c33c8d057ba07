//! Coupon rules.
//!
//! Validation and discount computation are free functions so the cart, the
//! server-side pricing path and the tests all share one implementation.
//! Rounding of percentage discounts is to the nearest minor unit, ties away
//! from zero.

use crate::models::{Coupon, DiscountType, MinorUnits};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("Coupon {0} does not exist")]
    NotFound(String),

    #[error("Coupon {0} has expired")]
    Expired(String),

    #[error("Coupon {code} requires a subtotal of at least {min_amount}")]
    MinimumNotMet {
        code: String,
        min_amount: MinorUnits,
        subtotal: MinorUnits,
    },
}

impl CouponError {
    /// Stable machine-readable code for API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CouponError::NotFound(_) => "coupon_not_found",
            CouponError::Expired(_) => "coupon_expired",
            CouponError::MinimumNotMet { .. } => "minimum_not_met",
        }
    }
}

/// Checks a coupon against a subtotal. Expiry is reported before the
/// minimum-spend check when both fail.
pub fn validate(
    coupon: &Coupon,
    subtotal: MinorUnits,
    now: DateTime<Utc>,
) -> Result<(), CouponError> {
    if coupon.is_expired_at(now) {
        return Err(CouponError::Expired(coupon.code.clone()));
    }

    if let Some(min_amount) = coupon.min_amount {
        if subtotal < min_amount {
            return Err(CouponError::MinimumNotMet {
                code: coupon.code.clone(),
                min_amount,
                subtotal,
            });
        }
    }

    Ok(())
}

/// Discount a coupon yields on `subtotal`, bounded by `maxDiscount` and by
/// the subtotal itself.
pub fn discount_for(coupon: &Coupon, subtotal: MinorUnits) -> MinorUnits {
    if subtotal <= 0 {
        return 0;
    }

    let raw = match coupon.discount_type {
        DiscountType::Percentage => {
            Decimal::from(subtotal) * coupon.discount / Decimal::ONE_HUNDRED
        }
        DiscountType::Fixed => coupon.discount,
    };

    let rounded = raw
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(MinorUnits::MAX);

    let capped = match coupon.max_discount {
        Some(max_discount) => rounded.min(max_discount),
        None => rounded,
    };

    let discount = capped.clamp(0, subtotal);
    debug!(
        coupon = %coupon.code,
        subtotal,
        discount,
        "computed coupon discount"
    );
    discount
}

/// Validate then compute, as `applyCoupon` and the server quote do.
pub fn evaluate(
    coupon: &Coupon,
    subtotal: MinorUnits,
    now: DateTime<Utc>,
) -> Result<MinorUnits, CouponError> {
    validate(coupon, subtotal, now)?;
    Ok(discount_for(coupon, subtotal))
}

/// Read-only coupon reference data.
pub trait CouponCatalog: Send + Sync {
    /// Case-insensitive lookup.
    fn find(&self, code: &str) -> Option<Coupon>;

    fn lookup(&self, code: &str) -> Result<Coupon, CouponError> {
        self.find(code)
            .ok_or_else(|| CouponError::NotFound(code.trim().to_string()))
    }
}

/// Fixed coupon list keyed by upper-cased code.
#[derive(Debug, Clone, Default)]
pub struct StaticCouponCatalog {
    coupons: HashMap<String, Coupon>,
}

impl StaticCouponCatalog {
    pub fn new(coupons: impl IntoIterator<Item = Coupon>) -> Self {
        let coupons = coupons
            .into_iter()
            .map(|coupon| (coupon.code.trim().to_ascii_uppercase(), coupon))
            .collect();
        Self { coupons }
    }

    /// The reference promotions shipped with the storefront.
    pub fn reference() -> Self {
        let expiry = Utc
            .with_ymd_and_hms(2030, 12, 31, 23, 59, 59)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self::new([
            Coupon::percentage("SAVE10", Decimal::TEN, expiry).with_min_amount(500),
            Coupon::fixed("FLAT500", 500, expiry).with_min_amount(2000),
            Coupon::percentage("WELCOME20", Decimal::from(20), expiry)
                .with_min_amount(1000)
                .with_max_discount(1000),
        ])
    }

    /// Loads a JSON array of coupons.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let coupons: Vec<Coupon> = serde_json::from_str(raw)?;
        Ok(Self::new(coupons))
    }

    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }

    pub fn into_shared(self) -> Arc<dyn CouponCatalog> {
        Arc::new(self)
    }
}

impl CouponCatalog for StaticCouponCatalog {
    fn find(&self, code: &str) -> Option<Coupon> {
        self.coupons
            .get(&code.trim().to_ascii_uppercase())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[rstest]
    #[case(2000, dec!(10), 200)]
    #[case(1005, dec!(10), 101)] // 100.5 rounds away from zero
    #[case(1004, dec!(10), 100)]
    #[case(999, dec!(12.5), 125)] // 124.875
    #[case(0, dec!(10), 0)]
    fn percentage_rounds_half_away_from_zero(
        #[case] subtotal: MinorUnits,
        #[case] percent: Decimal,
        #[case] expected: MinorUnits,
    ) {
        let coupon = Coupon::percentage("P", percent, now());
        assert_eq!(discount_for(&coupon, subtotal), expected);
    }

    #[test]
    fn percentage_is_capped_by_max_discount() {
        let coupon = Coupon::percentage("WELCOME20", dec!(20), now()).with_max_discount(1000);
        assert_eq!(discount_for(&coupon, 3000), 600);
        assert_eq!(discount_for(&coupon, 10_000), 1000);
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() {
        let coupon = Coupon::fixed("FLAT500", 500, now());
        assert_eq!(discount_for(&coupon, 300), 300);
        assert_eq!(discount_for(&coupon, 2000), 500);
    }

    #[test]
    fn fixed_discount_respects_cap() {
        let coupon = Coupon::fixed("BIG", 900, now()).with_max_discount(400);
        assert_eq!(discount_for(&coupon, 5000), 400);
    }

    #[test]
    fn expired_is_reported_before_minimum() {
        let coupon = Coupon::fixed("OLD", 500, now() - Duration::days(1)).with_min_amount(2000);
        assert_matches!(
            validate(&coupon, 100, now()),
            Err(CouponError::Expired(code)) if code == "OLD"
        );
    }

    #[test]
    fn coupon_is_valid_at_expiry_instant() {
        let coupon = Coupon::fixed("EDGE", 100, now());
        assert_eq!(evaluate(&coupon, 1000, now()), Ok(100));
    }

    #[test]
    fn minimum_not_met_carries_amounts() {
        let coupon = Coupon::fixed("FLAT500", 500, now()).with_min_amount(2000);
        assert_matches!(
            evaluate(&coupon, 1800, now()),
            Err(CouponError::MinimumNotMet { min_amount: 2000, subtotal: 1800, .. })
        );
    }

    #[test]
    fn catalog_lookup_is_case_insensitive() {
        let catalog = StaticCouponCatalog::reference();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.find("save10").map(|c| c.code), Some("SAVE10".to_string()));
        assert_eq!(catalog.find(" Welcome20 ").map(|c| c.code), Some("WELCOME20".to_string()));
        assert_matches!(catalog.lookup("NOPE"), Err(CouponError::NotFound(code)) if code == "NOPE");
    }

    #[test]
    fn catalog_loads_from_json() {
        let raw = r#"[{"code":"json5","discount":"5","discountType":"percentage","expiryDate":"2030-01-01T00:00:00Z"}]"#;
        let catalog = StaticCouponCatalog::from_json(raw).unwrap();
        let coupon = catalog.find("JSON5").unwrap();
        assert_eq!(coupon.discount_type, DiscountType::Percentage);
        assert_eq!(coupon.min_amount, None);
    }
}
