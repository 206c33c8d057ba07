use crate::errors::ServiceError;
use crate::models::{MinorUnits, Product, Totals};
use crate::services::coupons::{self, CouponCatalog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

/// One `{productId, quantity}` selection as declared by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntentLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Server-held product prices, the authority for recomputing a cart.
#[derive(Debug, Clone, Default)]
pub struct PriceList {
    products: HashMap<String, Product>,
}

impl PriceList {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products
                .into_iter()
                .map(|product| (product.id.clone(), product))
                .collect(),
        }
    }

    /// Loads a JSON array of products.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let products: Vec<Product> = serde_json::from_str(raw)?;
        Ok(Self::new(products))
    }

    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Recomputes cart totals from the price list and the coupon rules, ignoring
/// whatever prices the client holds.
#[derive(Clone)]
pub struct PricingService {
    prices: Arc<PriceList>,
    coupons: Arc<dyn CouponCatalog>,
}

impl PricingService {
    pub fn new(prices: Arc<PriceList>, coupons: Arc<dyn CouponCatalog>) -> Self {
        Self { prices, coupons }
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub fn quote(
        &self,
        lines: &[IntentLine],
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Totals, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "order must contain at least one item".to_string(),
            ));
        }

        let mut subtotal: MinorUnits = 0;
        for line in lines {
            if line.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "quantity for product {} must be positive",
                    line.product_id
                )));
            }
            let product = self.prices.get(&line.product_id).ok_or_else(|| {
                ServiceError::ValidationError(format!("unknown product {}", line.product_id))
            })?;
            subtotal = subtotal.saturating_add(product.unit_price.saturating_mul(line.quantity));
        }

        let discount = match coupon_code.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => {
                let coupon = self.coupons.lookup(code)?;
                coupons::evaluate(&coupon, subtotal, now)?
            }
            None => 0,
        };

        let totals = Totals::new(subtotal, discount);
        debug!(
            subtotal = totals.subtotal,
            discount = totals.discount,
            total = totals.total,
            "server quote computed"
        );
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::coupons::{CouponError, StaticCouponCatalog};
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn service() -> PricingService {
        let prices = PriceList::new([
            Product::new("tee", "T-shirt", 1000),
            Product::new("mug", "Mug", 450),
        ]);
        PricingService::new(Arc::new(prices), StaticCouponCatalog::reference().into_shared())
    }

    fn line(id: &str, quantity: i64) -> IntentLine {
        IntentLine {
            product_id: id.to_string(),
            quantity,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn quote_uses_server_prices_and_coupon() {
        let totals = service()
            .quote(&[line("tee", 2), line("mug", 2)], Some("save10"), now())
            .unwrap();
        assert_eq!(totals, Totals::new(2900, 290));
    }

    #[test]
    fn quote_rejects_unknown_products_and_bad_quantities() {
        let svc = service();
        assert_matches!(
            svc.quote(&[line("ghost", 1)], None, now()),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            svc.quote(&[line("tee", 0)], None, now()),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(svc.quote(&[], None, now()), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn quote_surfaces_coupon_failures() {
        assert_matches!(
            service().quote(&[line("mug", 1)], Some("FLAT500"), now()),
            Err(ServiceError::Coupon(CouponError::MinimumNotMet { .. }))
        );
    }

    #[test]
    fn price_list_loads_from_json() {
        let prices =
            PriceList::from_json(r#"[{"id":"a","name":"A","unitPrice":125,"merchantId":"m1"}]"#)
                .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get("a").and_then(|p| p.merchant_id.as_deref()), Some("m1"));
    }
}
