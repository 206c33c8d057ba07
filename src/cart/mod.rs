//! Client-resident shopping cart.
//!
//! `CartStore` is an explicit, injectable object: the UI layer owns one per
//! session and passes it by reference. It is single-writer state; every
//! mutation is written through to its [`CartPersistence`] on a best-effort
//! basis.

mod persistence;

pub use persistence::{CartPersistence, InMemoryCartPersistence, JsonFileCartPersistence};

use crate::models::{CartItem, CartSnapshot, Coupon, MinorUnits, OrderIntent, Product, Totals};
use crate::services::coupons::{self, CouponCatalog, CouponError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error("Cart is empty")]
    Empty,

    #[error("Cart storage error: {0}")]
    Storage(String),

    #[error("Cart serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct CartStore {
    state: CartSnapshot,
    coupons: Arc<dyn CouponCatalog>,
    persistence: Arc<dyn CartPersistence>,
}

impl CartStore {
    /// Starts an empty cart without reading the persisted slot.
    pub fn new(persistence: Arc<dyn CartPersistence>, coupons: Arc<dyn CouponCatalog>) -> Self {
        Self {
            state: CartSnapshot::default(),
            coupons,
            persistence,
        }
    }

    /// Restores the cart saved by a previous session. An unreadable snapshot
    /// is discarded and the session starts empty. Lines for the same product
    /// are merged and the applied coupon is looked up again by code.
    pub fn load(persistence: Arc<dyn CartPersistence>, coupons: Arc<dyn CouponCatalog>) -> Self {
        let state = match persistence.load() {
            Ok(Some(snapshot)) => {
                let snapshot = normalize(snapshot, coupons.as_ref());
                debug!(items = snapshot.items.len(), "restored persisted cart");
                snapshot
            }
            Ok(None) => CartSnapshot::default(),
            Err(e) => {
                warn!("Discarding unreadable persisted cart: {}", e);
                CartSnapshot::default()
            }
        };

        Self {
            state,
            coupons,
            persistence,
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.state.items
    }

    pub fn applied_coupon(&self) -> Option<&Coupon> {
        self.state.applied_coupon.as_ref()
    }

    pub fn snapshot(&self) -> &CartSnapshot {
        &self.state
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u64 {
        self.state
            .items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.state.items.is_empty()
    }

    pub fn add_item(&mut self, product: Product) {
        match self
            .state
            .items
            .iter_mut()
            .find(|item| item.product.id == product.id)
        {
            Some(item) => item.quantity = item.quantity.saturating_add(1),
            None => self.state.items.push(CartItem::new(product)),
        }
        self.persist();
    }

    pub fn remove_item(&mut self, product_id: &str) {
        let before = self.state.items.len();
        self.state.items.retain(|item| item.product.id != product_id);
        if self.state.items.len() != before {
            self.persist();
        }
    }

    /// Zero or negative quantities remove the line.
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(item) = self
            .state
            .items
            .iter_mut()
            .find(|item| item.product.id == product_id)
        {
            item.quantity = quantity;
            self.persist();
        }
    }

    /// Empties items and drops the coupon. Called once a settlement is confirmed.
    pub fn clear(&mut self) {
        self.state = CartSnapshot::default();
        self.persist();
        info!("cart cleared");
    }

    pub fn apply_coupon(&mut self, code: &str) -> Result<(), CouponError> {
        self.apply_coupon_at(code, Utc::now())
    }

    /// Replaces any applied coupon on success; leaves state untouched on failure.
    pub fn apply_coupon_at(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), CouponError> {
        let coupon = self.coupons.lookup(code)?;
        coupons::validate(&coupon, self.subtotal(), now)?;

        info!(coupon = %coupon.code, "coupon applied");
        self.state.applied_coupon = Some(coupon);
        self.persist();
        Ok(())
    }

    pub fn remove_coupon(&mut self) {
        if self.state.applied_coupon.take().is_some() {
            self.persist();
        }
    }

    pub fn subtotal(&self) -> MinorUnits {
        self.state
            .items
            .iter()
            .fold(0, |acc: MinorUnits, item| acc.saturating_add(item.line_total()))
    }

    pub fn discount_amount(&self) -> MinorUnits {
        self.state
            .applied_coupon
            .as_ref()
            .map(|coupon| coupons::discount_for(coupon, self.subtotal()))
            .unwrap_or(0)
    }

    pub fn final_total(&self) -> MinorUnits {
        self.totals().total
    }

    pub fn totals(&self) -> Totals {
        Totals::new(self.subtotal(), self.discount_amount())
    }

    /// Freezes the cart into an [`OrderIntent`] with a fresh receipt id.
    pub fn begin_checkout(&self, currency: &str) -> Result<OrderIntent, CartError> {
        if self.is_empty() {
            return Err(CartError::Empty);
        }

        let totals = self.totals();
        Ok(OrderIntent {
            receipt: format!("rcpt_{}", Uuid::new_v4().simple()),
            currency: currency.to_ascii_uppercase(),
            items: self.state.items.clone(),
            subtotal: totals.subtotal,
            discount: totals.discount,
            coupon_code: self.state.applied_coupon.as_ref().map(|c| c.code.clone()),
            total: totals.total,
            created_at: Utc::now(),
        })
    }

    fn persist(&self) {
        if let Err(e) = self.persistence.save(&self.state) {
            warn!("Failed to persist cart: {}", e);
        }
    }
}

fn normalize(snapshot: CartSnapshot, coupons: &dyn CouponCatalog) -> CartSnapshot {
    let mut items: Vec<CartItem> = Vec::with_capacity(snapshot.items.len());
    for item in snapshot.items.into_iter().filter(|item| item.quantity > 0) {
        match items.iter_mut().find(|kept| kept.product.id == item.product.id) {
            Some(kept) => kept.quantity = kept.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }

    let applied_coupon = snapshot
        .applied_coupon
        .and_then(|stored| match coupons.find(&stored.code) {
            Some(current) => Some(current),
            None => {
                warn!(coupon = %stored.code, "dropping persisted coupon no longer in catalog");
                None
            }
        });

    CartSnapshot {
        items,
        applied_coupon,
    }
}
