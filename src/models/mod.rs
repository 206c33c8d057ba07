//! Domain types shared by the cart, the pricing rules and the settlement services.

pub mod cart;
pub mod coupon;
pub mod order;
pub mod product;

pub use cart::{CartItem, CartSnapshot, OrderIntent, Totals};
pub use coupon::{Coupon, DiscountType};
pub use order::{
    CustomerData, OrderData, OrderLineItem, OrderRecord, OrderStatus, PaymentCallback,
};
pub use product::Product;

/// Amount in the smallest currency unit (paise for INR, cents for USD).
pub type MinorUnits = i64;

/// Number of minor units in one major unit for the supported currencies.
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;
