// Pricing rules
pub mod coupons;
pub mod pricing;

// Checkout on the server side
pub mod order_recovery;
pub mod orders;
pub mod payments;

pub use coupons::{CouponCatalog, CouponError, StaticCouponCatalog};
pub use order_recovery::{PendingOrderQueue, RetryPolicy};
pub use orders::{CreateOrderRequest, GatewayOrderHandle, OrderCreationService};
pub use payments::{PaymentVerificationService, VerificationOutcome, VerifyPaymentRequest};
pub use pricing::{IntentLine, PriceList, PricingService};
