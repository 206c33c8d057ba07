//! Prometheus counters for the checkout pipeline, exposed at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    pub static ref GATEWAY_ORDERS_CREATED: IntCounter = register_int_counter!(
        "cartpay_gateway_orders_created_total",
        "Gateway orders created"
    ).unwrap();

    pub static ref GATEWAY_ORDER_REPLAYS: IntCounter = register_int_counter!(
        "cartpay_gateway_order_replays_total",
        "Order-creation retries answered from a previously created gateway order"
    ).unwrap();

    pub static ref GATEWAY_FAILURES: IntCounter = register_int_counter!(
        "cartpay_gateway_failures_total",
        "Gateway order-creation calls that failed or timed out"
    ).unwrap();

    pub static ref AMOUNT_MISMATCHES: IntCounter = register_int_counter!(
        "cartpay_amount_mismatches_total",
        "Order intents whose declared amount differed from the server quote"
    ).unwrap();

    pub static ref PAYMENTS_VERIFIED: IntCounter = register_int_counter!(
        "cartpay_payments_verified_total",
        "Payment callbacks whose signature verified"
    ).unwrap();

    pub static ref PAYMENTS_REJECTED: IntCounter = register_int_counter!(
        "cartpay_payments_rejected_total",
        "Payment callbacks rejected on signature mismatch"
    ).unwrap();

    pub static ref DUPLICATE_CALLBACKS: IntCounter = register_int_counter!(
        "cartpay_duplicate_callbacks_total",
        "Verified callbacks for a payment that already had an order record"
    ).unwrap();

    pub static ref ORDER_PERSIST_FAILURES: IntCounter = register_int_counter!(
        "cartpay_order_persist_failures_total",
        "Verified payments whose order record could not be stored"
    ).unwrap();

    pub static ref PENDING_ORDER_RECORDS: IntGauge = register_int_gauge!(
        "cartpay_pending_order_records",
        "Verified payments waiting for their order record to be stored"
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
