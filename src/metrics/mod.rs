/*!
 * # Metrics
 *
 * Prometheus counters for the order and payment lifecycle, exposed in text
 * format at `/metrics`. Payment outcome counters are incremented only by the
 * call that performed the state transition.
 */

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;
use tracing::trace;

lazy_static! {
    pub static ref ORDERS_CREATED: IntCounter = register_int_counter!(
        "storefront_orders_created_total",
        "Total number of orders created"
    )
    .expect("metric can be registered");

    pub static ref ORDERS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "storefront_orders_rejected_total",
        "Order submissions rejected before persistence",
        &["reason"]
    )
    .expect("metric can be registered");

    pub static ref ORDERS_CANCELLED: IntCounter = register_int_counter!(
        "storefront_orders_cancelled_total",
        "Total number of orders cancelled by customers"
    )
    .expect("metric can be registered");

    pub static ref PAYMENTS_VERIFIED: IntCounter = register_int_counter!(
        "storefront_payments_verified_total",
        "Orders transitioned to verified"
    )
    .expect("metric can be registered");

    pub static ref PAYMENTS_FAILED: IntCounterVec = register_int_counter_vec!(
        "storefront_payments_failed_total",
        "Orders transitioned to failed",
        &["reason"]
    )
    .expect("metric can be registered");

    pub static ref RECONCILIATIONS_NOOP: IntCounter = register_int_counter!(
        "storefront_reconciliations_noop_total",
        "Reconciliation calls that found the order already settled"
    )
    .expect("metric can be registered");

    pub static ref NOTIFICATIONS_RECEIVED: IntCounterVec = register_int_counter_vec!(
        "storefront_gateway_notifications_total",
        "Gateway push notifications by outcome",
        &["outcome"]
    )
    .expect("metric can be registered");

    pub static ref GATEWAY_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "storefront_gateway_call_duration_seconds",
        "Latency of outbound gateway verify calls",
        &["outcome"]
    )
    .expect("metric can be registered");

    pub static ref GATEWAY_CIRCUIT_STATE: IntGauge = register_int_gauge!(
        "storefront_gateway_circuit_state",
        "Gateway circuit breaker state (0=closed, 1=open, 2=half-open)"
    )
    .expect("metric can be registered");
}

/// Records an outbound gateway call
pub fn record_gateway_call(outcome: &str, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    trace!(outcome, latency_secs = elapsed, "recording gateway call");
    GATEWAY_CALL_DURATION
        .with_label_values(&[outcome])
        .observe(elapsed);
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_text_output() {
        ORDERS_CREATED.inc();
        PAYMENTS_FAILED.with_label_values(&["amount_mismatch"]).inc();
        let text = gather_metrics().unwrap();
        assert!(text.contains("storefront_orders_created_total"));
        assert!(text.contains("storefront_payments_failed_total"));
    }
}
