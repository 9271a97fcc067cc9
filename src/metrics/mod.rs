//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Transactions signed, accepted and rejected
//! - Stuck-transaction replacements
//! - Request errors by category

use crate::error::{ErrorCategory, SubmitterError, SubmitterResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref TX_SIGNED: CounterVec = register_counter_vec!(
        "ovm_submitter_transactions_signed_total",
        "Total transactions signed by command",
        &["command"]
    ).expect("metric registration");

    pub static ref TX_SUBMITTED: Counter = register_counter!(
        "ovm_submitter_transactions_submitted_total",
        "Total transactions accepted by the ledger node"
    ).expect("metric registration");

    pub static ref TX_REJECTED: CounterVec = register_counter_vec!(
        "ovm_submitter_transactions_rejected_total",
        "Total transactions not accepted by the ledger node",
        &["reason"]
    ).expect("metric registration");

    pub static ref REPLACEMENTS_ATTEMPTED: Counter = register_counter!(
        "ovm_submitter_replacements_attempted_total",
        "Total stuck-transaction replacements attempted"
    ).expect("metric registration");

    pub static ref REPLACEMENTS_SUCCEEDED: Counter = register_counter!(
        "ovm_submitter_replacements_succeeded_total",
        "Total stuck-transaction replacements accepted"
    ).expect("metric registration");

    pub static ref REQUEST_ERRORS: CounterVec = register_counter_vec!(
        "ovm_submitter_request_errors_total",
        "Total failed requests by error category",
        &["category"]
    ).expect("metric registration");

    pub static ref CONFIRMATION_LATENCY: Histogram = register_histogram!(
        "ovm_submitter_confirmation_latency_seconds",
        "Time from send until the requested confirmation depth",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).expect("metric registration");
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> SubmitterResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| SubmitterError::Config(format!("Cannot bind metrics server on {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| SubmitterError::Config(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Label for a send the node did not accept
fn rejection_reason(error: &SubmitterError) -> &'static str {
    match error {
        SubmitterError::Underpriced(_) => "underpriced",
        SubmitterError::NonceTooLow(_) => "nonce_too_low",
        SubmitterError::NonceTooHigh(_) => "nonce_too_high",
        SubmitterError::InsufficientFunds(_) => "insufficient_funds",
        SubmitterError::Rpc { .. } => "rpc_error",
        SubmitterError::RpcUnavailable(_) => "unavailable",
        SubmitterError::Cancelled { .. } => "cancelled",
        _ => "other",
    }
}

// Helper functions to record metrics

pub fn record_tx_signed(command: &str) {
    TX_SIGNED.with_label_values(&[command]).inc();
}

pub fn record_tx_submitted() {
    TX_SUBMITTED.inc();
}

pub fn record_tx_rejected(error: &SubmitterError) {
    TX_REJECTED.with_label_values(&[rejection_reason(error)]).inc();
}

pub fn record_replacement_attempted() {
    REPLACEMENTS_ATTEMPTED.inc();
}

pub fn record_replacement_succeeded() {
    REPLACEMENTS_SUCCEEDED.inc();
}

pub fn record_request_error(category: ErrorCategory) {
    REQUEST_ERRORS.with_label_values(&[category.as_str()]).inc();
}

pub fn record_confirmation_latency(latency_secs: f64) {
    CONFIRMATION_LATENCY.observe(latency_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(
            rejection_reason(&SubmitterError::Underpriced("x".into())),
            "underpriced"
        );
        assert_eq!(
            rejection_reason(&SubmitterError::NonceTooLow("x".into())),
            "nonce_too_low"
        );
        assert_eq!(rejection_reason(&SubmitterError::MissingNonce), "other");
    }

    #[test]
    fn test_render_includes_recorded_metrics() {
        record_tx_signed("appendStateBatch");
        record_request_error(ErrorCategory::ChainRejection);

        let text = render().unwrap();
        assert!(text.contains("ovm_submitter_transactions_signed_total"));
        assert!(text.contains("command=\"appendStateBatch\""));
        assert!(text.contains("ovm_submitter_request_errors_total"));
    }
}
