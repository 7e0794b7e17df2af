//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Transaction submission outcomes
//! - Confirmation latency
//! - Intake connection churn

use crate::error::{ErrorClass, OperatorResult};

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "vault_operator_transactions_submitted_total",
        "Total contract calls handed to the executor",
        &["function"]
    ).unwrap();

    pub static ref TX_CONFIRMED: CounterVec = register_counter_vec!(
        "vault_operator_transactions_confirmed_total",
        "Total contract calls confirmed on chain",
        &["function"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "vault_operator_transactions_failed_total",
        "Total contract calls that ended in a terminal failure",
        &["function", "reason"]
    ).unwrap();

    pub static ref TX_CONFIRM_LATENCY: HistogramVec = register_histogram_vec!(
        "vault_operator_transaction_confirm_latency_seconds",
        "Time from submission to terminal outcome",
        &["function"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    // Intake metrics
    pub static ref INTAKE_RECONNECTS: CounterVec = register_counter_vec!(
        "vault_operator_intake_reconnects_total",
        "Intake reconnect attempts by error class",
        &["class"]
    ).unwrap();

    pub static ref INTAKE_GIVE_UPS: CounterVec = register_counter_vec!(
        "vault_operator_intake_give_ups_total",
        "Times the intake loop exhausted its retry budget",
        &[]
    ).unwrap();

    pub static ref INTAKE_UP: Gauge = register_gauge!(
        "vault_operator_intake_up",
        "Intake loop status (1=running, 0=stopped)"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> OperatorResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::error::OperatorError::Config(e.to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::OperatorError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_tx_submitted(function: &str) {
    TX_SUBMITTED.with_label_values(&[function]).inc();
}

pub fn record_tx_confirmed(function: &str, latency_secs: f64) {
    TX_CONFIRMED.with_label_values(&[function]).inc();
    TX_CONFIRM_LATENCY
        .with_label_values(&[function])
        .observe(latency_secs);
}

pub fn record_tx_failed(function: &str, reason: &str, latency_secs: f64) {
    TX_FAILED.with_label_values(&[function, reason]).inc();
    TX_CONFIRM_LATENCY
        .with_label_values(&[function])
        .observe(latency_secs);
}

pub fn record_intake_reconnect(class: ErrorClass) {
    INTAKE_RECONNECTS
        .with_label_values(&[class.as_str()])
        .inc();
}

pub fn record_intake_give_up() {
    INTAKE_GIVE_UPS.with_label_values(&[]).inc();
}

pub fn set_intake_up(up: bool) {
    INTAKE_UP.set(if up { 1.0 } else { 0.0 });
}
