//! Prometheus Metrics
//!
//! Counters for the ingestion cycle:
//!
//! - `inflow_rows_committed_total`: batches acknowledged by the remote store
//! - `inflow_source_errors_total`: failed source fetches
//! - `inflow_pipeline_restarts_total`: supervisor restarts

use std::sync::OnceLock;

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus metrics recorder. Idempotent.
///
/// # Panics
///
/// Panics if another metrics recorder is already installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

fn register_metrics() {
    describe_counter!(
        "inflow_rows_committed_total",
        "Total row batches acknowledged by the remote store"
    );
    describe_counter!(
        "inflow_source_errors_total",
        "Total failed fetches from the source collaborator"
    );
    describe_counter!(
        "inflow_pipeline_restarts_total",
        "Total pipeline restarts performed by the supervisor"
    );
}
