//! Log subscriber and Prometheus exporter installation.

use std::net::SocketAddr;

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Counter of completed operations, labelled by resource, operation and status.
pub const OPERATIONS_TOTAL: &str = "restkit_operations_total";

/// Histogram of operation latency, labelled by resource and operation.
pub const OPERATION_DURATION_SECONDS: &str = "restkit_operation_duration_seconds";

const DEFAULT_FILTER: &str = "info,restkit_server=debug,tower_http=info";

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default filter.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}

/// Registers metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(OPERATIONS_TOTAL, "Operations completed, by resource, operation and status");
    describe_histogram!(
        OPERATION_DURATION_SECONDS,
        "Time from the first pipeline stage to the rendered response"
    );
}

/// Installs the Prometheus recorder with a scrape listener on `addr`.
///
/// # Errors
///
/// Fails when the bucket configuration is rejected or a recorder is
/// already installed.
pub fn install_prometheus(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )?
        .install()?;
    describe_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
