//! Prometheus scrape endpoint for the remediation pipeline.
//!
//! Counters and gauges use the exporter defaults. The per-stage execution
//! time histogram (`remedy_executor_stage_duration_seconds`) gets explicit
//! buckets from [`STAGE_DURATION_BUCKETS`](m::STAGE_DURATION_BUCKETS),
//! spanning quick audits up to the default stage deadline.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use remedy_core::config::MetricsConfig;
use remedy_core::metrics as m;

/// The exporter's HTTP listener answers on this path only.
const SCRAPE_PATH: &str = "/metrics";

/// Install the global recorder and serve `[metrics]` on its listen address.
///
/// Must run before the pipelines start so their first stage timings and
/// delivery counters are not dropped by the no-op recorder.
///
/// # Errors
///
/// - `endpoint` other than `/metrics`, or an unparsable listen address
/// - Socket binding fails
/// - A global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = scrape_address(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::EXECUTOR_STAGE_DURATION_SECONDS.to_owned()),
            &m::STAGE_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid stage duration buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();

    tracing::info!(
        listen_addr = %addr,
        path = SCRAPE_PATH,
        stage_buckets = m::STAGE_DURATION_BUCKETS.len(),
        "Prometheus metrics endpoint active"
    );
    Ok(())
}

/// Socket address for the scrape listener.
fn scrape_address(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != SCRAPE_PATH {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '{}' is served",
            config.endpoint,
            SCRAPE_PATH
        ));
    }

    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(listen_addr: &str, port: u16, endpoint: &str) -> MetricsConfig {
        MetricsConfig {
            enabled: true,
            listen_addr: listen_addr.to_owned(),
            port,
            endpoint: endpoint.to_owned(),
        }
    }

    #[test]
    fn scrape_address_joins_host_and_port() {
        let addr = scrape_address(&config("127.0.0.1", 9100, "/metrics")).unwrap();
        assert_eq!(addr, "127.0.0.1:9100".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn scrape_address_rejects_hostnames() {
        assert!(scrape_address(&config("localhost", 9100, "/metrics")).is_err());
    }

    #[test]
    fn scrape_address_rejects_other_paths() {
        let err = scrape_address(&config("127.0.0.1", 9100, "/stats")).unwrap_err();
        assert!(err.to_string().contains("/stats"), "got: {err}");
    }
}
