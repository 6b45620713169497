//! Tracing subscriber setup from the `[general]` section.
//!
//! `RUST_LOG`, when set, wins over `general.log_level`.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use remedy_core::config::GeneralConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output layer for `general.log_format` (`json` or `pretty`).
fn format_layer(format: &str) -> Result<BoxedLayer> {
    let layer = tracing_subscriber::fmt::layer().with_target(true);
    match format {
        "json" => Ok(layer.json().with_current_span(false).boxed()),
        "pretty" => Ok(layer.pretty().boxed()),
        other => Err(anyhow::anyhow!(
            "unknown log format '{}', expected 'json' or 'pretty'",
            other
        )),
    }
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. Call once, before the first event.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let output = format_layer(&config.log_format)?;

    tracing_subscriber::registry()
        .with(output.with_filter(level_filter(&config.log_level)))
        .try_init()
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to initialize {} tracing subscriber: {}",
                config.log_format,
                e
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..GeneralConfig::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn known_formats_build_layers() {
        assert!(format_layer("json").is_ok());
        assert!(format_layer("pretty").is_ok());
    }
}
