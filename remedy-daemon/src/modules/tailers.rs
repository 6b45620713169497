//! Tailer module initialization.
//!
//! Builds the raw text producers (file, syslog UDP, syslog TCP) that feed
//! the log queue.
//!
//! ```text
//! syslog file / UDP / TCP --raw line--> (log queue)
//! ```

use std::sync::Arc;

use anyhow::Result;

use remedy_classifier::{TailerPipeline, TailerSettings};
use remedy_core::config::RemedyConfig;
use remedy_core::queue::MemoryBroker;

use super::ModuleHandle;

/// Initialize the tailer module.
///
/// Returns `None` if no source is enabled in configuration.
pub fn init(config: &RemedyConfig, broker: &MemoryBroker) -> Result<Option<ModuleHandle>> {
    let settings = TailerSettings::from_core(config);
    if !settings.any_enabled() {
        tracing::info!("all log sources disabled in configuration");
        return Ok(None);
    }

    tracing::info!(
        file = settings.file_enabled,
        udp = settings.udp_enabled,
        tcp = settings.tcp_enabled,
        "initializing tailers"
    );

    let tailers = TailerPipeline::new(settings, config.broker.clone(), Arc::new(broker.channel()))
        .map_err(|e| anyhow::anyhow!("failed to build tailers: {}", e))?;

    Ok(Some(ModuleHandle::new("tailers", true, Box::new(tailers))))
}
