//! Executor module initialization.
//!
//! ```text
//! (incident queue) --> ExecutorPipeline --> ack / nack(requeue)
//!                             \--> (dead-letter queue)
//! ```

use std::sync::Arc;

use anyhow::Result;

use remedy_core::config::RemedyConfig;
use remedy_core::queue::MemoryBroker;
use remedy_executor::{ExecutorPipelineBuilder, ExecutorSettings};

use super::ModuleHandle;

/// Initialize the executor module.
///
/// Returns `None` if the executor is disabled in configuration.
pub fn init(config: &RemedyConfig, broker: &MemoryBroker) -> Result<Option<ModuleHandle>> {
    if !config.executor.enabled {
        tracing::info!("executor disabled in configuration");
        return Ok(None);
    }

    tracing::info!(
        remediations_dir = %config.executor.remediations_dir,
        stage_timeout_secs = config.executor.stage_timeout_secs,
        "initializing executor"
    );

    let executor = ExecutorPipelineBuilder::new()
        .settings(ExecutorSettings::from_core(config))
        .broker(config.broker.clone())
        .transports(Arc::new(broker.channel()), Arc::new(broker.channel()))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build executor: {}", e))?;

    Ok(Some(ModuleHandle::new("executor", true, Box::new(executor))))
}
