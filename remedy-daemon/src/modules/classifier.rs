//! Classifier module initialization.
//!
//! ```text
//! (log queue) --> ClassifierPipeline --Incident--> (incident queue)
//! ```
//!
//! The classifier consumes and publishes on separate broker channels.

use std::sync::Arc;

use anyhow::Result;

use remedy_classifier::{ClassifierPipelineBuilder, ClassifierSettings};
use remedy_core::config::RemedyConfig;
use remedy_core::queue::MemoryBroker;

use super::ModuleHandle;

/// Initialize the classifier module.
///
/// Returns `None` if the classifier is disabled in configuration.
/// Rules are read when the module starts, not here.
pub fn init(config: &RemedyConfig, broker: &MemoryBroker) -> Result<Option<ModuleHandle>> {
    if !config.classifier.enabled {
        tracing::info!("classifier disabled in configuration");
        return Ok(None);
    }

    tracing::info!(
        rules_file = %config.classifier.rules_file,
        workers = config.classifier.worker_count,
        "initializing classifier"
    );

    let classifier = ClassifierPipelineBuilder::new()
        .settings(ClassifierSettings::from_core(config))
        .broker(config.broker.clone())
        .transports(Arc::new(broker.channel()), Arc::new(broker.channel()))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build classifier: {}", e))?;

    Ok(Some(ModuleHandle::new("classifier", true, Box::new(classifier))))
}
