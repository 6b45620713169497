//! Module registry.
//!
//! Each pipeline crate is wrapped in a [`ModuleHandle`] and driven through
//! [`DynPipeline`]. The registry starts modules in registration order and
//! stops the ones that actually started in reverse order, so the same
//! `stop_all` call serves both shutdown and rollback of a partial start.

pub mod classifier;
pub mod executor;
pub mod tailers;

use remedy_core::pipeline::{DynPipeline, HealthStatus};

/// One registered pipeline.
pub struct ModuleHandle {
    pub name: String,
    pub enabled: bool,
    pub pipeline: Box<dyn DynPipeline>,
    running: bool,
}

impl ModuleHandle {
    pub fn new(name: impl Into<String>, enabled: bool, pipeline: Box<dyn DynPipeline>) -> Self {
        Self {
            name: name.into(),
            enabled,
            pipeline,
            running: false,
        }
    }

    /// Whether `start` succeeded and `stop` has not been called since.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Disabled modules report `Healthy`; they are not expected to run.
    pub async fn health_check(&self) -> HealthStatus {
        if !self.enabled {
            return HealthStatus::Healthy;
        }
        self.pipeline.health_check().await
    }
}

/// Ordered set of modules, producers first.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<ModuleHandle>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module. Register producers before their consumers.
    pub fn register(&mut self, handle: ModuleHandle) {
        self.modules.push(handle);
    }

    /// Start enabled modules in registration order, stopping at the first
    /// failure. Modules started before the failure keep running until
    /// [`stop_all`](Self::stop_all).
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        for handle in self.modules.iter_mut().filter(|m| m.enabled && !m.running) {
            tracing::info!(module = %handle.name, "starting module");
            if let Err(e) = handle.pipeline.start().await {
                return Err(anyhow::anyhow!(
                    "failed to start module '{}': {}",
                    handle.name,
                    e
                ));
            }
            handle.running = true;
            tracing::info!(module = %handle.name, "module started");
        }
        Ok(())
    }

    /// Stop running modules in reverse order.
    ///
    /// Every module is attempted; failures are collected into one error.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut failures = Vec::new();

        for handle in self.modules.iter_mut().rev().filter(|m| m.running) {
            tracing::info!(module = %handle.name, "stopping module");
            handle.running = false;
            match handle.pipeline.stop().await {
                Ok(()) => tracing::info!(module = %handle.name, "module stopped"),
                Err(e) => {
                    tracing::error!(module = %handle.name, error = %e, "failed to stop module");
                    failures.push(format!("{}: {}", handle.name, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "errors stopping modules: {}",
                failures.join("; ")
            ))
        }
    }

    /// `(name, enabled, status)` for every module, in registration order.
    pub async fn health_statuses(&self) -> Vec<(String, bool, HealthStatus)> {
        let mut statuses = Vec::with_capacity(self.modules.len());
        for handle in &self.modules {
            statuses.push((handle.name.clone(), handle.enabled, handle.health_check().await));
        }
        statuses
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn count(&self) -> usize {
        self.modules.len()
    }

    pub fn enabled_count(&self) -> usize {
        self.modules.iter().filter(|m| m.enabled).count()
    }

    pub fn running_count(&self) -> usize {
        self.modules.iter().filter(|m| m.running).count()
    }
}
