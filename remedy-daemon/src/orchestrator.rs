//! Module orchestration -- assembly, queue wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `remedy-daemon`.
//! It owns the in-process broker, builds enabled modules, manages
//! startup/shutdown ordering, and runs the main event loop.
//!
//! # Startup Order (producers before consumers)
//!
//! 1. Tailers (publish raw lines to the log queue)
//! 2. Classifier (consumes raw lines, publishes Incidents)
//! 3. Executor (consumes Incidents, runs remediation scripts)
//!
//! # Shutdown Order (reverse of startup)
//!
//! 1. Executor (cancel the in-flight stage, requeue its incident)
//! 2. Classifier (drain workers, flush the publisher)
//! 3. Tailers (stop reading sources)

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use remedy_core::config::RemedyConfig;
use remedy_core::queue::MemoryBroker;

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::metrics_server;
use crate::modules::{self, ModuleRegistry};
use crate::pid_file::PidFile;

/// Interval between periodic health evaluations in the main loop.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: RemedyConfig,
    /// Broker shared by every module's channels.
    broker: MemoryBroker,
    /// Registered modules (ordered for start/stop).
    modules: ModuleRegistry,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Any enabled module fails to initialize
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = RemedyConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: RemedyConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before module initialization
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let broker = MemoryBroker::new();
        let (shutdown_tx, _) = broadcast::channel(16);

        let mut registry = ModuleRegistry::new();
        for init in [modules::tailers::init, modules::classifier::init, modules::executor::init] {
            if let Some(handle) = init(&config, &broker)? {
                registry.register(handle);
            }
        }

        if registry.count() == 0 {
            tracing::warn!("no modules enabled; the daemon will idle until shutdown");
        }

        tracing::info!(
            modules = ?registry.names(),
            total_modules = registry.count(),
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            record_daemon_metrics(registry.count());
        }

        Ok(Self {
            config,
            broker,
            modules: registry,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start all enabled modules.
    ///
    /// On failure, modules that already started are stopped again before
    /// the error is returned.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("starting all modules");
        if let Err(e) = self.modules.start_all().await {
            tracing::warn!("startup failed, rolling back already-started modules");
            if let Err(stop_err) = self.modules.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Start all enabled modules and run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        let signal = wait_for_shutdown_signal()?;
        self.run_until(signal).await
    }

    /// Start all enabled modules and run until `shutdown` resolves.
    ///
    /// The future's output names the trigger for logging. The PID file, if
    /// configured, exists from before startup until after the last module
    /// has stopped.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = &'static str>,
    {
        let _pid_file = if self.config.general.pid_file.is_empty() {
            None
        } else {
            Some(PidFile::create(&self.config.general.pid_file)?)
        };

        self.start().await?;

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!("entering main event loop");
        tokio::pin!(shutdown);
        let mut health_tick = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // first tick completes immediately
        health_tick.tick().await;

        let trigger = loop {
            tokio::select! {
                trigger = &mut shutdown => break trigger,
                _ = health_tick.tick() => {
                    let health = self.health().await;
                    if !health.status.is_healthy() {
                        tracing::warn!(status = ?health.status, "daemon health degraded");
                    } else {
                        tracing::debug!(uptime_secs = health.uptime_secs, "daemon healthy");
                    }
                }
            }
        };
        tracing::info!(signal = trigger, "shutdown signal received");

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        self.shutdown().await
    }

    /// Stop all modules (consumers first, producers last).
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all modules");
        self.modules.stop_all().await
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules: Vec<ModuleHealth> = self
            .modules
            .health_statuses()
            .await
            .into_iter()
            .map(|(name, enabled, status)| ModuleHealth {
                name,
                enabled,
                status,
            })
            .collect();

        let status = aggregate_status(&modules);
        let uptime_secs = self.start_time.elapsed().as_secs();

        DaemonHealth {
            status,
            uptime_secs,
            modules,
        }
    }

    /// Loaded configuration.
    pub fn config(&self) -> &RemedyConfig {
        &self.config
    }

    /// Broker shared by all modules.
    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    /// Number of registered (enabled) modules.
    pub fn module_count(&self) -> usize {
        self.modules.count()
    }

    /// Registered module names in start order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.names()
    }
}

/// Install SIGTERM/SIGINT handlers and return a future that resolves
/// with the name of the first signal received.
///
/// Handlers are installed eagerly so a signal arriving during startup is
/// not lost.
fn wait_for_shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Record daemon-level metrics (build info, modules registered).
fn record_daemon_metrics(module_count: usize) {
    use remedy_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_MODULES_REGISTERED).set(module_count as f64);

    tracing::debug!(
        module_count = module_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

/// Spawn a background task that periodically updates the uptime gauge.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use remedy_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uptime_updater_stops_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = spawn_uptime_updater(Instant::now(), shutdown_rx);

        let _ = shutdown_tx.send(());

        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok(), "uptime updater should exit after shutdown");
    }
}
