//! Daemon-wide health view.
//!
//! Folds per-module [`HealthStatus`] values into one status: the worst
//! status among enabled modules wins, and the reason lists every module
//! that is not healthy as `name: reason`, joined with `; `.

use remedy_core::pipeline::HealthStatus;

/// Health of the whole daemon at one point in time.
#[derive(Debug, Clone)]
pub struct DaemonHealth {
    /// Worst status among enabled modules.
    pub status: HealthStatus,
    /// Seconds since the orchestrator was built.
    pub uptime_secs: u64,
    /// One entry per registered module, in start order.
    pub modules: Vec<ModuleHealth>,
}

/// Health of one registered module.
#[derive(Debug, Clone)]
pub struct ModuleHealth {
    /// Registry name ("tailers", "classifier", "executor").
    pub name: String,
    /// Disabled modules never affect the aggregate.
    pub enabled: bool,
    pub status: HealthStatus,
}

impl ModuleHealth {
    fn severity(&self) -> u8 {
        match (&self.status, self.enabled) {
            (_, false) | (HealthStatus::Healthy, true) => 0,
            (HealthStatus::Degraded(_), true) => 1,
            (HealthStatus::Unhealthy(_), true) => 2,
        }
    }

    fn reason(&self) -> Option<String> {
        match &self.status {
            HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) if self.enabled => {
                Some(format!("{}: {}", self.name, reason))
            }
            _ => None,
        }
    }
}

/// Aggregate module statuses into a single daemon status.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let worst = modules.iter().map(ModuleHealth::severity).max().unwrap_or(0);
    let reasons = || {
        modules
            .iter()
            .filter_map(ModuleHealth::reason)
            .collect::<Vec<_>>()
            .join("; ")
    };

    match worst {
        0 => HealthStatus::Healthy,
        1 => HealthStatus::Degraded(reasons()),
        _ => HealthStatus::Unhealthy(reasons()),
    }
}
