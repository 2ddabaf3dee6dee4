//! Tunables for the background prober and the flow executor.

use std::time::Duration;

/// Liveness prober cadence and bounds.
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Delay between the start of two probe cycles.
    pub interval: Duration,
    /// Upper bound for a single reachability check.
    pub timeout: Duration,
    /// Maximum number of checks in flight at once.
    pub max_in_flight: usize,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
            max_in_flight: 16,
        }
    }
}

/// Flow executor bounds.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound for a single step call, whatever the task type.
    pub step_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub prober: ProberConfig,
    pub executor: ExecutorConfig,
}
