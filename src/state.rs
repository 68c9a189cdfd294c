//! Application state shared across requests and background tasks.

use std::sync::Arc;

use crate::cache::SnapshotCache;
use crate::collector::Collector;
use crate::config::Config;
use crate::health_stats::HealthStats;
use crate::system::SystemCpuSampler;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Everything the HTTP handlers and the background refresh task need. Lives
/// for the whole monitoring session; no ambient globals.
pub struct AppState {
    pub cache: SnapshotCache,
    pub collector: Collector,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    pub cpu_sampler: Arc<SystemCpuSampler>,
}
