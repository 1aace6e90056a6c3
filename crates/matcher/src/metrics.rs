// Metrics hooks for the `matcher` crate.
//
// Callers install a global `SearchMetrics` implementation via [`set_search_metrics`],
// then `IndexBuilder` and `SearchEngine` report build and query latency plus
// result counts. This keeps instrumentation decoupled from any specific
// metrics backend.
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::OnceCell;

/// Metrics observer for build and search operations.
pub trait SearchMetrics: Send + Sync {
    /// Record a completed query. `top_k` is what the caller asked for,
    /// `hit_count` what was returned.
    fn record_search(&self, latency: Duration, top_k: usize, hit_count: usize);

    /// Record a completed index build.
    fn record_build(&self, latency: Duration, indexed: usize, failed: usize);
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn SearchMetrics>>> {
    static METRICS: OnceCell<RwLock<Option<Arc<dyn SearchMetrics>>>> = OnceCell::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn SearchMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Install or clear the global search metrics recorder.
///
/// This is typically called once during startup so every engine in the
/// process shares the same metrics backend.
pub fn set_search_metrics(recorder: Option<Arc<dyn SearchMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}
