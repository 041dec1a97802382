use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Tracks per-run counters, shared by the walker and every worker
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    candidates: Arc<AtomicU64>,
    files_processed: Arc<AtomicU64>,
    files_not_applicable: Arc<AtomicU64>,
    regions_recorded: Arc<AtomicU64>,
    tasks_abandoned: Arc<AtomicU64>,
    walk_errors: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            candidates: Arc::new(AtomicU64::new(0)),
            files_processed: Arc::new(AtomicU64::new(0)),
            files_not_applicable: Arc::new(AtomicU64::new(0)),
            regions_recorded: Arc::new(AtomicU64::new(0)),
            tasks_abandoned: Arc::new(AtomicU64::new(0)),
            walk_errors: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records the result of the counting pass
    pub fn record_candidates(&self, count: u64) {
        self.candidates.store(count, Ordering::Relaxed);
    }

    /// Records a file that went through extraction, with the number of
    /// regions it contributed
    pub fn record_processed(&self, regions: u64) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.regions_recorded.fetch_add(regions, Ordering::Relaxed);
    }

    /// Records a candidate the extractor could not use
    pub fn record_not_applicable(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.files_not_applicable.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a task that was claimed after cancellation and dropped
    pub fn record_abandoned(&self) {
        self.tasks_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_walk_error(&self) {
        self.walk_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets current statistics
    pub fn get_stats(&self, elapsed: Duration) -> ScanStats {
        ScanStats {
            candidates: self.candidates.load(Ordering::Relaxed),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_not_applicable: self.files_not_applicable.load(Ordering::Relaxed),
            regions_recorded: self.regions_recorded.load(Ordering::Relaxed),
            tasks_abandoned: self.tasks_abandoned.load(Ordering::Relaxed),
            walk_errors: self.walk_errors.load(Ordering::Relaxed),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Logs the run summary
    pub fn log_stats(&self, elapsed: Duration) {
        let stats = self.get_stats(elapsed);
        info!(
            "Scan stats:\n\
             Candidates: {}\n\
             Files processed: {} ({} not applicable)\n\
             Regions recorded: {}\n\
             Tasks abandoned: {}\n\
             Walk errors: {}\n\
             Elapsed: {}",
            stats.candidates,
            stats.files_processed,
            stats.files_not_applicable,
            stats.regions_recorded,
            stats.tasks_abandoned,
            stats.walk_errors,
            humantime::format_duration(Duration::from_millis(stats.elapsed_ms))
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub candidates: u64,
    pub files_processed: u64,
    pub files_not_applicable: u64,
    pub regions_recorded: u64,
    pub tasks_abandoned: u64,
    pub walk_errors: u64,
    pub elapsed_ms: u64,
}
