use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::pool::WorkerPool;
use super::walker::{Dispatch, Walker};
use super::worker::ScanContext;
use crate::config::ScanConfig;
use crate::errors::{ScanError, ScanResult};
use crate::extract::{MachOExtractor, RegionExtractor};
use crate::filters::SAMPLE_FILE_SIZE;
use crate::metrics::ScanMetrics;
use crate::progress::ScanProgress;
use crate::results::{Aggregator, ScanReport};
use crate::shutdown::{RunState, ShutdownCoordinator};

/// Runs one scan from counting to report
pub struct Scanner {
    config: ScanConfig,
    extractor: Arc<dyn RegionExtractor>,
    candidate_size: u64,
    progress: Arc<ScanProgress>,
}

impl Scanner {
    /// Scanner for thin Mach-O samples of the fingerprint size
    pub fn new(config: ScanConfig) -> Self {
        let progress = Arc::new(ScanProgress::new(config.show_progress));
        Self {
            config,
            extractor: Arc::new(MachOExtractor::new()),
            candidate_size: SAMPLE_FILE_SIZE,
            progress,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn RegionExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Overrides the exact size a file must have to be scanned
    pub fn with_candidate_size(mut self, candidate_size: u64) -> Self {
        self.candidate_size = candidate_size;
        self
    }

    /// Drives the run through every state and hands the report to `sink`
    /// exactly once.
    ///
    /// Cancellation through the coordinator stops dispatch but not the run:
    /// in-flight samples finish, the partial report is still produced and
    /// marked `interrupted`. The state ends at `Terminated` even when the
    /// sink fails; its error is returned afterwards.
    pub fn run<F>(&self, coordinator: &ShutdownCoordinator, sink: F) -> ScanResult<ScanReport>
    where
        F: FnOnce(&ScanReport) -> ScanResult<()>,
    {
        let root = self
            .config
            .root_path
            .as_deref()
            .ok_or(ScanError::MissingInput)?;
        let start = Instant::now();
        let token = coordinator.token();
        let jobs = self.config.jobs.get();

        let metrics = ScanMetrics::new();
        let walker = Walker::new(root, self.candidate_size, self.config.ignore_patterns.clone())
            .with_metrics(metrics.clone());
        info!("Scanning {} with {} job(s)", walker.root().display(), jobs);

        coordinator.advance(RunState::Counting)?;
        let total = walker.count_candidates(&token);
        metrics.record_candidates(total);
        self.progress.set_total(total);
        info!("Found {} candidate samples", total);

        coordinator.advance(RunState::Scanning)?;
        let aggregator = Arc::new(Aggregator::new());
        let ctx = Arc::new(ScanContext::new(
            Arc::clone(&self.extractor),
            Arc::clone(&aggregator),
            metrics.clone(),
            Arc::clone(&self.progress),
            token.clone(),
        ));

        let pool = if jobs > 1 {
            let (pool, sender) = WorkerPool::start(jobs, Arc::clone(&ctx))?;
            walker.dispatch(&token, Dispatch::Queue(sender));
            Some(pool)
        } else {
            walker.dispatch(&token, Dispatch::Inline(&ctx));
            None
        };

        coordinator.advance(RunState::Draining)?;
        if let Some(pool) = pool {
            let panicked = pool.wait();
            if panicked > 0 {
                warn!("{} worker(s) panicked, their samples are missing", panicked);
            }
        }
        self.progress.finish();

        coordinator.advance(RunState::Reporting)?;
        let elapsed = start.elapsed();
        metrics.log_stats(elapsed);
        let interrupted = token.is_cancelled();
        if interrupted {
            info!("Scan interrupted, reporting partial results");
        }
        let report = aggregator.finalize(metrics.get_stats(elapsed), interrupted);
        let delivered = sink(&report);

        coordinator.advance(RunState::Terminated)?;
        debug!("Scan finished in {:?}", elapsed);
        delivered?;
        Ok(report)
    }
}

/// Scans `config.root_path` with a fresh coordinator and no report sink
pub fn scan(config: &ScanConfig) -> ScanResult<ScanReport> {
    let scanner = Scanner::new(config.clone());
    scanner.run(&ShutdownCoordinator::new(), |_| Ok(()))
}

/// Scans a single path with default settings and no progress bar
pub fn scan_path(root: &Path) -> ScanResult<ScanReport> {
    let config = ScanConfig {
        root_path: Some(root.to_path_buf()),
        show_progress: false,
        ..Default::default()
    };
    scan(&config)
}
