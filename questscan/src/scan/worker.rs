use std::sync::Arc;
use tracing::{debug, trace};

use super::ScanTask;
use crate::digest::Digest;
use crate::extract::{RegionExtractor, RegionKind};
use crate::metrics::ScanMetrics;
use crate::progress::ScanProgress;
use crate::results::Aggregator;
use crate::shutdown::CancellationToken;

/// What happened to a claimed task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Extraction succeeded and this many regions were recorded
    Recorded(usize),
    /// Not a usable binary; nothing recorded
    NotApplicable,
    /// Claimed after cancellation; not processed
    Abandoned,
}

/// Everything a worker needs to process a task, shared by all workers
pub struct ScanContext {
    extractor: Arc<dyn RegionExtractor>,
    aggregator: Arc<Aggregator>,
    metrics: ScanMetrics,
    progress: Arc<ScanProgress>,
    token: CancellationToken,
}

impl ScanContext {
    pub fn new(
        extractor: Arc<dyn RegionExtractor>,
        aggregator: Arc<Aggregator>,
        metrics: ScanMetrics,
        progress: Arc<ScanProgress>,
        token: CancellationToken,
    ) -> Self {
        Self {
            extractor,
            aggregator,
            metrics,
            progress,
            token,
        }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Extracts, hashes and records one sample.
    ///
    /// A task claimed after cancellation is dropped untouched. Otherwise the
    /// task always runs to completion, and all of its digests are recorded
    /// together so a report never holds part of a file.
    pub fn process(&self, task: &ScanTask) -> TaskOutcome {
        if self.token.is_cancelled() {
            trace!("Abandoning {} after cancellation", task.path().display());
            self.metrics.record_abandoned();
            return TaskOutcome::Abandoned;
        }

        trace!("Processing sample: {}", task.path().display());
        let outcome = match self.extractor.extract(task.path()) {
            Ok(regions) => {
                let digests: Vec<(RegionKind, Digest)> = regions
                    .iter()
                    .map(|(kind, bytes)| (kind, Digest::of(bytes)))
                    .collect();
                self.aggregator.record(&digests);
                self.metrics.record_processed(digests.len() as u64);
                TaskOutcome::Recorded(digests.len())
            }
            Err(e) => {
                debug!("Skipping sample: {}", e);
                self.metrics.record_not_applicable();
                TaskOutcome::NotApplicable
            }
        };

        self.progress.advance();
        outcome
    }
}
