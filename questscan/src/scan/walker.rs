use crossbeam_channel::Sender;
use ignore::{DirEntry, WalkBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

use super::worker::ScanContext;
use super::ScanTask;
use crate::errors::unify_path;
use crate::filters::{is_candidate, should_ignore};
use crate::metrics::ScanMetrics;
use crate::shutdown::CancellationToken;

/// Where the walker sends candidates
pub enum Dispatch<'a> {
    /// Process each candidate on the walking thread
    Inline(&'a ScanContext),
    /// Hand each candidate to the worker pool. The sender is dropped when
    /// the walk ends, which closes the queue.
    Queue(Sender<ScanTask>),
}

/// Single producer that enumerates the tree and filters candidates
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    candidate_size: u64,
    ignore_patterns: Vec<String>,
    metrics: ScanMetrics,
}

impl Walker {
    pub fn new(root: &Path, candidate_size: u64, ignore_patterns: Vec<String>) -> Self {
        Self {
            root: unify_path(root),
            candidate_size,
            ignore_patterns,
            metrics: ScanMetrics::new(),
        }
    }

    /// Reports walk errors into the given metrics
    pub fn with_metrics(mut self, metrics: ScanMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_candidate_entry(&self, entry: &DirEntry) -> bool {
        let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
        if !is_file {
            return false;
        }

        let len = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                debug!("Cannot stat {}: {}", entry.path().display(), e);
                return false;
            }
        };

        is_candidate(is_file, len, self.candidate_size) && !self.is_ignored(entry.path())
    }

    /// Patterns match either the full path or the path below the root
    fn is_ignored(&self, path: &Path) -> bool {
        should_ignore(path, &self.ignore_patterns)
            || path
                .strip_prefix(&self.root)
                .is_ok_and(|relative| should_ignore(relative, &self.ignore_patterns))
    }

    /// Lazily yields candidates in file-name order, stopping as soon as the
    /// token is cancelled. Unreadable entries are skipped.
    fn candidates<'a>(
        &'a self,
        token: &'a CancellationToken,
        record_errors: bool,
    ) -> impl Iterator<Item = ScanTask> + 'a {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        builder
            .build()
            .take_while(move |_| !token.is_cancelled())
            .filter_map(move |entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    if record_errors {
                        self.metrics.record_walk_error();
                    }
                    None
                }
            })
            .filter(move |entry| self.is_candidate_entry(entry))
            .map(|entry| ScanTask::new(entry.into_path()))
    }

    /// Counting pass: number of candidates under the root
    pub fn count_candidates(&self, token: &CancellationToken) -> u64 {
        let count = self.candidates(token, false).count() as u64;
        debug!("Counted {} candidates under {}", count, self.root.display());
        count
    }

    /// Dispatch pass: sends every candidate to `dispatch` and returns how
    /// many were handed over.
    ///
    /// Stops early, without error, when the token is cancelled. In queue
    /// mode the sender is consumed and dropped on return, so the queue is
    /// closed exactly once, by the producer.
    pub fn dispatch(&self, token: &CancellationToken, dispatch: Dispatch<'_>) -> u64 {
        let mut dispatched = 0u64;

        match dispatch {
            Dispatch::Inline(ctx) => {
                for task in self.candidates(token, true) {
                    ctx.process(&task);
                    dispatched += 1;
                }
            }
            Dispatch::Queue(sender) => {
                for task in self.candidates(token, true) {
                    trace!("Dispatching {}", task.path().display());
                    if sender.send(task).is_err() {
                        warn!("All workers have exited, stopping dispatch");
                        break;
                    }
                    dispatched += 1;
                }
                drop(sender);
            }
        }

        if token.is_cancelled() {
            info!("Walk stopped early after {} samples", dispatched);
        } else {
            debug!("Walk complete, {} samples dispatched", dispatched);
        }
        dispatched
    }
}
