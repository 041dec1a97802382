//! The concurrent scanning pipeline.
//!
//! ```text
//!  Walker ──(bounded(0) queue)──> WorkerPool ──> Aggregator ──> ScanReport
//!    │                              │
//!    └──────── CancellationToken ───┘
//! ```
//!
//! The [`walker`] is the single producer. It counts the candidates once for
//! progress reporting, then walks again and hands every candidate either to
//! the calling thread (one job) or to the [`pool`] through a rendezvous
//! channel, so the walker only runs ahead of the workers by the handoff
//! itself. The walker owns the only `Sender`; dropping it when the walk ends
//! or is cancelled is what closes the queue, and the workers, which only
//! ever see a `Receiver`, exit once it is closed and empty.
//!
//! Both dispatch modes funnel through [`worker::ScanContext::process`], so a
//! run with one job and a run with many produce the same tables.
pub mod engine;
pub mod pool;
pub mod walker;
pub mod worker;

pub use engine::{scan, scan_path, Scanner};
pub use pool::WorkerPool;
pub use walker::{Dispatch, Walker};
pub use worker::{ScanContext, TaskOutcome};

use std::path::{Path, PathBuf};

/// One candidate sample, claimed by exactly one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTask {
    path: PathBuf,
}

impl ScanTask {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
