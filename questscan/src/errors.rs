//! Error types for questscan.
//!
//! Two families live here. [`ScanError`] covers conditions that end a run
//! before it starts or break the run sequence itself: bad configuration, a
//! missing input path, an illegal state transition, a worker thread that
//! could not be spawned. [`ExtractError`] covers everything that can go wrong
//! with a single sample; those are always recovered by the scanner, the file
//! simply contributes nothing to the tables.
//!
//! ```rust,ignore
//! match extractor.extract(path) {
//!     Ok(regions) => // hash and record,
//!     Err(ExtractError::NotApplicable { .. }) => // not a thin Mach-O, skip,
//!     Err(e) => // truncated or unreadable, skip,
//! }
//! ```
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::shutdown::RunState;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that abort a scan run
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("No input given: please set a file or folder to analyse")]
    MissingInput,
    #[error("Invalid run state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: RunState, to: RunState },
    #[error("Failed to install signal handler: {0}")]
    SignalHandler(String),
    #[error("Failed to spawn worker {index}: {source}")]
    WorkerSpawn {
        index: usize,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl ScanError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_transition(from: RunState, to: RunState) -> Self {
        Self::InvalidTransition { from, to }
    }

    pub fn signal_handler(msg: impl Into<String>) -> Self {
        Self::SignalHandler(msg.into())
    }

    pub fn worker_spawn(index: usize, source: std::io::Error) -> Self {
        Self::WorkerSpawn { index, source }
    }
}

/// Reasons a single sample yields no regions.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Not a thin Mach-O binary: {path}: {reason}")]
    NotApplicable { path: PathBuf, reason: String },
    #[error("Section {section} runs past end of file: {path}")]
    Truncated { path: PathBuf, section: String },
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ExtractError {
    pub fn not_applicable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::NotApplicable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn truncated(path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        Self::Truncated {
            path: path.into(),
            section: section.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The sample the error refers to
    pub fn path(&self) -> &Path {
        match self {
            Self::NotApplicable { path, .. } | Self::Truncated { path, .. } | Self::Io { path, .. } => {
                path
            }
        }
    }
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}
