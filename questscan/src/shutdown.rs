//! Cooperative cancellation and the run state machine.
//!
//! A run moves through a fixed sequence of states:
//!
//! ```text
//! Idle -> Counting -> Scanning -> Draining -> Reporting -> Terminated
//! ```
//!
//! Every transition goes through [`ShutdownCoordinator::advance`], which only
//! accepts the single legal successor of the current state. An interrupted
//! run takes the same path as a complete one: the signal handler only sets
//! the [`CancellationToken`], the walker notices it and stops dispatching,
//! and the scanner carries on through Draining and Reporting as usual. That
//! way a report is produced exactly once, after every in-flight task has
//! finished.
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::errors::{ScanError, ScanResult};

/// Process-wide, monotonic cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Default::default()
    }

    /// Requests cancellation. Once set the flag is never cleared.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Lifecycle of one scan run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Counting,
    Scanning,
    Draining,
    Reporting,
    Terminated,
}

impl RunState {
    /// The only state this one may move to
    pub fn successor(self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::Counting),
            RunState::Counting => Some(RunState::Scanning),
            RunState::Scanning => Some(RunState::Draining),
            RunState::Draining => Some(RunState::Reporting),
            RunState::Reporting => Some(RunState::Terminated),
            RunState::Terminated => None,
        }
    }
}

/// Owns the cancellation token and sequences the run states
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    state: Mutex<RunState>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Builds a coordinator around an existing token, for embedders that
    /// cancel from somewhere other than an OS signal
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Requests a graceful stop
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `next`, which must be the successor of the current state
    pub fn advance(&self, next: RunState) -> ScanResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.successor() != Some(next) {
            return Err(ScanError::invalid_transition(*state, next));
        }
        debug!("Run state {:?} -> {:?}", *state, next);
        *state = next;
        Ok(())
    }

    /// Routes SIGINT/SIGTERM/SIGHUP to the cancellation token.
    ///
    /// The handler never exits the process; the scan drains and reports on
    /// the main thread. Can only be installed once per process.
    pub fn install_signal_handler(&self) -> ScanResult<()> {
        let token = self.token.clone();
        ctrlc::set_handler(move || {
            if !token.is_cancelled() {
                warn!("Interrupt received, finishing in-flight samples before reporting");
            }
            token.cancel();
        })
        .map_err(|e| ScanError::signal_handler(e.to_string()))
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
