use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace};

use super::worker::{ScanContext, TaskOutcome};
use super::ScanTask;
use crate::errors::{ScanError, ScanResult};

/// Fixed set of worker threads consuming the rendezvous queue
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` threads and returns the pool together with the only
    /// sender of the queue.
    ///
    /// The queue has zero capacity, so each `send` blocks until a worker
    /// takes the task. If any thread fails to spawn the ones already running
    /// are shut down before the error is returned.
    pub fn start(workers: usize, ctx: Arc<ScanContext>) -> ScanResult<(Self, Sender<ScanTask>)> {
        let (sender, receiver) = bounded::<ScanTask>(0);
        let mut pool = Self {
            handles: Vec::with_capacity(workers),
        };

        for index in 0..workers {
            let receiver = receiver.clone();
            let ctx = Arc::clone(&ctx);
            let spawned = thread::Builder::new()
                .name(format!("questscan-worker-{}", index))
                .spawn(move || worker_loop(index, receiver, ctx));

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    error!("Failed to spawn worker {}: {}", index, e);
                    drop(sender);
                    pool.wait();
                    return Err(ScanError::worker_spawn(index, e));
                }
            }
        }

        debug!("Started {} workers", workers);
        Ok((pool, sender))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Blocks until every worker has exited. Workers exit once the sender is
    /// gone and the queue is empty, so the sender must be dropped first.
    ///
    /// Returns the number of workers that panicked.
    pub fn wait(mut self) -> usize {
        self.join_all()
    }

    fn join_all(&mut self) -> usize {
        let mut panicked = 0;
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!("{} panicked", name);
                panicked += 1;
            }
        }
        panicked
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join_all();
    }
}

fn worker_loop(index: usize, receiver: Receiver<ScanTask>, ctx: Arc<ScanContext>) {
    let mut handled = 0usize;
    for task in receiver.iter() {
        match ctx.process(&task) {
            TaskOutcome::Abandoned => {}
            _ => handled += 1,
        }
    }
    trace!("Worker {} exiting after {} samples", index, handled);
}
