//! The logic-thread work queue.
//!
//! The link thread never blocks: work that needs more than a state-machine
//! step is posted here as a value-only job and runs on a single worker
//! thread. Results come back the same way, posted by the worker onto
//! whatever queue the caller provided. No session reference ever crosses
//! the boundary.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::thread::JoinHandle;

/// A unit of work for the logic thread. Captures copies only.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Anything that accepts jobs for deferred execution.
pub trait LogicQueue {
    /// Post a job. Returns false if the worker is gone.
    fn queue_job(&self, job: Job) -> bool;
}

/// Cloneable posting handle to a [`LogicThread`].
#[derive(Clone)]
pub struct LogicHandle {
    tx: Sender<Job>,
}

impl LogicQueue for LogicHandle {
    fn queue_job(&self, job: Job) -> bool {
        self.tx.send(job).is_ok()
    }
}

/// A one-worker job queue, the logic side of the two-thread split.
pub struct LogicThread {
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl LogicThread {
    /// Spawn the worker.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, rx): (Sender<Job>, Receiver<Job>) = unbounded();
        let worker = std::thread::Builder::new()
            .name("veil-logic".into())
            .spawn(move || {
                for job in rx.iter() {
                    job();
                }
            })
            .ok();
        Self {
            tx: Some(tx),
            worker,
        }
    }

    /// A posting handle that outlives borrows of the thread itself.
    #[must_use]
    pub fn handle(&self) -> Option<LogicHandle> {
        self.tx.as_ref().map(|tx| LogicHandle { tx: tx.clone() })
    }

    /// Stop accepting jobs, finish the queue, and join the worker.
    pub fn stop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("logic worker panicked");
            }
        }
    }
}

impl LogicQueue for LogicThread {
    fn queue_job(&self, job: Job) -> bool {
        match &self.tx {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }
}

impl Drop for LogicThread {
    fn drop(&mut self) {
        self.stop();
    }
}
