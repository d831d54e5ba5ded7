//! Bounded pool of worker threads for indexing and search jobs.
//!
//! Submissions never block: once every worker is busy and the queue is full,
//! new work is rejected and a [`WorkRejected`] event goes to every
//! subscriber. Each accepted job gets a sequence number so callers issuing
//! searches faster than they complete can drop stale results.
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded, unbounded};
use tracing::{debug, error, warn};

use crate::config::MercatorConfig;
use crate::error::{MercatorError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Emitted when a submission finds the queue full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRejected {
    /// Sequence number the job would have had.
    pub sequence: u64,
    /// Total rejections of this pool so far, this one included.
    pub total_rejected: u64,
}

/// Result of [`WorkerPool::submit`]. Rejection is a normal outcome.
#[must_use]
#[derive(Debug)]
pub enum Submission<T> {
    Accepted(Ticket<T>),
    Rejected(WorkRejected),
}

impl<T> Submission<T> {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn accepted(self) -> Option<Ticket<T>> {
        match self {
            Self::Accepted(ticket) => Some(ticket),
            Self::Rejected(_) => None,
        }
    }
}

/// Claim on the result of an accepted job.
#[derive(Debug)]
pub struct Ticket<T> {
    sequence: u64,
    receiver: Receiver<Result<T>>,
}

impl<T> Ticket<T> {
    /// Submission order of the job; later submissions have larger numbers.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// True if `self` was submitted after `other`.
    pub fn supersedes<U>(&self, other: &Ticket<U>) -> bool {
        self.sequence > other.sequence
    }

    /// Blocks until the job finished.
    pub fn wait(self) -> Result<T> {
        self.receiver.recv().map_err(|_| MercatorError::WorkerLost)?
    }

    /// The result if the job already finished.
    pub fn try_result(&self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(MercatorError::WorkerLost)),
        }
    }
}

/// Fixed set of threads fed from one bounded queue.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
    next_sequence: AtomicU64,
    rejected: AtomicU64,
    subscribers: Mutex<Vec<Sender<WorkRejected>>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("next_sequence", &self.next_sequence)
            .field("rejected", &self.rejected)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Spawns `worker_count` threads, at least one, sharing a queue of
    /// `queue_depth` waiting jobs.
    pub fn new(worker_count: usize, queue_depth: usize) -> Result<Self> {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = bounded::<Job>(queue_depth);
        let workers = (0..worker_count)
            .map(|id| spawn_worker(id, receiver.clone()))
            .collect::<Result<Vec<_>>>()?;
        debug!(worker_count, queue_depth, "Worker pool started");
        Ok(Self {
            sender: Some(sender),
            workers,
            next_sequence: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    pub fn from_config(config: &MercatorConfig) -> Result<Self> {
        Self::new(config.worker_count, config.queue_depth)
    }

    /// Events for every rejection from now on. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe_rejections(&self) -> Receiver<WorkRejected> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Queues `job` unless the queue is full. A panicking job resolves its
    /// ticket with an error and leaves the worker alive.
    pub fn submit<T, F>(&self, job: F) -> Submission<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let (result_tx, result_rx) = bounded(1);
        let wrapped: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!(sequence, %message, "Job panicked");
                Err(anyhow::anyhow!("job {sequence} panicked: {message}").into())
            });
            // The ticket may have been dropped.
            let _ = result_tx.send(result);
        });

        let Some(sender) = &self.sender else {
            return self.reject(sequence);
        };
        match sender.try_send(wrapped) {
            Ok(()) => {
                debug!(sequence, "Job queued");
                Submission::Accepted(Ticket {
                    sequence,
                    receiver: result_rx,
                })
            }
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => self.reject(sequence),
        }
    }

    fn reject<T>(&self, sequence: u64) -> Submission<T> {
        let total_rejected = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
        let event = WorkRejected {
            sequence,
            total_rejected,
        };
        warn!(sequence, total_rejected, "Worker queue full, job rejected");
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|subscriber| subscriber.send(event).is_ok());
        Submission::Rejected(event)
    }
}

impl Drop for WorkerPool {
    /// Lets queued jobs finish, then joins every worker.
    fn drop(&mut self) {
        drop(self.sender.take());
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            // a job holding the last reference drops the pool on a worker
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                error!("Worker thread exited abnormally");
            }
        }
    }
}

fn spawn_worker(id: usize, jobs: Receiver<Job>) -> Result<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("mercator-worker-{id}"))
        .spawn(move || {
            while let Ok(job) = jobs.recv() {
                job();
            }
            debug!(worker = id, "Worker stopped");
        })?;
    Ok(handle)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
