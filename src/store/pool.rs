//! Bounded compute pool with automatic restart.
//!
//! Tile computation is CPU-bound, so it runs on a small fixed set of OS
//! threads instead of the async runtime. The pool survives worker crashes:
//! a panicking job marks the pool broken, and the next submission rebuilds
//! the workers once before giving up. Jobs are queued through a channel and
//! picked up by whichever worker frees first.
//!
//! There is no coalescing here. Two submissions for the same tile both run;
//! the cache in front of the pool absorbs the duplicate cost.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, warn};

use crate::error::StoreError;

/// A unit of work for the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

// =============================================================================
// Worker Pool
// =============================================================================

/// Sets the broken flag when its worker thread unwinds.
struct CrashGuard {
    broken: Arc<AtomicBool>,
}

impl Drop for CrashGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.broken.store(true, Ordering::SeqCst);
        }
    }
}

/// A fixed set of worker threads draining a shared job queue.
///
/// Construction is all-or-nothing: if any worker thread fails to spawn, the
/// ones already running are torn down and the error is returned. A pool of
/// size zero accepts no work; every dispatch hands the job back.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
    broken: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(size: usize) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let broken = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let receiver = Arc::clone(&receiver);
            let broken = Arc::clone(&broken);
            let spawned = thread::Builder::new()
                .name(format!("raster-worker-{}", i))
                .spawn(move || worker_loop(receiver, broken));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    drop(sender);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            sender: Some(sender),
            workers,
            broken,
        })
    }

    /// Queue a job, or hand it back if the pool can no longer run it.
    pub fn dispatch(&self, job: Job) -> Result<(), Job> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(job);
        }
        match &self.sender {
            Some(sender) => sender.send(job).map_err(|returned| returned.0),
            None => Err(job),
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Disconnect the queue so idle workers exit, then wait for them
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>, broken: Arc<AtomicBool>) {
    let _guard = CrashGuard { broken };
    loop {
        // Take the next job while holding the queue lock, run it outside
        let job = {
            let queue = receiver.lock().unwrap();
            queue.recv()
        };
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

// =============================================================================
// Compute Pool
// =============================================================================

/// Builds worker pools; swapped out in tests to simulate failures.
pub type PoolFactory = Arc<dyn Fn() -> io::Result<WorkerPool> + Send + Sync>;

/// The pool the tile store submits to, with lazy start and restart-once
/// recovery.
///
/// Workers start on the first submission. When a submission finds the pool
/// broken, the workers are rebuilt through the factory and the job is
/// retried exactly once; a second failure surfaces as
/// [`StoreError::PoolBroken`] for that submission, and later submissions
/// trigger their own restart attempt.
pub struct ComputePool {
    factory: PoolFactory,
    pool: Mutex<Option<WorkerPool>>,
}

impl ComputePool {
    /// A pool of `workers` threads, or a single worker when `serial` is set.
    ///
    /// If the parallel workers cannot be spawned the pool degrades to a
    /// single worker with a warning, matching the serial mode; failure to
    /// spawn even that one propagates.
    pub fn new(workers: usize, serial: bool) -> Self {
        let factory: PoolFactory = Arc::new(move || {
            if serial {
                return WorkerPool::new(1);
            }
            match WorkerPool::new(workers) {
                Ok(pool) => Ok(pool),
                Err(err) => {
                    warn!(
                        error = %err,
                        workers,
                        "unable to start parallel workers, falling back to a single worker"
                    );
                    WorkerPool::new(1)
                }
            }
        });
        Self {
            factory,
            pool: Mutex::new(None),
        }
    }

    /// A pool built through a custom factory.
    pub fn with_factory(factory: PoolFactory) -> Self {
        Self {
            factory,
            pool: Mutex::new(None),
        }
    }

    /// Submit a job for execution on the workers.
    pub fn submit(&self, job: Job) -> Result<(), StoreError> {
        let mut guard = self.pool.lock().unwrap();

        let pool = match guard.take() {
            Some(pool) => pool,
            None => (self.factory)().map_err(|err| StoreError::PoolBroken {
                message: err.to_string(),
            })?,
        };

        let job = match pool.dispatch(job) {
            Ok(()) => {
                *guard = Some(pool);
                return Ok(());
            }
            Err(job) => {
                warn!(size = pool.size(), "compute pool broken, restarting workers");
                job
            }
        };

        let fresh = match (self.factory)() {
            Ok(fresh) => fresh,
            Err(err) => {
                drop(guard);
                drop(pool);
                return Err(StoreError::PoolBroken {
                    message: err.to_string(),
                });
            }
        };
        let outcome = fresh.dispatch(job).map_err(|_| StoreError::PoolBroken {
            message: "workers unavailable after restart".to_string(),
        });
        *guard = Some(fresh);
        drop(guard);
        // Join the stale workers after releasing the lock
        drop(pool);
        outcome
    }

    /// Stop and join the workers. The pool restarts lazily if used again.
    pub fn shutdown(&self) {
        let stale = self.pool.lock().unwrap().take();
        if let Some(pool) = stale {
            debug!(size = pool.size(), "stopping compute workers");
            drop(pool);
        }
    }

    /// Number of running workers, if any have been started.
    pub fn worker_count(&self) -> Option<usize> {
        self.pool.lock().unwrap().as_ref().map(|pool| pool.size())
    }
}

// =============================================================================
// Tests
// =============================================================================
