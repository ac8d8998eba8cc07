//! Bounded worker thread pools.
//!
//! A [`WorkerPool`] runs jobs on a fixed set of named threads. The job queue
//! is bounded: [`submit`](WorkerPool::submit) blocks while the queue is full,
//! which gives the prefetch coordinator natural backpressure.
//!
//! Shutdown stops accepting work and lets each worker finish the job it is
//! running. Jobs still queued at that point are discarded; prefetch work is
//! always safe to drop.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolQueue {
    jobs: VecDeque<Job>,
    closed: bool,
}

struct PoolShared {
    queue: Mutex<PoolQueue>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    active: AtomicUsize,
    completed: AtomicUsize,
}

impl PoolShared {
    fn next_job(&self) -> Option<Job> {
        let mut queue = self.queue.lock();
        loop {
            if queue.closed {
                return None;
            }
            if let Some(job) = queue.jobs.pop_front() {
                self.not_full.notify_one();
                return Some(job);
            }
            self.not_empty.wait(&mut queue);
        }
    }

    fn worker_loop(&self, name: &str) {
        while let Some(job) = self.next_job() {
            self.active.fetch_add(1, Ordering::SeqCst);
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(pool = name, "Worker job panicked");
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        debug!(pool = name, "Worker exiting");
    }
}

/// Fixed-size pool of worker threads with a bounded job queue.
pub struct WorkerPool {
    name: String,
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `threads` workers named `{name}-{n}`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned. Workers
    /// already spawned are shut down first.
    pub fn new(name: &str, threads: usize, capacity: usize) -> io::Result<Self> {
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(PoolQueue {
                jobs: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
            active: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        });

        let pool = Self {
            name: name.to_string(),
            shared,
            workers: Mutex::new(Vec::with_capacity(threads)),
        };

        for index in 0..threads {
            let shared = Arc::clone(&pool.shared);
            let worker_name = format!("{}-{}", name, index);
            let spawned = thread::Builder::new()
                .name(worker_name.clone())
                .spawn(move || shared.worker_loop(&worker_name));
            match spawned {
                Ok(handle) => pool.workers.lock().push(handle),
                Err(e) => {
                    pool.shutdown();
                    return Err(e);
                }
            }
        }

        debug!(pool = name, threads, capacity, "Worker pool started");
        Ok(pool)
    }

    /// Queue a job, blocking while the queue is full.
    ///
    /// Returns `false` if the pool is closed; the job is dropped.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.queue.lock();
        while !queue.closed && queue.jobs.len() >= self.shared.capacity {
            self.shared.not_full.wait(&mut queue);
        }
        if queue.closed {
            return false;
        }
        queue.jobs.push_back(Box::new(job));
        self.shared.not_empty.notify_one();
        true
    }

    /// Stop accepting jobs and wake every waiter. Does not wait.
    pub fn close(&self) {
        let mut queue = self.shared.queue.lock();
        queue.closed = true;
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
    }

    /// Close the pool and join every worker.
    ///
    /// Returns the number of queued jobs that were discarded. Idempotent.
    pub fn shutdown(&self) -> usize {
        self.close();
        let discarded = {
            let mut queue = self.shared.queue.lock();
            let n = queue.jobs.len();
            queue.jobs.clear();
            n
        };

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.join().is_err() {
                error!(pool = %self.name, "Worker thread panicked");
            }
        }
        if discarded > 0 {
            debug!(pool = %self.name, discarded, "Discarded queued jobs at shutdown");
        }
        discarded
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Jobs currently running.
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Jobs finished since the pool started.
    pub fn completed(&self) -> usize {
        self.shared.completed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.queue.lock().closed
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}
