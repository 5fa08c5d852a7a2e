//! A fixed-size worker pool over one mutex-guarded FIFO queue.
//!
//! Each worker owns a growable scratch buffer that it lends to every task it
//! runs, so file ingestion allocates once per worker rather than once per
//! file. Dropping the pool stops intake, drains the queue, and joins the
//! workers.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tracing::warn;

use crate::errors::{SearchError, SearchResult};

type Task = Box<dyn FnOnce(&mut Vec<u8>) + Send + 'static>;

struct QueueState {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    ready: Condvar,
    panicked: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // a panicking task is caught before it can poison this lock
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Starts `threads` workers blocked on the task queue.
    pub fn new(threads: NonZeroUsize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                shutdown: false,
            }),
            ready: Condvar::new(),
            panicked: AtomicBool::new(false),
        });

        let workers = (0..threads.get())
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || worker_loop(&shared))
            })
            .collect();

        ThreadPool { shared, workers }
    }

    /// Enqueues a task. Fails once shutdown has begun; never drops silently.
    pub fn submit<F>(&self, task: F) -> SearchResult<()>
    where
        F: FnOnce(&mut Vec<u8>) + Send + 'static,
    {
        let mut state = self.shared.lock();
        if state.shutdown {
            return Err(SearchError::PoolClosed);
        }
        state.tasks.push_back(Box::new(task));
        drop(state);
        self.shared.ready.notify_one();
        Ok(())
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.ready.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    let mut scratch: Vec<u8> = Vec::new();
    let mut state = shared.lock();
    loop {
        if let Some(task) = state.tasks.pop_front() {
            drop(state);
            if catch_unwind(AssertUnwindSafe(|| task(&mut scratch))).is_err()
                && !shared.panicked.swap(true, Ordering::Relaxed)
            {
                warn!("a search task failed unexpectedly; continuing with remaining files");
            }
            state = shared.lock();
            continue;
        }
        if state.shutdown {
            break;
        }
        state = shared
            .ready
            .wait(state)
            .unwrap_or_else(|e| e.into_inner());
    }
}
