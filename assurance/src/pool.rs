//! Bounded worker pool with a wait-group contract
//!
//! Work is registered before it is submitted so that a task which fans out into more tasks
//! can never let the pending count reach zero early: the child is registered by the parent
//! while the parent itself is still counted.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::config::ScanOptions;
use crate::error::{AssuranceError, Result};

#[derive(Debug, Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

/// Decrements the pending count however the task ends
struct CompletionGuard(Arc<Pending>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::warn!("Worker task panicked");
        }
        self.0.decrement();
    }
}

/// Cloneable handle used to register, submit and await work on a [`WorkerPool`]
#[derive(Clone)]
pub struct TaskGroup {
    handle: Handle,
    pending: Arc<Pending>,
    size: usize,
}

impl TaskGroup {
    /// Mark one unit of pending work
    pub fn register(&self) {
        self.pending.increment();
    }

    /// Run a previously registered task on a worker thread
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = CompletionGuard(Arc::clone(&self.pending));
        self.handle.spawn_blocking(move || {
            let _guard = guard;
            task();
        });
    }

    /// Register and submit in one step
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.register();
        self.submit(task);
    }

    /// Block until every registered task has completed
    pub fn wait(&self) {
        self.pending.wait();
    }

    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Owns the worker threads. Dropping the pool waits for outstanding work.
pub struct WorkerPool {
    runtime: Option<Runtime>,
    tasks: TaskGroup,
}

impl WorkerPool {
    /// Pool with exactly `size` worker threads
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(AssuranceError::Pool("Pool size must be at least 1".to_string()));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(size)
            .thread_name("assurance-worker")
            .build()
            .map_err(|e| AssuranceError::Pool(format!("Failed to build worker runtime: {}", e)))?;

        let tasks = TaskGroup {
            handle: runtime.handle().clone(),
            pending: Arc::new(Pending::default()),
            size,
        };

        tracing::debug!("Started worker pool with {} threads", size);
        Ok(Self {
            runtime: Some(runtime),
            tasks,
        })
    }

    /// Pool sized from the configured thread count
    pub fn from_options(options: &ScanOptions) -> Result<Self> {
        Self::new(options.worker_threads())
    }

    pub fn tasks(&self) -> &TaskGroup {
        &self.tasks
    }

    pub fn register(&self) {
        self.tasks.register();
    }

    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.submit(task);
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    pub fn wait(&self) {
        self.tasks.wait();
    }

    pub fn size(&self) -> usize {
        self.tasks.size()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.tasks.wait();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_wait_with_nothing_registered() {
        let pool = WorkerPool::new(2).unwrap();
        pool.wait();
        assert_eq!(pool.tasks().pending(), 0);
    }

    #[test]
    fn test_all_tasks_complete() {
        let pool = WorkerPool::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.wait();

        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_recursive_fan_out() {
        fn fan_out(tasks: TaskGroup, depth: usize, counter: Arc<AtomicUsize>) {
            counter.fetch_add(1, Ordering::SeqCst);
            if depth == 0 {
                return;
            }
            for _ in 0..2 {
                let child_tasks = tasks.clone();
                let counter = Arc::clone(&counter);
                tasks.spawn(move || fan_out(child_tasks, depth - 1, counter));
            }
        }

        // A single worker must still drain a recursive tree
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks = pool.tasks().clone();
        let root_counter = Arc::clone(&counter);
        pool.spawn(move || fan_out(tasks, 4, root_counter));
        pool.wait();

        assert_eq!(counter.load(Ordering::SeqCst), 31);
    }

    #[test]
    fn test_panicking_task_still_completes() {
        let pool = WorkerPool::new(2).unwrap();
        pool.spawn(|| panic!("boom"));
        pool.spawn(|| std::thread::sleep(Duration::from_millis(10)));
        pool.wait();
        assert_eq!(pool.tasks().pending(), 0);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(AssuranceError::Pool(_))));
    }

    #[test]
    fn test_from_options_falls_back_to_default() {
        let options = ScanOptions {
            number_of_threads: 64,
            ..Default::default()
        };
        let pool = WorkerPool::from_options(&options).unwrap();
        assert_eq!(pool.size(), crate::config::DEFAULT_NUMBER_OF_THREADS);
    }
}
