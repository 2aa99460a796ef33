//! Fan-out execution of a handler across a work list.
//!
//! Two pool flavors, selected explicitly by the caller:
//!
//! - [`DispatchMode::Task`] schedules every item as a tokio task, bounded
//!   by a semaphore. Right for I/O-bound scraping where the handler mostly
//!   waits on the network.
//! - [`DispatchMode::Thread`] runs a fixed set of OS threads, each with
//!   its own single-threaded runtime, draining a shared queue. Right for
//!   work that wants hard isolation per worker - notably download sessions,
//!   where every item drives its own browser process.
//!
//! Workers share nothing beyond the item queue; completion order is not
//! guaranteed in either mode.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

/// Pool flavor. Caller-supplied, never inferred from the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Bounded concurrent tokio tasks.
    Task,
    /// Dedicated OS threads with per-thread runtimes.
    Thread,
}

/// Runs a handler across a work list with a fixed degree of parallelism.
#[derive(Debug, Clone, Copy)]
pub struct ParallelDispatcher {
    workers: usize,
    mode: DispatchMode,
}

impl ParallelDispatcher {
    pub fn new(workers: usize, mode: DispatchMode) -> Self {
        Self {
            workers: workers.max(1),
            mode,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Run `handler(ctx, item)` for every item.
    ///
    /// `ctx` is bound as the leading argument of every invocation (cloned
    /// per call). Results are collected in completion order, which is
    /// arbitrary; pass `()` results when file-system side effects are the
    /// only observable output.
    pub async fn run<T, C, R, F, Fut>(&self, items: Vec<T>, ctx: C, handler: F) -> Vec<R>
    where
        T: Send + 'static,
        C: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(C, T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        match self.mode {
            DispatchMode::Task => self.run_tasks(items, ctx, handler).await,
            DispatchMode::Thread => self.run_threads(items, ctx, handler).await,
        }
    }

    async fn run_tasks<T, C, R, F, Fut>(&self, items: Vec<T>, ctx: C, handler: F) -> Vec<R>
    where
        T: Send + 'static,
        C: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(C, T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut set = JoinSet::new();
        let expected = items.len();

        for item in items {
            let semaphore = Arc::clone(&semaphore);
            let ctx = ctx.clone();
            let handler = handler.clone();
            set.spawn(async move {
                // The semaphore is never closed, so acquisition only fails
                // if the pool itself is torn down mid-run.
                let _permit = semaphore.acquire_owned().await;
                handler(ctx, item).await
            });
        }

        let mut results = Vec::with_capacity(expected);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("dispatched task panicked: {e}"),
            }
        }
        results
    }

    async fn run_threads<T, C, R, F, Fut>(&self, items: Vec<T>, ctx: C, handler: F) -> Vec<R>
    where
        T: Send + 'static,
        C: Clone + Send + 'static,
        R: Send + 'static,
        F: Fn(C, T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let workers = self.workers.min(items.len().max(1));
        let queue: Arc<Mutex<VecDeque<T>>> = Arc::new(Mutex::new(items.into_iter().collect()));
        let results: Arc<Mutex<Vec<R>>> = Arc::new(Mutex::new(Vec::new()));

        let pool_results = Arc::clone(&results);
        let joined = tokio::task::spawn_blocking(move || {
            std::thread::scope(|scope| {
                for _ in 0..workers {
                    let queue = Arc::clone(&queue);
                    let results = Arc::clone(&pool_results);
                    let ctx = ctx.clone();
                    let handler = handler.clone();
                    scope.spawn(move || {
                        let runtime = match tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                        {
                            Ok(rt) => rt,
                            Err(e) => {
                                error!("failed to build worker runtime: {e}");
                                return;
                            }
                        };
                        loop {
                            let item = lock(&queue).pop_front();
                            let Some(item) = item else { break };
                            let result = runtime.block_on(handler(ctx.clone(), item));
                            lock(&results).push(result);
                        }
                    });
                }
            });
        })
        .await;

        if let Err(e) = joined {
            warn!("thread pool join failed: {e}");
        }

        let mut out = lock(&results);
        std::mem::take(&mut *out)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A poisoned lock means a worker panicked; the queue itself is still
    // consistent, so keep draining.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn task_mode_processes_every_item() {
        let dispatcher = ParallelDispatcher::new(3, DispatchMode::Task);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut results = dispatcher
            .run(
                (0..20).collect::<Vec<u32>>(),
                Arc::clone(&calls),
                |calls, n| async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    n * 2
                },
            )
            .await;

        results.sort_unstable();
        assert_eq!(calls.load(Ordering::Relaxed), 20);
        assert_eq!(results, (0..20).map(|n| n * 2).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn thread_mode_processes_every_item() {
        let dispatcher = ParallelDispatcher::new(4, DispatchMode::Thread);

        let mut results = dispatcher
            .run((0..17).collect::<Vec<u32>>(), (), |(), n| async move {
                n + 100
            })
            .await;

        results.sort_unstable();
        assert_eq!(results, (100..117).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn fixed_context_is_bound_to_every_invocation() {
        let dispatcher = ParallelDispatcher::new(2, DispatchMode::Task);

        let results = dispatcher
            .run(
                vec!["a".to_string(), "b".to_string()],
                "prefix".to_string(),
                |prefix, item| async move { format!("{prefix}/{item}") },
            )
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.starts_with("prefix/")));
    }

    #[tokio::test]
    async fn empty_work_list_yields_no_results() {
        let dispatcher = ParallelDispatcher::new(2, DispatchMode::Thread);
        let results: Vec<u32> = dispatcher
            .run(Vec::<u32>::new(), (), |(), n| async move { n })
            .await;
        assert!(results.is_empty());
    }
}
