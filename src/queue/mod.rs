//! FIFO work queue with retry-by-requeue.
//!
//! The discovery phases enumerate per-URL probes whose failures are mostly
//! transient (page not rendered yet, driver hiccup). Instead of retrying
//! in place, a failed item moves to the back of the queue so the rest of
//! the list makes progress in between attempts. The loop terminates when
//! the queue empties; a per-item attempt cap converts items that never
//! resolve into recorded abandonments instead of spinning forever.

use std::collections::VecDeque;
use std::future::Future;

use tracing::{debug, warn};

/// A unit of work with a stable identity key.
///
/// The key survives re-enqueueing so terminal outcomes can be recorded
/// against the original row (discovery joins back on the row index).
pub trait WorkItem: Clone + Send {
    fn key(&self) -> String;
}

/// Result of one handler invocation against a work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Item resolved; discard it and record success.
    Done,
    /// Recoverable failure; re-enqueue the item at the tail.
    Transient(String),
    /// Unrecoverable failure; discard the item and record the failure.
    Permanent(String),
}

/// An item that reached a terminal failure.
#[derive(Debug, Clone)]
pub struct Abandoned<T> {
    pub item: T,
    /// Attempts consumed before the item was given up on.
    pub attempts: u32,
    pub reason: String,
}

/// Terminal outcomes of a drained queue: exactly one entry per input item.
#[derive(Debug)]
pub struct DrainReport<T> {
    pub completed: Vec<T>,
    pub abandoned: Vec<Abandoned<T>>,
    /// Total number of re-enqueues across all items (observability counter).
    pub requeues: u64,
}

impl<T> DrainReport<T> {
    pub fn terminal_count(&self) -> usize {
        self.completed.len() + self.abandoned.len()
    }
}

/// Drains a FIFO queue through a fallible handler, re-enqueueing items
/// that fail transiently.
///
/// Without a `max_attempts` cap a handler that always reports
/// `Transient` loops forever; callers that probe live sites should
/// always set one.
pub struct RequeueScheduler<T> {
    queue: VecDeque<(T, u32)>,
    max_attempts: Option<u32>,
}

impl<T: WorkItem> RequeueScheduler<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            queue: items.into_iter().map(|item| (item, 0)).collect(),
            max_attempts: None,
        }
    }

    /// Cap the number of attempts per item. Exceeding the cap turns a
    /// transient failure into an abandonment.
    pub fn with_max_attempts(mut self, cap: u32) -> Self {
        self.max_attempts = Some(cap.max(1));
        self
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Run the requeue loop to completion.
    ///
    /// Invariant: every input item appears exactly once in the returned
    /// report, either completed or abandoned.
    pub async fn drain<F, Fut>(mut self, mut attempt: F) -> DrainReport<T>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let mut report = DrainReport {
            completed: Vec::new(),
            abandoned: Vec::new(),
            requeues: 0,
        };

        while let Some((item, prior_attempts)) = self.queue.pop_front() {
            let attempts = prior_attempts + 1;
            match attempt(item.clone()).await {
                Outcome::Done => {
                    debug!(key = %item.key(), attempts, "work item resolved");
                    report.completed.push(item);
                }
                Outcome::Permanent(reason) => {
                    warn!(key = %item.key(), attempts, %reason, "work item failed permanently");
                    report.abandoned.push(Abandoned {
                        item,
                        attempts,
                        reason,
                    });
                }
                Outcome::Transient(reason) => {
                    if let Some(cap) = self.max_attempts {
                        if attempts >= cap {
                            warn!(
                                key = %item.key(),
                                attempts,
                                %reason,
                                "retry budget exhausted, abandoning item"
                            );
                            report.abandoned.push(Abandoned {
                                item,
                                attempts,
                                reason,
                            });
                            continue;
                        }
                    }
                    report.requeues += 1;
                    debug!(
                        requeues = report.requeues,
                        key = %item.key(),
                        %reason,
                        "re-enqueued work item"
                    );
                    self.queue.push_back((item, attempts));
                }
            }
        }

        report
    }
}
