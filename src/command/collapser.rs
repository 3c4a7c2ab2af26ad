//! Request collapsing.
//!
//! # Responsibilities
//! - Coalesce commands sharing a collapse key within one flush window
//! - Run each distinct key once per tick and broadcast its result
//!
//! # Design Decisions
//! - The first registrant of a key is the representative; every later
//!   registrant in the same window receives the representative's execution
//! - A dedicated thread drives the timer so at most one flush runs at a time
//! - Stopping abandons queued entries; their waiters see `Abandoned`

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::command::promise::Execution;
use crate::lifecycle::Shutdown;

type Run = Box<dyn FnOnce() + Send>;
type Queue = Arc<Mutex<HashMap<String, Pending>>>;

struct Pending {
    execution: Box<dyn Any + Send + Sync>,
    run: Run,
}

/// Periodic batcher of identical requests.
pub struct RequestCollapser {
    every: Duration,
    queue: Queue,
    shutdown: Shutdown,
}

impl RequestCollapser {
    /// Start a collapser flushing every `every`.
    ///
    /// Fails with `InvalidInput` for a zero period, or when the timer thread
    /// or its runtime cannot be created.
    pub fn new(every: Duration) -> std::io::Result<Self> {
        if every.is_zero() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "collapser period must be non-zero",
            ));
        }

        let queue: Queue = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Shutdown::new();
        let stop_rx = shutdown.subscribe();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let loop_queue = Arc::clone(&queue);
        std::thread::Builder::new()
            .name("command-collapser".into())
            .spawn(move || {
                runtime.block_on(flush_loop(loop_queue, every, stop_rx));
            })?;

        tracing::debug!(every_ms = every.as_millis() as u64, "Request collapser started");
        Ok(Self {
            every,
            queue,
            shutdown,
        })
    }

    pub fn every(&self) -> Duration {
        self.every
    }

    /// Register an execution under `key`.
    ///
    /// - `None` when there is no key (or the collapser is stopped): the caller
    ///   executes directly.
    /// - `Some(execution)` otherwise: either the caller's own execution, now
    ///   queued with `run` for the next flush, or the representative already
    ///   queued for this key. The caller must not execute in that case.
    pub fn add<T>(
        &self,
        key: Option<String>,
        execution: &Execution<T>,
        run: impl FnOnce() + Send + 'static,
    ) -> Option<Execution<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = key?;

        // checked under the lock so a concurrent stop cannot miss this entry
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shutdown.is_triggered() {
            return None;
        }
        match queue.entry(key) {
            Entry::Occupied(entry) => {
                match entry.get().execution.downcast_ref::<Execution<T>>() {
                    Some(existing) => {
                        tracing::debug!(key = %entry.key(), "Request collapsed into pending execution");
                        Some(existing.clone())
                    }
                    None => {
                        tracing::warn!(
                            key = %entry.key(),
                            "Collapse key reused with a different output type, executing directly"
                        );
                        None
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Pending {
                    execution: Box::new(execution.clone()),
                    run: Box::new(run),
                });
                Some(execution.clone())
            }
        }
    }

    /// Number of keys waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop the timer and abandon queued entries.
    pub fn stop(&self) {
        if !self.shutdown.trigger() {
            return;
        }
        let abandoned = std::mem::take(
            &mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner),
        );
        tracing::debug!(abandoned = abandoned.len(), "Request collapser stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

impl Drop for RequestCollapser {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RequestCollapser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCollapser")
            .field("every", &self.every)
            .field("pending", &self.pending())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

async fn flush_loop(queue: Queue, every: Duration, mut stop: broadcast::Receiver<()>) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                flush(&queue);
            }
            _ = stop.recv() => {
                tracing::debug!("Collapser received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

/// Drain the queue and run each key's representative once.
fn flush(queue: &Queue) -> usize {
    let drained = {
        let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.is_empty() {
            return 0;
        }
        std::mem::take(&mut *queue)
    };

    let count = drained.len();
    for (key, pending) in drained {
        let Pending { execution, run } = pending;
        drop(execution);
        if catch_unwind(AssertUnwindSafe(run)).is_err() {
            tracing::error!(key = %key, "Collapsed execution panicked during flush");
        }
    }
    tracing::trace!(count, "Collapser flushed");
    count
}
