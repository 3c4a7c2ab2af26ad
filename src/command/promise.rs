//! Single-assignment result slot shared by the racing branches of an execution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use tokio::sync::oneshot;

use crate::command::error::{CommandError, CommandResult};
use crate::observability::metrics;

/// Pending result of a command. Cloning it shares the same outcome.
pub type Execution<T> = Shared<BoxFuture<'static, CommandResult<T>>>;

/// Already-settled execution.
pub fn ready<T>(result: CommandResult<T>) -> Execution<T>
where
    T: Clone + Send + Sync + 'static,
{
    futures_util::future::ready(result).boxed().shared()
}

/// RAII slot in the engine's in-flight counter.
#[derive(Debug)]
pub struct InFlightGuard {
    counter: Arc<AtomicUsize>,
}

impl InFlightGuard {
    pub fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        let now = counter.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::set_in_flight(now);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let now = self.counter.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        metrics::set_in_flight(now);
    }
}

// guard drops before tx so waiters observe the released slot
struct Slot<T> {
    guard: Option<InFlightGuard>,
    tx: oneshot::Sender<CommandResult<T>>,
}

/// Write side of an [`Execution`]. The first completion wins, later ones are
/// ignored. Dropping every clone unsettled resolves waiters to `Abandoned`.
pub struct Promise<T> {
    slot: Arc<Mutex<Option<Slot<T>>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> (Self, Execution<T>) {
        let (tx, rx) = oneshot::channel();
        let execution = rx
            .map(|received| received.unwrap_or(Err(CommandError::Abandoned)))
            .boxed()
            .shared();
        let promise = Self {
            slot: Arc::new(Mutex::new(Some(Slot { tx, guard: None }))),
        };
        (promise, execution)
    }

    /// Tie an in-flight slot to this promise; released when it settles.
    pub fn hold(&self, guard: InFlightGuard) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slot.as_mut() {
            slot.guard = Some(guard);
        }
    }

    /// Settle with `result` unless already settled. Returns whether this call won.
    pub fn try_complete(&self, result: CommandResult<T>) -> bool {
        let taken = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(Slot { guard, tx }) => {
                drop(guard);
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
