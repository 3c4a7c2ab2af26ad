//! Timeout enforcement.
//!
//! # Responsibilities
//! - Arm a one-shot timer beside a running execution
//! - Fire a completion callback if the deadline passes first
//!
//! # Design Decisions
//! - The timer never cancels the work it races; the loser is ignored
//! - `FOREVER` disables the timer entirely
//! - Timer tasks can be aborted once the execution settles

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Sentinel for "no deadline".
pub const FOREVER: Duration = Duration::MAX;

pub fn is_forever(duration: Duration) -> bool {
    duration == FOREVER
}

/// Spawn a timer on `handle` that runs `on_expire` after `duration`.
///
/// Returns `None` when the duration is [`FOREVER`].
pub fn spawn_deadline<F>(handle: &Handle, duration: Duration, on_expire: F) -> Option<AbortHandle>
where
    F: FnOnce() + Send + 'static,
{
    if is_forever(duration) {
        return None;
    }
    let task = handle.spawn(async move {
        tokio::time::sleep(duration).await;
        on_expire();
    });
    Some(task.abort_handle())
}
