//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resilient_client::command::{BoxError, CommandEngine, FnCommand};
use resilient_client::config::RetryConfig;
use resilient_client::registry::ServiceDescriptor;

/// Error raised by failing test commands, recoverable through `downcast_ref`.
#[derive(Debug, thiserror::Error)]
#[error("weird failure")]
pub struct Weird;

pub fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
}

pub fn count(counter: &Arc<AtomicU32>) -> u32 {
    counter.load(Ordering::SeqCst)
}

/// Engine with millisecond retry delays.
pub fn engine(allowed_concurrency: usize) -> CommandEngine {
    CommandEngine::of(allowed_concurrency)
        .expect("engine runtime")
        .with_retry_config(RetryConfig {
            base_delay_ms: 1,
            max_delay_ms: 20,
            fixed_delay_ms: 1,
        })
}

/// Command returning "Hello" after `delay`, counting its body runs.
pub fn hello(name: &'static str, counter: &Arc<AtomicU32>, delay: Duration) -> FnCommand<String> {
    let counter = Arc::clone(counter);
    FnCommand::new(name, move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok("Hello".to_string())
        }
    })
}

/// Command that always fails with [`Weird`], counting its body runs.
pub fn weird(name: &'static str, counter: &Arc<AtomicU32>) -> FnCommand<String> {
    let counter = Arc::clone(counter);
    FnCommand::new(name, move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<String, BoxError>(Box::new(Weird))
        }
    })
}

pub fn descriptor(uid: &str, name: &str) -> ServiceDescriptor {
    ServiceDescriptor::new(uid, name, format!("http://{uid}.local:8080"))
}
