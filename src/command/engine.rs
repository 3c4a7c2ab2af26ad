//! Command execution engine.
//!
//! # Data Flow
//! ```text
//! execute(command)
//!     → cache hit?            → shared execution, nothing else runs
//!     → breaker open?         → fallback | CircuitOpen
//!     → in_flight >= limit?   → fallback | TooManyConcurrentRequests
//!     → collapser (keyed)     → representative execution, run at next flush
//!     → run directly:
//!         in_flight += 1 (released when the promise settles)
//!         spawn retrying body  ─┐ first to settle wins
//!         spawn deadline timer ─┘
//! ```
//!
//! # Design Decisions
//! - Admission checks are synchronous and never touch the in-flight counter
//! - The losing branch of the timeout race keeps running; its result is dropped
//! - A timeout is not recorded as a breaker failure
//! - Configuration is immutable; `with_*` returns a new engine sharing the
//!   runtime but with fresh breakers and a fresh in-flight counter

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use dashmap::DashMap;
use tokio::runtime::{Handle, Runtime};

use crate::command::cache::{CommandCache, InMemoryCommandCache};
use crate::command::collapser::RequestCollapser;
use crate::command::definition::Command;
use crate::command::error::{CommandError, CommandResult};
use crate::command::promise::{self, Execution, InFlightGuard, Promise};
use crate::config::{BreakerConfig, BreakerStrategy, ClientConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::{retries, timeouts, CircuitBreaker};

/// Breaker key used by [`BreakerStrategy::UniquePerContext`].
pub const DEFAULT_BREAKER_KEY: &str = "__DEFAULT_BREAKER__";

/// Runtime commands execute on; owned unless borrowed via `with_runtime`.
struct Executor {
    handle: Handle,
    owned: Mutex<Option<Runtime>>,
}

impl Executor {
    fn owned(worker_threads: usize) -> std::io::Result<Self> {
        let workers = if worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                + 1
        } else {
            worker_threads
        };
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("command-engine")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Mutex::new(Some(runtime)),
        })
    }

    fn borrowed(handle: Handle) -> Self {
        Self {
            handle,
            owned: Mutex::new(None),
        }
    }

    fn shutdown(&self) {
        let runtime = self
            .owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct EngineInner {
    executor: Arc<Executor>,
    allowed_concurrency: usize,
    strategy: BreakerStrategy,
    breaker_config: BreakerConfig,
    retry_config: RetryConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    in_flight: Arc<AtomicUsize>,
    cache: Option<Arc<dyn CommandCache>>,
    collapser: Option<Arc<RequestCollapser>>,
}

impl EngineInner {
    /// Copy the configuration, sharing the executor, with fresh runtime state.
    fn derive(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            allowed_concurrency: self.allowed_concurrency,
            strategy: self.strategy,
            breaker_config: self.breaker_config.clone(),
            retry_config: self.retry_config.clone(),
            breakers: DashMap::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            cache: self.cache.clone(),
            collapser: self.collapser.clone(),
        }
    }
}

/// Entry point for running commands.
#[derive(Clone)]
pub struct CommandEngine {
    inner: Arc<EngineInner>,
}

impl CommandEngine {
    /// Engine with its own runtime admitting `allowed_concurrency` commands at once.
    ///
    /// The runtime lives as long as some clone of the engine does: dropping
    /// the last handle shuts it down like [`shutdown`](Self::shutdown), so
    /// keep the engine alive while its executions are pending.
    pub fn of(allowed_concurrency: usize) -> std::io::Result<Self> {
        let executor = Executor::owned(0)?;
        Ok(Self::from_executor(executor, allowed_concurrency))
    }

    /// Engine built from a validated configuration.
    pub fn from_config(config: &ClientConfig) -> std::io::Result<Self> {
        let executor = Executor::owned(config.engine.worker_threads)?;
        let mut engine = Self::from_executor(executor, config.engine.allowed_concurrency)
            .with_breaker_strategy(config.engine.breaker_strategy)
            .with_breaker_config(config.breaker.clone())
            .with_retry_config(config.retry.clone());

        if config.cache.enabled {
            engine = engine.with_cache(InMemoryCommandCache::new(config.cache.retention));
        }
        if config.collapser.enabled {
            engine = engine.with_collapser(RequestCollapser::new(config.collapser.every)?);
        }

        tracing::info!(
            allowed_concurrency = config.engine.allowed_concurrency,
            breaker_strategy = ?config.engine.breaker_strategy,
            cache = config.cache.enabled,
            collapser = config.collapser.enabled,
            "Command engine configured"
        );
        Ok(engine)
    }

    fn from_executor(executor: Executor, allowed_concurrency: usize) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                executor: Arc::new(executor),
                allowed_concurrency,
                strategy: BreakerStrategy::default(),
                breaker_config: BreakerConfig::default(),
                retry_config: RetryConfig::default(),
                breakers: DashMap::new(),
                in_flight: Arc::new(AtomicUsize::new(0)),
                cache: None,
                collapser: None,
            }),
        }
    }

    fn derive(&self, configure: impl FnOnce(&mut EngineInner)) -> Self {
        let mut inner = self.inner.derive();
        configure(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn with_allowed_concurrency(&self, allowed_concurrency: usize) -> Self {
        self.derive(|inner| inner.allowed_concurrency = allowed_concurrency)
    }

    pub fn with_breaker_strategy(&self, strategy: BreakerStrategy) -> Self {
        self.derive(|inner| inner.strategy = strategy)
    }

    pub fn with_breaker_config(&self, config: BreakerConfig) -> Self {
        self.derive(|inner| inner.breaker_config = config)
    }

    pub fn with_retry_config(&self, config: RetryConfig) -> Self {
        self.derive(|inner| inner.retry_config = config)
    }

    pub fn with_cache(&self, cache: impl CommandCache + 'static) -> Self {
        let cache: Arc<dyn CommandCache> = Arc::new(cache);
        self.derive(|inner| inner.cache = Some(cache))
    }

    pub fn with_collapser(&self, collapser: impl Into<Arc<RequestCollapser>>) -> Self {
        let collapser = collapser.into();
        self.derive(|inner| inner.collapser = Some(collapser))
    }

    /// Run commands on an existing runtime instead of the owned one.
    pub fn with_runtime(&self, handle: Handle) -> Self {
        let executor = Arc::new(Executor::borrowed(handle));
        self.derive(|inner| inner.executor = executor)
    }

    pub fn allowed_concurrency(&self) -> usize {
        self.inner.allowed_concurrency
    }

    /// Commands currently holding an execution slot.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Breaker registered under `key`, if one was created yet.
    pub fn breaker(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.inner.breakers.get(key).map(|b| Arc::clone(b.value()))
    }

    /// Submit a command. Never blocks; the returned execution can be awaited
    /// from any runtime and cloned freely.
    ///
    /// The execution does not keep an owned runtime alive. If every engine
    /// handle is dropped before it settles, it resolves to
    /// [`CommandError::Abandoned`].
    pub fn execute<C: Command>(&self, command: C) -> Execution<C::Output> {
        self.submit(Arc::new(command))
    }

    /// Submit every command and return their executions in order.
    pub fn execute_all<C, I>(&self, commands: I) -> Vec<Execution<C::Output>>
    where
        C: Command,
        I: IntoIterator<Item = C>,
    {
        commands.into_iter().map(|c| self.execute(c)).collect()
    }

    /// Submit a command and block the calling thread until it settles.
    ///
    /// # Panics
    /// When called from inside an async runtime; await [`execute`](Self::execute) there.
    pub fn get<C: Command>(&self, command: C) -> CommandResult<C::Output> {
        let execution = self.execute(command);
        self.inner.executor.handle.block_on(execution)
    }

    /// Release the owned runtime, stop the collapser and clean the cache.
    ///
    /// Executions still pending resolve to [`CommandError::Abandoned`].
    pub fn shutdown(&self) {
        self.inner.executor.shutdown();
        if let Some(collapser) = &self.inner.collapser {
            collapser.stop();
        }
        if let Some(cache) = &self.inner.cache {
            cache.clean_up();
        }
        tracing::info!("Command engine shut down");
    }

    fn submit<C: Command>(&self, command: Arc<C>) -> Execution<C::Output> {
        let start = Instant::now();
        let name = command.name();
        let cache_key = command.cache_key();

        if let (Some(cache), Some(key)) = (&self.inner.cache, &cache_key) {
            if let Some(hit) = cache.get(key) {
                match hit.downcast_ref::<Execution<C::Output>>() {
                    Some(execution) => {
                        tracing::debug!(command = %name, key = %key, "Cache hit");
                        return execution.clone();
                    }
                    None => tracing::warn!(
                        command = %name,
                        key = %key,
                        "Cached value has a different output type, ignoring"
                    ),
                }
            }
        }

        let breaker = self.breaker_for(&name);
        if !breaker.allow_request() {
            tracing::debug!(command = %name, breaker = %breaker.key(), "Circuit open, request refused");
            metrics::record_rejection(&name, "circuit_open");
            return promise::ready(fallback_or(command.as_ref(), CommandError::CircuitOpen));
        }

        let limit = self.inner.allowed_concurrency;
        if self.inner.in_flight.load(Ordering::Acquire) >= limit {
            tracing::debug!(command = %name, limit, "Too many concurrent requests");
            metrics::record_rejection(&name, "too_many_requests");
            return promise::ready(fallback_or(
                command.as_ref(),
                CommandError::TooManyConcurrentRequests(limit),
            ));
        }

        let (promise, execution) = Promise::new();
        let request = Request {
            command,
            name,
            promise,
            breaker,
            start,
            handle: self.inner.executor.handle.clone(),
            in_flight: Arc::clone(&self.inner.in_flight),
            retry_config: self.inner.retry_config.clone(),
        };

        let (execution, direct) = match &self.inner.collapser {
            Some(collapser) => {
                let deferred = request.clone();
                match collapser.add(request.command.collapse_key(), &execution, move || deferred.run()) {
                    Some(collapsed) => (collapsed, None),
                    None => (execution, Some(request)),
                }
            }
            None => (execution, Some(request)),
        };

        if let (Some(cache), Some(key)) = (&self.inner.cache, cache_key) {
            cache.put(key, Arc::new(execution.clone()));
        }

        if let Some(request) = direct {
            request.run();
        }
        execution
    }

    fn breaker_for(&self, name: &str) -> Arc<CircuitBreaker> {
        let key = match self.inner.strategy {
            BreakerStrategy::UniquePerContext => DEFAULT_BREAKER_KEY,
            BreakerStrategy::UniquePerCommand => name,
        };
        if let Some(existing) = self.inner.breakers.get(key) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .inner
            .breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, &self.inner.breaker_config)));
        Arc::clone(entry.value())
    }
}

impl std::fmt::Debug for CommandEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEngine")
            .field("allowed_concurrency", &self.inner.allowed_concurrency)
            .field("strategy", &self.inner.strategy)
            .field("in_flight", &self.in_flight())
            .field("cache", &self.inner.cache.is_some())
            .field("collapser", &self.inner.collapser.is_some())
            .finish()
    }
}

/// Resolve to the command's fallback value, or `error` when it has none.
fn fallback_or<C: Command + ?Sized>(command: &C, error: CommandError) -> CommandResult<C::Output> {
    match command.fallback() {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(error),
        Err(fallback_error) => Err(CommandError::fallback(fallback_error)),
    }
}

/// Everything one admitted execution needs, detached from the engine.
struct Request<C: Command> {
    command: Arc<C>,
    name: Cow<'static, str>,
    promise: Promise<C::Output>,
    breaker: Arc<CircuitBreaker>,
    start: Instant,
    handle: Handle,
    in_flight: Arc<AtomicUsize>,
    retry_config: RetryConfig,
}

impl<C: Command> Clone for Request<C> {
    fn clone(&self) -> Self {
        Self {
            command: Arc::clone(&self.command),
            name: self.name.clone(),
            promise: self.promise.clone(),
            breaker: Arc::clone(&self.breaker),
            start: self.start,
            handle: self.handle.clone(),
            in_flight: Arc::clone(&self.in_flight),
            retry_config: self.retry_config.clone(),
        }
    }
}

impl<C: Command> Request<C> {
    /// Take an in-flight slot and race the retrying body against the deadline.
    fn run(self) {
        let Request {
            command,
            name,
            promise,
            breaker,
            start,
            handle,
            in_flight,
            retry_config,
        } = self;

        promise.hold(InFlightGuard::acquire(&in_flight));

        let timeout = command.timeout();
        let timer = {
            let command = Arc::clone(&command);
            let promise = promise.clone();
            let name = name.clone();
            timeouts::spawn_deadline(&handle, timeout, move || {
                if promise.is_settled() {
                    return;
                }
                let result = fallback_or(command.as_ref(), CommandError::Timeout(timeout));
                let outcome = outcome_label(&result, "timeout_fallback");
                if promise.try_complete(result) {
                    tracing::warn!(
                        command = %name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Command timed out"
                    );
                    metrics::record_command(&name, outcome, start.elapsed());
                }
            })
        };

        let attempts = command.retry().max(1);
        let exponential = command.exponential_backoff();
        handle.spawn(async move {
            let outcome =
                retries::retry(attempts, exponential, &retry_config, || command.run()).await;
            let elapsed = start.elapsed();

            let (result, ok_label) = match outcome {
                Ok(value) => {
                    breaker.mark_success(elapsed);
                    (Ok(value), "success")
                }
                Err(error) => {
                    breaker.mark_failure(elapsed);
                    tracing::debug!(
                        command = %name,
                        attempts,
                        error = %error,
                        "Command failed"
                    );
                    (
                        fallback_or(command.as_ref(), CommandError::execution(error)),
                        "fallback",
                    )
                }
            };

            let outcome = outcome_label(&result, ok_label);
            if promise.try_complete(result) {
                if let Some(timer) = timer {
                    timer.abort();
                }
                metrics::record_command(&name, outcome, elapsed);
            } else {
                tracing::debug!(
                    command = %name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Command finished after its result was settled, ignoring"
                );
            }
        });
    }
}

/// Metric label: `ok` for a value, the error kind otherwise.
fn outcome_label<T>(result: &CommandResult<T>, ok: &'static str) -> &'static str {
    match result {
        Ok(_) => ok,
        Err(e) => e.kind(),
    }
}
