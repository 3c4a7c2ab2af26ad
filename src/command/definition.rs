//! Command behaviour interface.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::command::error::BoxError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// One unit of work run through a [`CommandEngine`](crate::command::CommandEngine).
///
/// Commands describe work; they hold no execution state. Only `run` is
/// required, every other hook has the engine's default.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Breaker key under the per-command strategy.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }

    async fn run(&self) -> Result<Self::Output, BoxError>;

    /// Execution budget; [`FOREVER`](crate::resilience::FOREVER) disables the timer.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// `Ok(None)` means no fallback; `Err` means the fallback itself failed.
    fn fallback(&self) -> Result<Option<Self::Output>, BoxError> {
        Ok(None)
    }

    fn cache_key(&self) -> Option<String> {
        None
    }

    fn collapse_key(&self) -> Option<String> {
        self.cache_key()
    }

    /// Number of runs before giving up; 0 still runs once.
    fn retry(&self) -> u32 {
        0
    }

    fn exponential_backoff(&self) -> bool {
        true
    }
}

type Body<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync>;
type FallbackFn<T> = Arc<dyn Fn() -> Result<Option<T>, BoxError> + Send + Sync>;

/// Command assembled from closures instead of a dedicated type.
pub struct FnCommand<T> {
    name: Cow<'static, str>,
    body: Body<T>,
    fallback: Option<FallbackFn<T>>,
    timeout: Duration,
    cache_key: Option<String>,
    collapse_key: Option<String>,
    retry: u32,
    exponential_backoff: bool,
}

impl<T> FnCommand<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Command running an async body.
    pub fn new<F, Fut>(name: impl Into<Cow<'static, str>>, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(move || body().boxed()),
            fallback: None,
            timeout: DEFAULT_TIMEOUT,
            cache_key: None,
            collapse_key: None,
            retry: 0,
            exponential_backoff: true,
        }
    }

    /// Command running a synchronous body on the blocking thread pool.
    pub fn blocking<F>(name: impl Into<Cow<'static, str>>, body: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        Self::new(name, move || {
            let body = Arc::clone(&body);
            async move {
                match tokio::task::spawn_blocking(move || body()).await {
                    Ok(result) => result,
                    Err(join_error) => Err(Box::new(join_error) as BoxError),
                }
            }
        })
    }

    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn() -> Result<Option<T>, BoxError> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Fallback that always yields `value`.
    pub fn with_fallback_value(self, value: T) -> Self {
        self.with_fallback(move || Ok(Some(value.clone())))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_collapse_key(mut self, key: impl Into<String>) -> Self {
        self.collapse_key = Some(key.into());
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }
}

impl<T> Clone for FnCommand<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            body: Arc::clone(&self.body),
            fallback: self.fallback.clone(),
            timeout: self.timeout,
            cache_key: self.cache_key.clone(),
            collapse_key: self.collapse_key.clone(),
            retry: self.retry,
            exponential_backoff: self.exponential_backoff,
        }
    }
}

impl<T> std::fmt::Debug for FnCommand<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCommand")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("cache_key", &self.cache_key)
            .field("collapse_key", &self.collapse_key)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> Command for FnCommand<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    async fn run(&self) -> Result<T, BoxError> {
        (self.body)().await
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn fallback(&self) -> Result<Option<T>, BoxError> {
        match &self.fallback {
            Some(fallback) => fallback(),
            None => Ok(None),
        }
    }

    fn cache_key(&self) -> Option<String> {
        self.cache_key.clone()
    }

    fn collapse_key(&self) -> Option<String> {
        self.collapse_key.clone().or_else(|| self.cache_key.clone())
    }

    fn retry(&self) -> u32 {
        self.retry
    }

    fn exponential_backoff(&self) -> bool {
        self.exponential_backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hello;

    #[async_trait]
    impl Command for Hello {
        type Output = String;

        async fn run(&self) -> Result<String, BoxError> {
            Ok("Hello".to_string())
        }

        fn cache_key(&self) -> Option<String> {
            Some("hello".to_string())
        }
    }

    #[tokio::test]
    async fn test_trait_defaults() {
        let cmd = Hello;
        assert!(cmd.name().ends_with("Hello"));
        assert_eq!(cmd.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(cmd.retry(), 0);
        assert!(cmd.exponential_backoff());
        assert!(cmd.fallback().unwrap().is_none());
        assert_eq!(cmd.collapse_key(), Some("hello".to_string()));
        assert_eq!(cmd.run().await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_fn_command_builder() {
        let cmd = FnCommand::new("greet", || async { Ok(1u32) })
            .with_fallback_value(0)
            .with_cache_key("k")
            .with_retry(3)
            .with_exponential_backoff(false)
            .with_timeout(Duration::from_millis(5));

        assert_eq!(cmd.name(), "greet");
        assert_eq!(cmd.run().await.unwrap(), 1);
        assert_eq!(cmd.fallback().unwrap(), Some(0));
        assert_eq!(cmd.collapse_key(), Some("k".to_string()));
        assert_eq!(cmd.retry(), 3);
        assert!(!cmd.exponential_backoff());
        assert_eq!(cmd.timeout(), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_blocking_body() {
        let cmd = FnCommand::blocking("sync", || {
            std::thread::sleep(Duration::from_millis(5));
            Ok("done")
        });
        assert_eq!(cmd.run().await.unwrap(), "done");
    }
}
