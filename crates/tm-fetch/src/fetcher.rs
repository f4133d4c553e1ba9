use async_trait::async_trait;

use crate::error::FetchError;

/// Work handed to the cache when an entry needs loading.
///
/// The cache invokes the fetcher at most once per entry lifetime, on the
/// task that wins the `Idle` to `Loading` claim. Implementations hold
/// whatever they need to produce the body (transport, parsed directive,
/// credentials) and must be shareable across tasks.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Adapter that turns an async closure into a [`Fetcher`].
pub struct FetchFn<F> {
    f: F,
}

impl<F> FetchFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Fetcher for FetchFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, FetchError>> + Send,
{
    async fn fetch(&self) -> Result<String, FetchError> {
        (self.f)().await
    }
}
