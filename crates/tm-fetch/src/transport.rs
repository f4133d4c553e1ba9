use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

/// Timeout applied to each request when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP GET abstraction used by fetchers.
///
/// Resolvers are written against this trait so tests can substitute
/// [`MockTransport`] and assert on the requested URLs without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` and returns the response body as text.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Production transport over a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::network(url, format!("status {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::network(url, e.to_string()))
    }
}

/// In-memory transport for tests.
///
/// Responses are registered per URL up front; every request is recorded so
/// tests can assert how often (and with what) the network was hit.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, Result<String, FetchError>>>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_response(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(url.into(), Ok(body.into()));
        self
    }

    #[must_use]
    pub fn with_error(self, url: impl Into<String>, error: FetchError) -> Self {
        self.insert(url.into(), Err(error));
        self
    }

    fn insert(&self, url: String, outcome: Result<String, FetchError>) {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(url, outcome);
    }

    /// Number of requests observed so far.
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(url.to_owned());
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::network(url, "no mock response")))
    }
}
