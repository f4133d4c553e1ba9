use std::fmt;
use std::sync::Arc;

use crate::error::FetchError;

/// Identity of one cached fetch.
///
/// Keys are chosen by the caller: the embed layer uses the source URL for
/// most content and the answer id for Stack Overflow answers, so different
/// URLs pointing at the same answer share one entry. The key is an
/// `Arc<str>` so tickets and cache entries can share it without copying.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle of one cache entry.
///
/// Entries move `Idle` to `Loading` to one of the terminal states, and a
/// terminal state never changes for the rest of the entry's lifetime.
/// Success bodies are `Arc<str>` because one body is typically handed to
/// several waiting tickets at once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchState {
    /// No fetch has been attempted for this entry.
    #[default]
    Idle,
    /// A fetch is in flight; exactly one task owns it.
    Loading,
    /// The fetch completed and produced a body.
    Success(Arc<str>),
    /// The fetch completed without a body.
    Failure(FetchError),
}

impl FetchState {
    /// True for [`Success`](Self::Success) and [`Failure`](Self::Failure).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failure(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The body, if the state is [`Success`](Self::Success).
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Success(body) => Some(body),
            _ => None,
        }
    }
}
