//! Keyed asynchronous fetch cache with single-flight deduplication.
//!
//! This crate provides the fetch layer under content resolution. The core
//! type is [`FetchCache`], a process-wide map from [`CacheKey`] to
//! [`FetchState`] that guarantees at most one in-flight fetch per key:
//! concurrent [`request`](FetchCache::request) calls for the same key share
//! one fetch, and every caller observes the outcome through a
//! [`FetchTicket`].
//!
//! Terminal states ([`Success`](FetchState::Success) /
//! [`Failure`](FetchState::Failure)) are permanent for an entry's lifetime.
//! An entry's lifetime ends through explicit
//! [`invalidate`](FetchCache::invalidate) or through the configured
//! [`EvictionPolicy`]; the next access then starts a fresh entry at
//! [`Idle`](FetchState::Idle).
//!
//! Fetch work is supplied by [`Fetcher`] implementations. HTTP fetching goes
//! through the [`Transport`] trait, with [`HttpTransport`] for production and
//! [`MockTransport`] for tests.

mod cache;
mod clock;
mod error;
mod fetcher;
mod state;
mod transport;

pub use cache::{EvictionPolicy, FetchCache, FetchTicket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::FetchError;
pub use fetcher::{FetchFn, Fetcher};
pub use state::{CacheKey, FetchState};
pub use transport::{DEFAULT_TIMEOUT, HttpTransport, MockTransport, Transport};
