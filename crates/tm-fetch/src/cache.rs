use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::state::{CacheKey, FetchState};

/// Controls when settled entries are discarded.
///
/// The default policy keeps entries for the life of the process, which
/// matches a per-session cache. Loading entries are never discarded by
/// policy; an in-flight fetch always gets to publish its outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    ttl: Option<Duration>,
    capacity: Option<usize>,
}

impl EvictionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards settled entries once they have been settled for `ttl`.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Caps the number of entries, discarding the oldest settled first.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// Keyed fetch cache with single-flight deduplication.
///
/// Each key owns one entry holding a [`FetchState`]. [`request`] moves an
/// `Idle` entry to `Loading` and spawns exactly one fetch task for it;
/// every caller, first or not, gets a [`FetchTicket`] observing the same
/// entry. Once the fetch settles the entry stays terminal until it is
/// [`invalidate`]d or evicted per the [`EvictionPolicy`], after which the
/// next access starts over at `Idle`.
///
/// The cache is `Clone` and shares its state across clones, so one instance
/// can serve every render in the process.
///
/// [`request`]: FetchCache::request
/// [`invalidate`]: FetchCache::invalidate
#[derive(Clone)]
pub struct FetchCache {
    inner: Arc<Inner>,
}

impl FetchCache {
    /// Cache that keeps settled entries forever.
    pub fn new() -> Self {
        Self::with_policy(EvictionPolicy::default())
    }

    pub fn with_policy(policy: EvictionPolicy) -> Self {
        Self::with_parts(policy, Arc::new(SystemClock))
    }

    /// Full constructor with an injected [`Clock`], used by tests to drive
    /// TTL expiry without sleeping.
    pub fn with_parts(policy: EvictionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                policy,
                clock,
            }),
        }
    }

    /// Current state for `key`.
    ///
    /// A key without a live entry reads as [`FetchState::Idle`]. This never
    /// starts a fetch.
    pub fn get(&self, key: impl Into<CacheKey>) -> FetchState {
        let key = key.into();
        let now = self.inner.clock.now();
        let mut entries = self.inner.lock_entries();
        self.inner.purge_expired(&mut entries, now);
        let entry = entries.entry(key).or_insert_with(|| Entry::new(now));
        let state = entry.state.borrow().clone();
        self.inner.enforce_capacity(&mut entries);
        state
    }

    /// Ensures a fetch is underway (or already settled) for `key` and
    /// returns a ticket observing the entry.
    ///
    /// If the entry is `Idle` this call claims it, moves it to `Loading`
    /// before returning, and spawns `fetcher` on the current Tokio runtime.
    /// If the entry is already `Loading` or terminal, `fetcher` is dropped
    /// unused and the ticket observes the existing entry. The claim happens
    /// under the map lock, so concurrent callers can never start two
    /// fetches for one key.
    pub fn request(&self, key: impl Into<CacheKey>, fetcher: Arc<dyn Fetcher>) -> FetchTicket {
        let key = key.into();
        let now = self.inner.clock.now();
        let (rx, claimed) = {
            let mut entries = self.inner.lock_entries();
            self.inner.purge_expired(&mut entries, now);
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(now));
            let rx = entry.state.subscribe();
            let claimed = matches!(*entry.state.borrow(), FetchState::Idle);
            if claimed {
                entry.state.send_replace(FetchState::Loading);
            }
            self.inner.enforce_capacity(&mut entries);
            (rx, claimed)
        };

        if claimed {
            tracing::debug!(key = %key, "fetch started");
            let inner = Arc::clone(&self.inner);
            let task_key = key.clone();
            tokio::spawn(async move {
                let outcome = fetcher.fetch().await;
                inner.complete(&task_key, outcome);
            });
        }

        FetchTicket { key, rx }
    }

    /// Ends the entry lifetime for `key` so the next access refetches.
    ///
    /// Only terminal entries can be invalidated; a `Loading` entry keeps
    /// its in-flight fetch and this returns `false`, as it does for keys
    /// with no live entry.
    pub fn invalidate(&self, key: impl Into<CacheKey>) -> bool {
        let key = key.into();
        let mut entries = self.inner.lock_entries();
        let terminal = entries
            .get(&key)
            .is_some_and(|entry| entry.state.borrow().is_terminal());
        if terminal {
            entries.remove(&key);
            tracing::debug!(key = %key, "entry invalidated");
        }
        terminal
    }
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
}

impl Inner {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Publishes the fetch outcome and marks the entry settled.
    fn complete(&self, key: &CacheKey, outcome: Result<String, FetchError>) {
        let mut entries = self.lock_entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        let state = match outcome {
            Ok(body) => {
                tracing::debug!(key = %key, bytes = body.len(), "fetch succeeded");
                FetchState::Success(Arc::from(body))
            }
            Err(error) => {
                tracing::debug!(key = %key, error = %error, "fetch failed");
                FetchState::Failure(error)
            }
        };
        entry.state.send_replace(state);
        entry.settled_at = Some(self.clock.now());
    }

    fn purge_expired(&self, entries: &mut HashMap<CacheKey, Entry>, now: Instant) {
        let Some(ttl) = self.policy.ttl else {
            return;
        };
        entries.retain(|_, entry| match entry.settled_at {
            Some(at) => now.duration_since(at) < ttl,
            None => true,
        });
    }

    fn enforce_capacity(&self, entries: &mut HashMap<CacheKey, Entry>) {
        let Some(capacity) = self.policy.capacity else {
            return;
        };
        while entries.len() > capacity {
            let oldest = entries
                .iter()
                .filter(|(_, entry)| !entry.state.borrow().is_loading())
                .min_by_key(|(_, entry)| entry.settled_at.unwrap_or(entry.created_at))
                .map(|(key, _)| key.clone());
            let Some(key) = oldest else {
                break;
            };
            tracing::debug!(key = %key, "entry evicted");
            entries.remove(&key);
        }
    }
}

struct Entry {
    state: watch::Sender<FetchState>,
    created_at: Instant,
    settled_at: Option<Instant>,
}

impl Entry {
    fn new(now: Instant) -> Self {
        let (state, _) = watch::channel(FetchState::Idle);
        Self {
            state,
            created_at: now,
            settled_at: None,
        }
    }
}

/// Handle observing one cache entry.
///
/// A ticket never holds the entry alive on its own; it sees whatever the
/// entry publishes, including the terminal state that was already current
/// when the ticket was issued.
pub struct FetchTicket {
    key: CacheKey,
    rx: watch::Receiver<FetchState>,
}

impl FetchTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// State at this instant, without waiting.
    pub fn state(&self) -> FetchState {
        self.rx.borrow().clone()
    }

    /// Waits until the entry reaches a terminal state and returns it.
    ///
    /// Returns immediately if the entry is already terminal. If the entry
    /// is removed while still loading, the last observed state is returned.
    pub async fn settled(&mut self) -> FetchState {
        let settled = self
            .rx
            .wait_for(FetchState::is_terminal)
            .await
            .map(|state| state.clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.rx.borrow().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use super::{EvictionPolicy, FetchCache};
    use crate::clock::ManualClock;
    use crate::error::FetchError;
    use crate::fetcher::Fetcher;
    use crate::state::FetchState;

    struct CountingFetcher {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.to_owned())
        }
    }

    /// Fetcher that blocks until the test releases it.
    struct GatedFetcher {
        body: &'static str,
        calls: AtomicUsize,
        gate: Notify,
    }

    impl GatedFetcher {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn release(&self) {
            self.gate.notify_one();
        }
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn fetch(&self) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(self.body.to_owned())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn fetch(&self) -> Result<String, FetchError> {
            Err(FetchError::network("https://example.com/a.md", "boom"))
        }
    }

    #[tokio::test]
    async fn unknown_keys_read_as_idle() {
        let cache = FetchCache::new();
        assert_eq!(cache.get("https://example.com/a.md"), FetchState::Idle);
    }

    #[tokio::test]
    async fn request_claims_the_entry_and_settles_it() {
        let cache = FetchCache::new();
        let mut ticket = cache.request("k", Arc::new(CountingFetcher::new("# body")));
        assert_eq!(ticket.state(), FetchState::Loading);
        assert_eq!(ticket.settled().await.body(), Some("# body"));
        assert_eq!(cache.get("k").body(), Some("# body"));
    }

    #[tokio::test]
    async fn failures_settle_the_entry() {
        let cache = FetchCache::new();
        let mut ticket = cache.request("k", Arc::new(FailingFetcher));
        assert_eq!(
            ticket.settled().await,
            FetchState::Failure(FetchError::network("https://example.com/a.md", "boom"))
        );
        assert!(cache.get("k").is_terminal());
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let cache = FetchCache::new();
        let fetcher = Arc::new(GatedFetcher::new("body"));

        let mut first = cache.request("k", Arc::<GatedFetcher>::clone(&fetcher));
        let mut second = cache.request("k", Arc::<GatedFetcher>::clone(&fetcher));
        assert_eq!(first.state(), FetchState::Loading);
        assert_eq!(second.state(), FetchState::Loading);

        fetcher.release();
        assert_eq!(first.settled().await.body(), Some("body"));
        assert_eq!(second.settled().await.body(), Some("body"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn racing_tasks_share_one_fetch() {
        let cache = FetchCache::new();
        let fetcher = Arc::new(CountingFetcher::new("body"));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let fetcher = Arc::clone(&fetcher);
            handles.push(tokio::spawn(async move {
                cache.request("k", fetcher).settled().await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().body(), Some("body"));
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn terminal_entries_are_never_refetched() {
        let cache = FetchCache::new();
        let fetcher = Arc::new(CountingFetcher::new("body"));

        cache.request("k", Arc::<CountingFetcher>::clone(&fetcher)).settled().await;
        let mut again = cache.request("k", Arc::<CountingFetcher>::clone(&fetcher));
        assert_eq!(again.settled().await.body(), Some("body"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn invalidate_ends_the_entry_lifetime() {
        let cache = FetchCache::new();
        let fetcher = Arc::new(CountingFetcher::new("body"));

        cache.request("k", Arc::<CountingFetcher>::clone(&fetcher)).settled().await;
        assert!(cache.invalidate("k"));
        assert_eq!(cache.get("k"), FetchState::Idle);

        cache.request("k", Arc::<CountingFetcher>::clone(&fetcher)).settled().await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_leaves_loading_entries_alone() {
        let cache = FetchCache::new();
        let fetcher = Arc::new(GatedFetcher::new("body"));

        let mut ticket = cache.request("k", Arc::<GatedFetcher>::clone(&fetcher));
        assert!(!cache.invalidate("k"));
        assert_eq!(ticket.state(), FetchState::Loading);

        fetcher.release();
        assert_eq!(ticket.settled().await.body(), Some("body"));
    }

    #[tokio::test]
    async fn invalidate_without_an_entry_is_a_noop() {
        let cache = FetchCache::new();
        assert!(!cache.invalidate("never-seen"));
    }

    #[tokio::test]
    async fn ttl_expires_settled_entries() {
        let clock = Arc::new(ManualClock::new());
        let cache = FetchCache::with_parts(
            EvictionPolicy::new().ttl(Duration::from_secs(60)),
            Arc::<ManualClock>::clone(&clock),
        );
        let fetcher = Arc::new(CountingFetcher::new("body"));

        cache.request("k", Arc::<CountingFetcher>::clone(&fetcher)).settled().await;
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("k").body(), Some("body"));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get("k"), FetchState::Idle);
    }

    #[tokio::test]
    async fn capacity_evicts_the_oldest_settled_entry() {
        let clock = Arc::new(ManualClock::new());
        let cache =
            FetchCache::with_parts(EvictionPolicy::new().capacity(2), Arc::<ManualClock>::clone(&clock));

        cache.request("a", Arc::new(CountingFetcher::new("a"))).settled().await;
        clock.advance(Duration::from_secs(1));
        cache.request("b", Arc::new(CountingFetcher::new("b"))).settled().await;
        clock.advance(Duration::from_secs(1));
        cache.request("c", Arc::new(CountingFetcher::new("c"))).settled().await;

        assert_eq!(cache.get("b").body(), Some("b"));
        assert_eq!(cache.get("c").body(), Some("c"));
        assert_eq!(cache.get("a"), FetchState::Idle);
    }

    #[tokio::test]
    async fn loading_entries_survive_capacity_pressure() {
        let cache = FetchCache::with_policy(EvictionPolicy::new().capacity(1));
        let gated = Arc::new(GatedFetcher::new("x"));

        let mut loading = cache.request("x", Arc::<GatedFetcher>::clone(&gated));
        cache.request("y", Arc::new(CountingFetcher::new("y"))).settled().await;

        assert_eq!(cache.get("x"), FetchState::Loading);
        gated.release();
        assert_eq!(loading.settled().await.body(), Some("x"));
    }

    #[tokio::test]
    async fn tickets_issued_after_settling_resolve_immediately() {
        let cache = FetchCache::new();
        let fetcher = Arc::new(CountingFetcher::new("body"));

        cache.request("k", Arc::<CountingFetcher>::clone(&fetcher)).settled().await;
        let mut late = cache.request("k", Arc::<CountingFetcher>::clone(&fetcher));
        assert_eq!(late.state().body(), Some("body"));
        assert_eq!(late.settled().await.body(), Some("body"));
        assert_eq!(late.key().as_str(), "k");
    }
}
