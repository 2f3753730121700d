use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

/// Five minutes, shared by the repo-config and catalog caches.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Key for per-repository entries (repo config).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoKey {
    pub owner: String,
    pub repo: String,
}

impl RepoKey {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self { owner: owner.to_string(), repo: repo.to_string() }
    }
}

/// Lets `clear_matching` scope removals to an owner or a single repository.
pub trait RepoScoped {
    fn owner(&self) -> &str;
    fn repo(&self) -> &str;
}

impl RepoScoped for RepoKey {
    fn owner(&self) -> &str {
        &self.owner
    }
    fn repo(&self) -> &str {
        &self.repo
    }
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// In-progress fetch for one key. Every caller that joins it gets the leader's outcome.
type Flight<V, E> = Arc<OnceCell<Result<V, E>>>;

/// A map of values that go stale `ttl` after insertion.
///
/// Expired entries are dropped on the next lookup; there is no background sweep. Misses that go
/// through [`TtlCache::get_or_try_insert_with`] are coalesced per key so concurrent callers share a
/// single fetch, including its error.
pub struct TtlCache<K, V, E = Infallible> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
    in_flight: Mutex<HashMap<K, Flight<V, E>>>,
}

impl<K, V, E> TtlCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let fresh = entries.get(key).map(|e| e.stored_at.elapsed() < self.ttl)?;
        if fresh {
            entries.get(key).map(|e| e.value.clone())
        } else {
            entries.remove(key);
            tracing::debug!("cache entry expired");
            None
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.lock().insert(key, Entry { value, stored_at: Instant::now() });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Returns the cached value or runs `fetch` once for this key, caching an `Ok` result.
    ///
    /// Callers that arrive while a fetch is running wait for it and receive the same result, `Err`
    /// included. Errors are not cached; the first caller after the flight ends retries.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let flight: Flight<V, E> = self.in_flight.lock().entry(key.clone()).or_default().clone();
        let result = flight
            .get_or_init(|| async {
                // An earlier flight may have filled the entry after our miss.
                if let Some(hit) = self.get(&key) {
                    return Ok(hit);
                }
                let result = fetch().await;
                if let Ok(value) = &result {
                    self.insert(key.clone(), value.clone());
                }
                result
            })
            .await
            .clone();

        let mut in_flight = self.in_flight.lock();
        if in_flight.get(&key).is_some_and(|current| Arc::ptr_eq(current, &flight)) {
            in_flight.remove(&key);
        }
        result
    }
}

impl<K, V, E> TtlCache<K, V, E>
where
    K: Eq + Hash + Clone + RepoScoped,
    V: Clone,
    E: Clone,
{
    /// Drops everything, one owner's entries, or one repository's entries.
    pub fn clear_matching(&self, owner: Option<&str>, repo: Option<&str>) {
        let Some(owner) = owner else {
            self.clear();
            return;
        };
        self.entries.lock().retain(|key, _| {
            let same_owner = key.owner() == owner;
            match repo {
                Some(repo) => !(same_owner && key.repo() == repo),
                None => !same_owner,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache: TtlCache<RepoKey, u32> = TtlCache::new(Duration::from_secs(10));
        cache.insert(RepoKey::new("o", "r"), 1u32);
        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get(&RepoKey::new("o", "r")), Some(1));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&RepoKey::new("o", "r")), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn keys_do_not_collide_on_slashes() {
        let cache: TtlCache<RepoKey, u32> = TtlCache::new(DEFAULT_TTL);
        cache.insert(RepoKey::new("a/b", "c"), 1u32);
        cache.insert(RepoKey::new("a", "b/c"), 2u32);
        assert_eq!(cache.get(&RepoKey::new("a/b", "c")), Some(1));
        assert_eq!(cache.get(&RepoKey::new("a", "b/c")), Some(2));
    }

    #[test]
    fn clear_matching_scopes() {
        let cache: TtlCache<RepoKey, u32> = TtlCache::new(DEFAULT_TTL);
        cache.insert(RepoKey::new("o1", "r1"), 1u32);
        cache.insert(RepoKey::new("o1", "r2"), 2);
        cache.insert(RepoKey::new("o2", "r1"), 3);

        cache.clear_matching(Some("o1"), Some("r1"));
        assert_eq!(cache.len(), 2);
        cache.clear_matching(Some("o1"), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&RepoKey::new("o2", "r1")), Some(3));
        cache.clear_matching(None, None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let cache: Arc<TtlCache<RepoKey, u32, ()>> = Arc::new(TtlCache::new(DEFAULT_TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            async move {
                cache
                    .get_or_try_insert_with(RepoKey::new("o", "r"), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok::<_, ()>(7u32)
                    })
                    .await
            }
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(|r| *r == Ok(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache: TtlCache<RepoKey, u32, &str> = TtlCache::new(DEFAULT_TTL);
        let key = RepoKey::new("o", "r");
        let first = cache.get_or_try_insert_with(key.clone(), || async { Err("boom") }).await;
        assert_eq!(first, Err("boom"));
        let second = cache.get_or_try_insert_with(key, || async { Ok::<_, &str>(3) }).await;
        assert_eq!(second, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_a_failed_fetch() {
        let cache: Arc<TtlCache<RepoKey, u32, String>> = Arc::new(TtlCache::new(DEFAULT_TTL));
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let tasks = (0..8).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            async move {
                cache
                    .get_or_try_insert_with(RepoKey::new("o", "r"), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Err::<u32, _>("upstream 502".to_string())
                    })
                    .await
            }
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(|r| r.as_ref().err().map(String::as_str) == Some("upstream 502")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(cache.in_flight.lock().is_empty());

        // The failure is not remembered once the flight is over.
        let retry = cache.get_or_try_insert_with(RepoKey::new("o", "r"), || async { Ok::<_, String>(5) }).await;
        assert_eq!(retry, Ok(5));
    }
}
