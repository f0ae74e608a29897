//! High-Performance In-Memory Result Cache
//!
//! Generic TTL cache used for every analysis layer (bytecode, token info,
//! verified source, composed reports). Built on DashMap for concurrent access
//! without a global lock.
//!
//! Features:
//! - TTL-based expiration, lazy on read plus a periodic sweep
//! - Keys built from `(kind, chain, address[, extra])`, address lower-cased
//! - At most one in-flight computation per key: concurrent callers share the
//!   same future and observe the same value or the same error
//! - Errors are never cached
//! - HIT/MISS/coalesce counters

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::models::config::ChainId;
use crate::models::errors::AppResult;

/// Cache key: `kind:chain:address[:extra]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: &'static str,
    pub chain: ChainId,
    pub address: String,
    pub extra: Option<String>,
}

impl CacheKey {
    pub fn new(kind: &'static str, chain: ChainId, address: impl AsRef<str>) -> Self {
        Self {
            kind,
            chain,
            address: address.as_ref().trim().to_lowercase(),
            extra: None,
        }
    }

    /// Sub-key, e.g. a pagination cursor
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.chain.as_str(), self.address)?;
        if let Some(extra) = &self.extra {
            write!(f, ":{}", extra)?;
        }
        Ok(())
    }
}

/// Cache entry with its expiry
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Remaining lifetime in seconds
    pub fn remaining_ttl(&self) -> u64 {
        self.expires_at
            .saturating_duration_since(Instant::now())
            .as_secs()
    }
}

type SharedResult<T> = Shared<BoxFuture<'static, AppResult<T>>>;

/// TTL cache with in-flight request coalescing
pub struct ResultCache<T> {
    /// Layer name for logs and stats
    name: &'static str,
    store: Arc<DashMap<String, CacheEntry<T>>>,
    inflight: Arc<DashMap<String, SharedResult<T>>>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    coalesced: Arc<AtomicU64>,
    computations: Arc<AtomicU64>,
}

impl<T> Clone for ResultCache<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            store: Arc::clone(&self.store),
            inflight: Arc::clone(&self.inflight),
            ttl: self.ttl,
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
            coalesced: Arc::clone(&self.coalesced),
            computations: Arc::clone(&self.computations),
        }
    }
}

impl<T> ResultCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            store: Arc::new(DashMap::new()),
            inflight: Arc::new(DashMap::new()),
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            coalesced: Arc::new(AtomicU64::new(0)),
            computations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get a live value. Expired entries are removed and count as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<T> {
        self.lookup(&key.to_string())
    }

    fn lookup(&self, key: &str) -> Option<T> {
        let expired = match self.store.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, key, ttl_left = entry.remaining_ttl(), "CACHE HIT");
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.store.remove_if(key, |_, entry| entry.is_expired());
            debug!(cache = self.name, key, "CACHE MISS (expired)");
        } else {
            debug!(cache = self.name, key, "CACHE MISS");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value with the cache's TTL
    pub fn insert(&self, key: &CacheKey, value: T) {
        let key = key.to_string();
        debug!(cache = self.name, key = %key, ttl_secs = self.ttl.as_secs(), "CACHE SET");
        self.store.insert(key, CacheEntry::new(value, self.ttl));
    }

    /// Return the cached value, or run `compute` once for all concurrent
    /// callers of the same key.
    ///
    /// Only `Ok` results are stored. If every waiter is dropped before the
    /// computation finishes, the computation is dropped with them and the
    /// next caller starts a fresh one.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, compute: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        self.get_or_compute_if(key, compute, |_| true).await
    }

    /// Like `get_or_compute`, but an `Ok` value is stored only when `keep`
    /// accepts it. Concurrent callers still share the one computation.
    pub async fn get_or_compute_if<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
        keep: fn(&T) -> bool,
    ) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let key = key.to_string();
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let shared = match self.inflight.entry(key.clone()) {
            Entry::Occupied(slot) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.name, key = %key, "CACHE COALESCE (joining in-flight computation)");
                slot.get().clone()
            }
            Entry::Vacant(slot) => {
                // A computation may have finished between lookup and here.
                if let Some(entry) = self.store.get(&key) {
                    if !entry.is_expired() {
                        return Ok(entry.value.clone());
                    }
                }

                self.computations.fetch_add(1, Ordering::Relaxed);
                let store = Arc::clone(&self.store);
                let inflight = Arc::clone(&self.inflight);
                let ttl = self.ttl;
                let name = self.name;
                let owned_key = key.clone();
                let work = compute();

                let task: BoxFuture<'static, AppResult<T>> = async move {
                    let result = work.await;
                    match &result {
                        Ok(value) if keep(value) => {
                            store.insert(owned_key.clone(), CacheEntry::new(value.clone(), ttl));
                            debug!(cache = name, key = %owned_key, ttl_secs = ttl.as_secs(), "CACHE SET");
                        }
                        Ok(_) => debug!(cache = name, key = %owned_key, "CACHE SKIP (not kept)"),
                        Err(_) => {}
                    }
                    inflight.remove(&owned_key);
                    result
                }
                .boxed();

                let shared = task.shared();
                slot.insert(shared.clone());
                shared
            }
        };

        let mut waiter = InflightWaiter {
            inflight: &self.inflight,
            key: &key,
            shared,
            finished: false,
        };
        let result = (&mut waiter.shared).await;
        waiter.finished = true;
        result
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            info!(cache = self.name, removed, "🧹 CACHE CLEANUP: expired entries removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            name: self.name,
            entries: self.store.len(),
            in_flight: self.inflight.len(),
            hits,
            misses,
            coalesced: self.coalesced.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            hit_rate,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Releases the in-flight slot when the last waiter goes away early
struct InflightWaiter<'a, T: Clone> {
    inflight: &'a DashMap<String, SharedResult<T>>,
    key: &'a str,
    shared: SharedResult<T>,
    finished: bool,
}

impl<T: Clone> Drop for InflightWaiter<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // The slot holds one handle and this waiter another.
        let mine = &self.shared;
        self.inflight.remove_if(self.key, |_, slot| {
            Shared::ptr_eq(slot, mine) && slot.strong_count().map_or(true, |n| n <= 2)
        });
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub computations: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}
