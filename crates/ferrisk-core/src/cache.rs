//! Short-lived in-memory caching.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};

/// How a call interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve a live entry when present; otherwise compute and store. (Default)
    #[default]
    Use,
    /// Skip the read but store the fresh result.
    Refresh,
    /// Neither read nor write.
    Bypass,
}

impl CacheMode {
    /// Mode for a caller's `use_cache` flag, given whether bypassing calls still write.
    pub const fn from_flags(use_cache: bool, write_on_bypass: bool) -> Self {
        match (use_cache, write_on_bypass) {
            (true, _) => Self::Use,
            (false, true) => Self::Refresh,
            (false, false) => Self::Bypass,
        }
    }

    pub const fn reads(self) -> bool {
        matches!(self, Self::Use)
    }

    pub const fn writes(self) -> bool {
        matches!(self, Self::Use | Self::Refresh)
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Key/value cache whose entries expire after a fixed time-to-live.
pub trait TtlCache<K, V>: Send + Sync {
    /// Live value for `key`; an expired entry is evicted and reported as a miss.
    fn get<'a>(&'a self, key: &'a K) -> BoxFuture<'a, Option<V>>;

    /// Stores `value`, replacing any previous entry and restarting its TTL.
    fn put<'a>(&'a self, key: K, value: V) -> BoxFuture<'a, ()>;

    /// Drops every expired entry and returns how many were removed.
    fn evict_expired<'a>(&'a self) -> BoxFuture<'a, usize>;
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

/// [`TtlCache`] backed by a `tokio` read/write lock.
#[derive(Debug, Clone)]
pub struct InMemoryTtlCache<K, V> {
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> InMemoryTtlCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn is_live(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) < self.ttl
    }
}

impl<K, V> TtlCache<K, V> for InMemoryTtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get<'a>(&'a self, key: &'a K) -> BoxFuture<'a, Option<V>> {
        Box::pin(async move {
            let now = self.clock.now();
            {
                let entries = self.entries.read().await;
                match entries.get(key) {
                    None => return None,
                    Some(entry) if self.is_live(entry, now) => return Some(entry.value.clone()),
                    Some(_) => {}
                }
            }

            let mut entries = self.entries.write().await;
            if entries
                .get(key)
                .is_some_and(|entry| !self.is_live(entry, now))
            {
                entries.remove(key);
            }
            None
        })
    }

    fn put<'a>(&'a self, key: K, value: V) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if self.ttl.is_zero() {
                return;
            }
            let created_at = self.clock.now();
            self.entries
                .write()
                .await
                .insert(key, CacheEntry { value, created_at });
        })
    }

    fn evict_expired<'a>(&'a self) -> BoxFuture<'a, usize> {
        Box::pin(async move {
            let now = self.clock.now();
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, entry| self.is_live(entry, now));
            before - entries.len()
        })
    }
}
