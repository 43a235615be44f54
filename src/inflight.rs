//! Request coalescing for artifact loads
//!
//! Every key has at most one outstanding fetch. Callers arriving while it is
//! pending await the same shared future and observe the same result. The
//! owning cache must be written before the shared future resolves; the
//! cache is then re-checked under the pending-table entry, so a caller can
//! never miss both the cache and the pending fetch.

use crate::error::LoadResult;
use crate::metrics;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::hash::Hash;
use std::sync::Arc;

type SharedLoad<V> = Shared<BoxFuture<'static, LoadResult<V>>>;

/// How a load call obtained its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Already cached; nothing was fetched
    Cache,
    /// This call issued the fetch
    Fetched,
    /// This call awaited a fetch issued by another caller
    Joined,
}

/// Result of an `ensure_*` operation
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: Arc<T>,
    pub source: LoadSource,
}

impl<T> Loaded<T> {
    pub fn new(value: Arc<T>, source: LoadSource) -> Self {
        Self { value, source }
    }

    pub fn was_cached(&self) -> bool {
        self.source == LoadSource::Cache
    }
}

impl<T> Clone for Loaded<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            source: self.source,
        }
    }
}

/// Cache state of a single artifact key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Empty,
    Pending,
    Loaded,
}

/// Table of pending loads keyed by `K`
pub struct InFlight<K, V> {
    kind: &'static str,
    pending: DashMap<K, SharedLoad<V>>,
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            pending: DashMap::new(),
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Return the cached value, join the pending fetch, or start a new one
    ///
    /// `start` must write its value into the cache consulted by `cached`
    /// before resolving.
    pub async fn load_or_join<C, S>(
        &self,
        key: K,
        cached: C,
        start: S,
    ) -> LoadResult<(LoadSource, V)>
    where
        C: Fn() -> Option<V>,
        S: FnOnce() -> BoxFuture<'static, LoadResult<V>>,
    {
        if let Some(value) = cached() {
            metrics::record_cache_hit(self.kind);
            return Ok((LoadSource::Cache, value));
        }

        let (source, load) = match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => {
                metrics::record_joined(self.kind);
                (LoadSource::Joined, entry.get().clone())
            }
            Entry::Vacant(entry) => {
                // A fetch may have completed between the first check and here
                if let Some(value) = cached() {
                    metrics::record_cache_hit(self.kind);
                    return Ok((LoadSource::Cache, value));
                }
                metrics::record_fetch(self.kind);
                let load = start().shared();
                entry.insert(load.clone());
                (LoadSource::Fetched, load)
            }
        };

        let settle = Settle {
            pending: &self.pending,
            key,
            load,
        };
        let result = settle.load.clone().await;
        settle.clear();

        if source == LoadSource::Fetched && result.is_err() {
            metrics::record_fetch_failure(self.kind);
        }

        result.map(|value| (source, value))
    }
}

/// Clears a pending entry once its load settles
///
/// A panicking load never settles, so the entry is also cleared while
/// unwinding. A caller that is merely dropped leaves it for the others.
struct Settle<'a, K: Eq + Hash, V> {
    pending: &'a DashMap<K, SharedLoad<V>>,
    key: K,
    load: SharedLoad<V>,
}

impl<K: Eq + Hash, V> Settle<'_, K, V> {
    fn clear(&self) {
        // Only clear our own entry; a retry may already have replaced it
        self.pending
            .remove_if(&self.key, |_, current| current.ptr_eq(&self.load));
    }
}

impl<K: Eq + Hash, V> Drop for Settle<'_, K, V> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.clear();
        }
    }
}
