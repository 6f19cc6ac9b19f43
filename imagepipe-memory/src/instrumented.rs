// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt::Debug, marker::PhantomData, sync::Arc};

use imagepipe_common::{
    code::{Key, Value},
    reference::CloseableReference,
};

use crate::cache::CountingMemoryCache;

/// The operations a pipeline stage needs from a memory cache.
pub trait MemoryCache<K, V>: Send + Sync + 'static {
    /// Cache the value for the key and return a client handle to it, `None` if the value is not admitted.
    fn cache(&self, key: K, value: &CloseableReference<V>) -> Option<CloseableReference<V>>;

    /// Get a client handle to the value of the key.
    fn get(&self, key: &K) -> Option<CloseableReference<V>>;

    /// Remove all entries whose key matches the predicate. Returns the count of removed entries.
    fn remove_all(&self, predicate: &dyn Fn(&K) -> bool) -> usize;

    /// Check if any cached key matches the predicate.
    fn contains(&self, predicate: &dyn Fn(&K) -> bool) -> bool;
}

impl<K, V> MemoryCache<K, V> for CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    fn cache(&self, key: K, value: &CloseableReference<V>) -> Option<CloseableReference<V>> {
        CountingMemoryCache::cache(self, key, value)
    }

    fn get(&self, key: &K) -> Option<CloseableReference<V>> {
        CountingMemoryCache::get(self, key)
    }

    fn remove_all(&self, predicate: &dyn Fn(&K) -> bool) -> usize {
        CountingMemoryCache::remove_all(self, predicate)
    }

    fn contains(&self, predicate: &dyn Fn(&K) -> bool) -> bool {
        CountingMemoryCache::contains(self, predicate)
    }
}

/// Hooks called on memory cache lookups and insertions.
pub trait MemoryCacheTracker: Send + Sync + 'static {
    /// A lookup found the key.
    fn on_cache_hit(&self) {}

    /// A lookup missed the key.
    fn on_cache_miss(&self) {}

    /// A value is offered to the cache, admitted or not.
    fn on_cache_put(&self) {}
}

/// A memory cache that reports hits, misses and puts to a tracker.
pub struct InstrumentedMemoryCache<K, V, C = CountingMemoryCache<K, V>> {
    cache: C,
    tracker: Arc<dyn MemoryCacheTracker>,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V, C> Debug for InstrumentedMemoryCache<K, V, C>
where
    C: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedMemoryCache").field("cache", &self.cache).finish()
    }
}

impl<K, V, C> InstrumentedMemoryCache<K, V, C>
where
    C: MemoryCache<K, V>,
{
    /// Wrap the cache.
    pub fn new(cache: C, tracker: Arc<dyn MemoryCacheTracker>) -> Self {
        Self {
            cache,
            tracker,
            _marker: PhantomData,
        }
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &C {
        &self.cache
    }
}

impl<K, V, C> MemoryCache<K, V> for InstrumentedMemoryCache<K, V, C>
where
    K: 'static,
    V: 'static,
    C: MemoryCache<K, V>,
{
    fn cache(&self, key: K, value: &CloseableReference<V>) -> Option<CloseableReference<V>> {
        self.tracker.on_cache_put();
        self.cache.cache(key, value)
    }

    fn get(&self, key: &K) -> Option<CloseableReference<V>> {
        let res = self.cache.get(key);
        match res {
            Some(_) => self.tracker.on_cache_hit(),
            None => self.tracker.on_cache_miss(),
        }
        res
    }

    fn remove_all(&self, predicate: &dyn Fn(&K) -> bool) -> usize {
        self.cache.remove_all(predicate)
    }

    fn contains(&self, predicate: &dyn Fn(&K) -> bool) -> bool {
        self.cache.contains(predicate)
    }
}
