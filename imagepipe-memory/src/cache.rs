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

use std::{
    borrow::Borrow,
    fmt::Debug,
    hash::Hash,
    marker::PhantomData,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Weak,
    },
    time::{Duration, Instant},
};

use imagepipe_common::{
    code::{Key, Value},
    memory::{MemoryTrimType, MemoryTrimmable},
    reference::CloseableReference,
    strict_assert, strict_assert_eq,
    supplier::{InstanceSupplier, Supplier},
};
use itertools::Itertools;
use parking_lot::Mutex;

use crate::{
    descriptor::{EntryStateObserver, ValueDescriptor},
    lru_map::CountingLruMap,
    params::MemoryCacheParams,
    trim::{CacheTrimStrategy, NativeMemoryCacheTrimStrategy},
};

/// Default interval between two polls of the params supplier.
pub const PARAMS_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A cached entry.
///
/// `client_count` and `orphan` are only mutated with the cache lock held.
struct Entry<K, V> {
    key: K,
    size: usize,
    value: Mutex<Option<CloseableReference<V>>>,
    client_count: AtomicUsize,
    orphan: AtomicBool,
    observer: Option<Arc<dyn EntryStateObserver<K>>>,
}

impl<K, V> Entry<K, V> {
    fn new(
        key: K,
        size: usize,
        value: CloseableReference<V>,
        observer: Option<Arc<dyn EntryStateObserver<K>>>,
    ) -> Self {
        Self {
            key,
            size,
            value: Mutex::new(Some(value)),
            client_count: AtomicUsize::new(0),
            orphan: AtomicBool::new(false),
            observer,
        }
    }

    fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Acquire)
    }

    fn is_orphan(&self) -> bool {
        self.orphan.load(Ordering::Acquire)
    }

    fn is_valid(&self) -> bool {
        self.value.lock().is_some()
    }
}

struct CacheState<K, V> {
    /// Entries with no client, in eviction order. A subset of `cached_entries`.
    exclusive_entries: CountingLruMap<K, Arc<Entry<K, V>>>,
    cached_entries: CountingLruMap<K, Arc<Entry<K, V>>>,
    params: MemoryCacheParams,
    last_params_check: Instant,
}

impl<K, V> CacheState<K, V>
where
    K: Key,
    V: Value,
{
    fn in_use_count(&self) -> usize {
        self.cached_entries.count() - self.exclusive_entries.count()
    }

    fn in_use_size_in_bytes(&self) -> usize {
        self.cached_entries.size_in_bytes() - self.exclusive_entries.size_in_bytes()
    }

    fn can_cache_new_value(&self, size: usize) -> bool {
        size <= self.params.max_cache_entry_size
            && self.in_use_count() < self.params.max_cache_entries
            && self.in_use_size_in_bytes().saturating_add(size) <= self.params.max_cache_size
    }

    fn increase_client_count(&self, entry: &Entry<K, V>) {
        strict_assert!(!entry.is_orphan());
        entry.client_count.fetch_add(1, Ordering::AcqRel);
    }

    fn decrease_client_count(&self, entry: &Entry<K, V>) {
        let count = entry.client_count();
        strict_assert!(count > 0, "client count underflow, key: {:?}", entry.key);
        entry.client_count.store(count.saturating_sub(1), Ordering::Release);
    }

    fn make_orphan(&self, entry: &Entry<K, V>) {
        strict_assert!(!entry.is_orphan(), "entry is already an orphan, key: {:?}", entry.key);
        entry.orphan.store(true, Ordering::Release);
    }

    fn make_orphans(&self, entries: &[Arc<Entry<K, V>>]) {
        entries.iter().for_each(|entry| self.make_orphan(entry));
    }

    /// Adds the entry to the eviction queue if it is tracked, clientless and holds a value.
    fn maybe_add_to_exclusives(&self, entry: &Arc<Entry<K, V>>) -> bool {
        if !entry.is_orphan() && entry.client_count() == 0 && entry.is_valid() {
            self.exclusive_entries.put(entry.key.clone(), entry.clone());
            true
        } else {
            false
        }
    }

    /// Takes the value of an orphan that no client holds anymore.
    fn reference_to_close(&self, entry: &Entry<K, V>) -> Option<CloseableReference<V>> {
        if entry.is_orphan() && entry.client_count() == 0 {
            entry.value.lock().take()
        } else {
            None
        }
    }

    fn references_to_close(&self, entries: &[Arc<Entry<K, V>>]) -> Vec<CloseableReference<V>> {
        entries.iter().filter_map(|entry| self.reference_to_close(entry)).collect()
    }

    /// Removes the oldest exclusive entries until the eviction queue fits both bounds.
    fn trim_exclusively_owned_entries(&self, count: usize, size: usize) -> Vec<Arc<Entry<K, V>>> {
        let mut old_entries = vec![];
        while self.exclusive_entries.count() > count || self.exclusive_entries.size_in_bytes() > size {
            let Some(key) = self.exclusive_entries.first_key() else {
                break;
            };
            self.exclusive_entries.remove(&key);
            if let Some(entry) = self.cached_entries.remove(&key) {
                old_entries.push(entry);
            }
        }
        old_entries
    }
}

struct CacheInner<K, V> {
    state: Mutex<CacheState<K, V>>,
    value_descriptor: Arc<dyn ValueDescriptor<V>>,
    trim_strategy: Arc<dyn CacheTrimStrategy>,
    params_supplier: Arc<dyn Supplier<MemoryCacheParams>>,
    params_check_interval: Duration,
}

/// A memory cache that counts the clients of each entry.
///
/// Values are shared with [`CloseableReference`]s. The cache keeps its own handle to each value and hands out one
/// client handle per [`CountingMemoryCache::cache`] or [`CountingMemoryCache::get`]. An entry with no client is
/// *exclusively owned* by the cache: it enters the eviction queue, and can be evicted or reused. An entry removed
/// from the cache while clients still hold it becomes an *orphan*, its value is released when the last client handle
/// is closed.
///
/// State is mutated with the cache lock held. Values are released and observers are called after the lock is
/// released.
pub struct CountingMemoryCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for CountingMemoryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Debug for CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CountingMemoryCache")
            .field("count", &state.cached_entries.count())
            .field("size_in_bytes", &state.cached_entries.size_in_bytes())
            .field("eviction_queue_count", &state.exclusive_entries.count())
            .field("eviction_queue_size_in_bytes", &state.exclusive_entries.size_in_bytes())
            .field("params", &state.params)
            .finish()
    }
}

impl<K, V> CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    /// Caches the value for the key and returns a client handle to it.
    ///
    /// The cache clones the given handle, closing the given handle afterwards does not affect the cached value. Any
    /// previous entry of the key is replaced, it is released once its clients are gone.
    ///
    /// Returns `None` if the value cannot be admitted: it is larger than the max entry size, or the in-use entries
    /// leave no room for it.
    ///
    /// # Panics
    ///
    /// Panics if the given handle is closed.
    pub fn cache(&self, key: K, value: &CloseableReference<V>) -> Option<CloseableReference<V>> {
        self.cache_with_observer(key, value, None)
    }

    /// Same as [`CountingMemoryCache::cache`], with an observer notified when the entry enters or leaves the
    /// eviction queue.
    pub fn cache_with_observer(
        &self,
        key: K,
        value: &CloseableReference<V>,
        observer: Option<Arc<dyn EntryStateObserver<K>>>,
    ) -> Option<CloseableReference<V>> {
        self.inner.maybe_update_cache_params();

        let size = (self.inner.value_descriptor)(value.get());

        let (old_exclusive, old_reference, client_reference) = {
            let state = self.inner.state.lock();

            let old_exclusive = state.exclusive_entries.remove(&key);
            let old_reference = state.cached_entries.remove(&key).and_then(|old| {
                state.make_orphan(&old);
                state.reference_to_close(&old)
            });

            let client_reference = if state.can_cache_new_value(size) {
                let entry = Arc::new(Entry::new(key.clone(), size, value.clone(), observer));
                state.cached_entries.put(key, entry.clone());
                self.new_client_reference(&state, &entry)
            } else {
                tracing::trace!("[counting memory cache]: reject value, key: {key:?}, size: {size}");
                None
            };

            (old_exclusive, old_reference, client_reference)
        };

        // Release data out of the lock critical section.
        CloseableReference::close_safely(old_reference);
        CacheInner::<K, V>::maybe_notify_exclusive_entry_removal(old_exclusive.as_ref());

        self.inner.maybe_evict_entries();

        client_reference
    }

    /// Gets a client handle to the value of the key.
    pub fn get<Q>(&self, key: &Q) -> Option<CloseableReference<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (old_exclusive, client_reference) = {
            let state = self.inner.state.lock();

            let old_exclusive = state.exclusive_entries.remove(key);
            let client_reference = state
                .cached_entries
                .get(key)
                .and_then(|entry| self.new_client_reference(&state, &entry));

            (old_exclusive, client_reference)
        };

        CacheInner::<K, V>::maybe_notify_exclusive_entry_removal(old_exclusive.as_ref());
        self.inner.maybe_update_cache_params();
        self.inner.maybe_evict_entries();

        client_reference
    }

    /// Takes the value of an exclusively owned entry out of the cache.
    ///
    /// The cache's own handle is moved to the caller, so the value is not released. Returns `None` if the key is
    /// not cached or has clients.
    pub fn reuse<Q>(&self, key: &Q) -> Option<CloseableReference<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (old_exclusive, reference) = {
            let state = self.inner.state.lock();

            let old_exclusive = state.exclusive_entries.remove(key)?;
            let reference = state.cached_entries.remove(key).and_then(|entry| {
                strict_assert!(Arc::ptr_eq(&entry, &old_exclusive));
                strict_assert_eq!(entry.client_count(), 0);
                state.make_orphan(&entry);
                entry.value.lock().take()
            });

            (old_exclusive, reference)
        };

        CacheInner::<K, V>::maybe_notify_exclusive_entry_removal(Some(&old_exclusive));

        reference
    }

    /// Removes all entries whose key matches the predicate. Returns the count of removed entries.
    ///
    /// Entries still held by clients are released once their clients are gone.
    pub fn remove_all<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let (old_exclusives, old_entries, references) = {
            let state = self.inner.state.lock();

            let old_exclusives = state.exclusive_entries.remove_all(&predicate);
            let old_entries = state.cached_entries.remove_all(&predicate);
            state.make_orphans(&old_entries);
            let references = state.references_to_close(&old_entries);

            (old_exclusives, old_entries, references)
        };

        // Release data out of the lock critical section.
        CloseableReference::close_all(references);
        old_exclusives
            .iter()
            .for_each(|entry| CacheInner::<K, V>::maybe_notify_exclusive_entry_removal(Some(entry)));

        self.inner.maybe_update_cache_params();
        self.inner.maybe_evict_entries();

        old_entries.len()
    }

    /// Removes all entries. Returns the count of removed entries.
    pub fn clear(&self) -> usize {
        self.remove_all(|_| true)
    }

    /// Checks if any cached key matches the predicate.
    pub fn contains<P>(&self, predicate: P) -> bool
    where
        P: Fn(&K) -> bool,
    {
        !self
            .inner
            .state
            .lock()
            .cached_entries
            .get_matching_entries(predicate)
            .is_empty()
    }

    /// Checks if the key is cached.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.state.lock().cached_entries.contains(key)
    }

    /// Evicts exclusively owned entries according to the trim strategy.
    ///
    /// Entries held by clients are never trimmed.
    pub fn trim(&self, trim_type: MemoryTrimType) {
        self.inner.trim(trim_type)
    }

    /// Polls the params supplier now, regardless of the check interval.
    ///
    /// The new params are enforced by the next cache operation.
    pub fn force_update_cache_params(&self) {
        let params = self.inner.params_supplier.get();
        let mut state = self.inner.state.lock();
        state.params = params;
        state.last_params_check = Instant::now();
    }

    /// Current params.
    pub fn params(&self) -> MemoryCacheParams {
        self.inner.state.lock().params
    }

    /// Count of the cached entries, in use or not.
    pub fn count(&self) -> usize {
        self.inner.state.lock().cached_entries.count()
    }

    /// Total size of the cached entries, in use or not.
    pub fn size_in_bytes(&self) -> usize {
        self.inner.state.lock().cached_entries.size_in_bytes()
    }

    /// Count of the cached entries held by clients.
    pub fn in_use_count(&self) -> usize {
        self.inner.state.lock().in_use_count()
    }

    /// Total size of the cached entries held by clients.
    pub fn in_use_size_in_bytes(&self) -> usize {
        self.inner.state.lock().in_use_size_in_bytes()
    }

    /// Count of the entries in the eviction queue.
    pub fn eviction_queue_count(&self) -> usize {
        self.inner.state.lock().exclusive_entries.count()
    }

    /// Total size of the entries in the eviction queue.
    pub fn eviction_queue_size_in_bytes(&self) -> usize {
        self.inner.state.lock().exclusive_entries.size_in_bytes()
    }

    /// A weak handle that trims the cache for as long as any clone of the cache is alive.
    ///
    /// Register it with a [`MemoryTrimmableRegistry`] without keeping the cache alive.
    ///
    /// [`MemoryTrimmableRegistry`]: imagepipe_common::memory::MemoryTrimmableRegistry
    pub fn downgrade_trimmable(&self) -> Weak<dyn MemoryTrimmable> {
        let inner: Arc<dyn MemoryTrimmable> = self.inner.clone();
        Arc::downgrade(&inner)
    }

    fn new_client_reference(
        &self,
        state: &CacheState<K, V>,
        entry: &Arc<Entry<K, V>>,
    ) -> Option<CloseableReference<V>> {
        let value = entry.value.lock();
        let reference = value.as_ref()?;
        state.increase_client_count(entry);

        let cache = self.clone();
        let entry = entry.clone();
        Some(reference.derive(move || cache.release_client_reference(&entry)))
    }

    fn release_client_reference(&self, entry: &Arc<Entry<K, V>>) {
        let (reference, is_exclusive) = {
            let state = self.inner.state.lock();

            state.decrease_client_count(entry);
            let is_exclusive = state.maybe_add_to_exclusives(entry);
            let reference = state.reference_to_close(entry);

            (reference, is_exclusive)
        };

        // Release data out of the lock critical section.
        CloseableReference::close_safely(reference);
        if is_exclusive {
            CacheInner::<K, V>::notify_exclusivity_changed(entry, true);
        }

        self.inner.maybe_update_cache_params();
        self.inner.maybe_evict_entries();
    }
}

impl<K, V> CacheInner<K, V>
where
    K: Key,
    V: Value,
{
    fn trim(&self, trim_type: MemoryTrimType) {
        let ratio = self.trim_strategy.trim_ratio(trim_type);

        let (old_entries, references) = {
            let state = self.state.lock();

            let target_cache_size = (state.cached_entries.size_in_bytes() as f64 * (1.0 - ratio)) as usize;
            let target_eviction_queue_size = target_cache_size.saturating_sub(state.in_use_size_in_bytes());
            let old_entries = state.trim_exclusively_owned_entries(usize::MAX, target_eviction_queue_size);
            state.make_orphans(&old_entries);
            let references = state.references_to_close(&old_entries);

            (old_entries, references)
        };

        tracing::debug!(
            "[counting memory cache]: trim {} entries, trim type: {trim_type:?}, ratio: {ratio}",
            old_entries.len()
        );

        // Release data out of the lock critical section.
        CloseableReference::close_all(references);
        old_entries
            .iter()
            .for_each(|entry| Self::maybe_notify_exclusive_entry_removal(Some(entry)));

        self.maybe_update_cache_params();
        self.maybe_evict_entries();
    }

    fn maybe_evict_entries(&self) {
        let (old_entries, references) = {
            let state = self.state.lock();

            let max_count = state
                .params
                .max_eviction_queue_entries
                .min(state.params.max_cache_entries.saturating_sub(state.in_use_count()));
            let max_size = state
                .params
                .max_eviction_queue_size
                .min(state.params.max_cache_size.saturating_sub(state.in_use_size_in_bytes()));
            let old_entries = state.trim_exclusively_owned_entries(max_count, max_size);
            state.make_orphans(&old_entries);
            let references = state.references_to_close(&old_entries);

            (old_entries, references)
        };

        if old_entries.is_empty() {
            return;
        }

        tracing::debug!(
            "[counting memory cache]: evict entries: {:?}",
            old_entries.iter().map(|entry| &entry.key).collect_vec()
        );

        // Release data out of the lock critical section.
        CloseableReference::close_all(references);
        old_entries
            .iter()
            .for_each(|entry| Self::maybe_notify_exclusive_entry_removal(Some(entry)));
    }

    fn maybe_update_cache_params(&self) {
        {
            let mut state = self.state.lock();
            if state.last_params_check.elapsed() < self.params_check_interval {
                return;
            }
            state.last_params_check = Instant::now();
        }

        // Call the supplier out of the lock critical section.
        let params = self.params_supplier.get();
        tracing::trace!("[counting memory cache]: update params: {params:?}");
        self.state.lock().params = params;
    }

    fn maybe_notify_exclusive_entry_removal(entry: Option<&Arc<Entry<K, V>>>) {
        if let Some(entry) = entry {
            Self::notify_exclusivity_changed(entry, false);
        }
    }

    fn notify_exclusivity_changed(entry: &Entry<K, V>, is_exclusive: bool) {
        let Some(observer) = entry.observer.as_ref() else {
            return;
        };
        let res = catch_unwind(AssertUnwindSafe(|| {
            observer.on_exclusivity_changed(&entry.key, is_exclusive)
        }));
        if res.is_err() {
            tracing::error!(
                "[counting memory cache]: entry state observer panicked, key: {:?}, exclusive: {is_exclusive}",
                entry.key
            );
        }
    }
}

impl<K, V> MemoryTrimmable for CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    fn trim(&self, trim_type: MemoryTrimType) {
        self.inner.trim(trim_type)
    }
}

impl<K, V> MemoryTrimmable for CacheInner<K, V>
where
    K: Key,
    V: Value,
{
    fn trim(&self, trim_type: MemoryTrimType) {
        CacheInner::trim(self, trim_type)
    }
}

/// Builder of a [`CountingMemoryCache`].
pub struct CountingMemoryCacheBuilder<K, V> {
    params_supplier: Arc<dyn Supplier<MemoryCacheParams>>,
    value_descriptor: Arc<dyn ValueDescriptor<V>>,
    trim_strategy: Arc<dyn CacheTrimStrategy>,
    params_check_interval: Duration,
    _marker: PhantomData<K>,
}

impl<K, V> CountingMemoryCacheBuilder<K, V>
where
    K: Key,
    V: Value,
{
    /// Create a builder with fixed params.
    ///
    /// Every value weighs 1 byte, unless a value descriptor is given.
    pub fn new(params: MemoryCacheParams) -> Self {
        Self {
            params_supplier: Arc::new(InstanceSupplier::new(params)),
            value_descriptor: Arc::new(|_: &V| 1usize),
            trim_strategy: Arc::new(NativeMemoryCacheTrimStrategy),
            params_check_interval: PARAMS_CHECK_INTERVAL,
            _marker: PhantomData,
        }
    }

    /// Poll the params from the supplier instead.
    pub fn with_params_supplier(mut self, params_supplier: impl Supplier<MemoryCacheParams>) -> Self {
        self.params_supplier = Arc::new(params_supplier);
        self
    }

    /// Set the size of the values.
    pub fn with_value_descriptor(mut self, value_descriptor: impl ValueDescriptor<V>) -> Self {
        self.value_descriptor = Arc::new(value_descriptor);
        self
    }

    /// Set the trim strategy.
    pub fn with_trim_strategy(mut self, trim_strategy: impl CacheTrimStrategy) -> Self {
        self.trim_strategy = Arc::new(trim_strategy);
        self
    }

    /// Set the interval between two polls of the params supplier.
    pub fn with_params_check_interval(mut self, params_check_interval: Duration) -> Self {
        self.params_check_interval = params_check_interval;
        self
    }

    /// Build the cache. The params supplier is polled once here.
    pub fn build(self) -> CountingMemoryCache<K, V> {
        let entry_descriptor: Arc<dyn ValueDescriptor<Arc<Entry<K, V>>>> =
            Arc::new(|entry: &Arc<Entry<K, V>>| entry.size);
        let state = CacheState {
            exclusive_entries: CountingLruMap::new(entry_descriptor.clone()),
            cached_entries: CountingLruMap::new(entry_descriptor),
            params: self.params_supplier.get(),
            last_params_check: Instant::now(),
        };
        CountingMemoryCache {
            inner: Arc::new(CacheInner {
                state: Mutex::new(state),
                value_descriptor: self.value_descriptor,
                trim_strategy: self.trim_strategy,
                params_supplier: self.params_supplier,
                params_check_interval: self.params_check_interval,
            }),
        }
    }
}
