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

use std::{borrow::Borrow, fmt::Debug, hash::Hash, sync::Arc};

use itertools::Itertools;
use ordered_hash_map::OrderedHashMap;
use parking_lot::Mutex;

use crate::descriptor::ValueDescriptor;

/// Values are stored with the size they were put with.
struct Inner<K, V> {
    map: OrderedHashMap<K, (V, usize)>,
    size_in_bytes: usize,
}

/// An insertion-ordered map that keeps track of the total size of its values.
///
/// [`CountingLruMap::put`] moves an existing key to the end of the order, [`CountingLruMap::get`] does not. The first
/// key is the least recently put one.
///
/// All operations are serialized by an internal mutex.
pub struct CountingLruMap<K, V> {
    inner: Mutex<Inner<K, V>>,
    value_descriptor: Arc<dyn ValueDescriptor<V>>,
}

impl<K, V> Debug for CountingLruMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CountingLruMap")
            .field("count", &inner.map.len())
            .field("size_in_bytes", &inner.size_in_bytes)
            .finish()
    }
}

impl<K, V> CountingLruMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create an empty map that sizes values with the given descriptor.
    pub fn new(value_descriptor: Arc<dyn ValueDescriptor<V>>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: OrderedHashMap::new(),
                size_in_bytes: 0,
            }),
            value_descriptor,
        }
    }

    /// Snapshot of the keys, in order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().map.iter().map(|(k, _)| k.clone()).collect_vec()
    }

    /// Snapshot of the values, in order.
    pub fn values(&self) -> Vec<V> {
        self.inner.lock().map.iter().map(|(_, (v, _))| v.clone()).collect_vec()
    }

    /// Count of entries.
    pub fn count(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Total size of the values.
    pub fn size_in_bytes(&self) -> usize {
        self.inner.lock().size_in_bytes
    }

    /// The least recently put key.
    pub fn first_key(&self) -> Option<K> {
        self.inner.lock().map.iter().next().map(|(k, _)| k.clone())
    }

    /// Entries whose key matches the predicate, in order.
    pub fn get_matching_entries<P>(&self, predicate: P) -> Vec<(K, V)>
    where
        P: Fn(&K) -> bool,
    {
        self.inner
            .lock()
            .map
            .iter()
            .filter(|(k, _)| predicate(k))
            .map(|(k, (v, _))| (k.clone(), v.clone()))
            .collect_vec()
    }

    /// Check if the key is present.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().map.get(key).is_some()
    }

    /// Get the value of the key without changing the order.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().map.get(key).map(|(v, _)| v.clone())
    }

    /// Put the value at the end of the order, returning the value previously held by the key.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let size = (self.value_descriptor)(&value);
        let mut inner = self.inner.lock();
        // Remove first so that the key moves to the end of the order.
        let old = inner.map.remove(&key);
        if let Some((_, old_size)) = old.as_ref() {
            inner.size_in_bytes -= old_size;
        }
        inner.map.insert(key, (value, size));
        inner.size_in_bytes += size;
        old.map(|(old, _)| old)
    }

    /// Remove the key, returning its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.inner.lock();
        let (old, size) = inner.map.remove(key)?;
        inner.size_in_bytes -= size;
        Some(old)
    }

    /// Remove all entries whose key matches the predicate, returning their values in order.
    pub fn remove_all<P>(&self, predicate: P) -> Vec<V>
    where
        P: Fn(&K) -> bool,
    {
        let mut inner = self.inner.lock();
        let keys = inner
            .map
            .iter()
            .filter(|(k, _)| predicate(k))
            .map(|(k, _)| k.clone())
            .collect_vec();
        let mut values = Vec::with_capacity(keys.len());
        for key in keys.iter() {
            if let Some((value, size)) = inner.map.remove(key) {
                inner.size_in_bytes -= size;
                values.push(value);
            }
        }
        values
    }

    /// Remove all entries, returning their values in order.
    pub fn clear(&self) -> Vec<V> {
        let mut inner = self.inner.lock();
        let values = inner.map.iter().map(|(_, (v, _))| v.clone()).collect_vec();
        inner.map.clear();
        inner.size_in_bytes = 0;
        values
    }
}
