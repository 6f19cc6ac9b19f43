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

use std::{future::Future, io::Write};

use bytes::Bytes;
use imagepipe_common::error::Result;

/// Bytes stored by a [`FileCache`].
pub trait BinaryResource: Send + Sync + 'static {
    /// Size of the resource in bytes.
    fn size(&self) -> usize;

    /// Read the whole resource.
    fn read(&self) -> Result<Bytes>;
}

/// A [`BinaryResource`] held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytesResource {
    bytes: Bytes,
}

impl BytesResource {
    /// Wrap the bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }
}

impl BinaryResource for BytesResource {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self) -> Result<Bytes> {
        Ok(self.bytes.clone())
    }
}

/// The disk cache consumed by the pipeline.
///
/// Disk storage is provided by the embedder. Reads that miss the disk cache should be checked against the
/// [`StagingArea`](crate::staging::StagingArea), which holds the values whose write is in flight.
pub trait FileCache<K>: Send + Sync + 'static {
    /// Resource type returned by the cache.
    type Resource: BinaryResource;

    /// Check if the key is cached, without blocking on i/o. May return false negatives.
    fn has_key_sync(&self, key: &K) -> bool;

    /// Check if the key is cached.
    fn has_key(&self, key: &K) -> impl Future<Output = bool> + Send;

    /// Get the resource of the key.
    fn get_resource(&self, key: &K) -> Result<Option<Self::Resource>>;

    /// Insert a resource for the key, whose bytes are produced by the writer.
    fn insert<W>(&self, key: &K, writer: W) -> Result<Self::Resource>
    where
        W: FnOnce(&mut dyn Write) -> std::io::Result<()>;

    /// Remove the resource of the key.
    fn remove(&self, key: &K);

    /// Remove all resources.
    fn clear_all(&self);
}

#[cfg(test)]
mod tests {
    use std::hash::Hash;

    use hashbrown::HashMap;
    use imagepipe_common::error::ErrorKind;
    use parking_lot::Mutex;

    use super::*;

    /// An in-memory file cache.
    #[derive(Debug, Default)]
    struct MemoryFileCache<K> {
        resources: Mutex<HashMap<K, Bytes>>,
    }

    impl<K> FileCache<K> for MemoryFileCache<K>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
    {
        type Resource = BytesResource;

        fn has_key_sync(&self, key: &K) -> bool {
            self.resources.lock().contains_key(key)
        }

        fn has_key(&self, key: &K) -> impl Future<Output = bool> + Send {
            let res = self.has_key_sync(key);
            async move { res }
        }

        fn get_resource(&self, key: &K) -> Result<Option<Self::Resource>> {
            Ok(self.resources.lock().get(key).cloned().map(BytesResource::new))
        }

        fn insert<W>(&self, key: &K, writer: W) -> Result<Self::Resource>
        where
            W: FnOnce(&mut dyn Write) -> std::io::Result<()>,
        {
            let mut buf = vec![];
            writer(&mut buf)?;
            let bytes = Bytes::from(buf);
            self.resources.lock().insert(key.clone(), bytes.clone());
            Ok(BytesResource::new(bytes))
        }

        fn remove(&self, key: &K) {
            self.resources.lock().remove(key);
        }

        fn clear_all(&self) {
            self.resources.lock().clear();
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_memory_file_cache() {
        let cache = MemoryFileCache::<u64>::default();
        assert!(!cache.has_key(&1).await);

        let resource = cache.insert(&1, |w| w.write_all(b"encoded")).unwrap();
        assert_eq!(resource.size(), 7);
        assert!(cache.has_key_sync(&1));
        assert!(cache.has_key(&1).await);
        assert_eq!(cache.get_resource(&1).unwrap().unwrap().read().unwrap(), Bytes::from_static(b"encoded"));

        cache.remove(&1);
        assert!(cache.get_resource(&1).unwrap().is_none());

        cache.insert(&2, |w| w.write_all(b"a")).unwrap();
        cache.insert(&3, |w| w.write_all(b"b")).unwrap();
        cache.clear_all();
        assert!(!cache.has_key_sync(&2));
        assert!(!cache.has_key_sync(&3));
    }

    #[test_log::test]
    fn test_failed_write_is_not_inserted() {
        let cache = MemoryFileCache::<u64>::default();
        let err = cache
            .insert(&1, |_| Err(std::io::Error::other("disk full")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!cache.has_key_sync(&1));
    }
}
