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

use imagepipe_common::supplier::Supplier;
use serde::{Deserialize, Serialize};

const MB: usize = 1024 * 1024;

/// Limits of a [`CountingMemoryCache`](crate::cache::CountingMemoryCache).
///
/// Unbounded limits are expressed with `usize::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCacheParams {
    /// Max total size in bytes of the cached entries, in use or not.
    pub max_cache_size: usize,
    /// Max count of the cached entries, in use or not.
    pub max_cache_entries: usize,
    /// Max total size in bytes of the entries in the eviction queue.
    pub max_eviction_queue_size: usize,
    /// Max count of the entries in the eviction queue.
    pub max_eviction_queue_entries: usize,
    /// Max size in bytes of a single entry.
    pub max_cache_entry_size: usize,
}

impl MemoryCacheParams {
    /// Create cache params.
    pub fn new(
        max_cache_size: usize,
        max_cache_entries: usize,
        max_eviction_queue_size: usize,
        max_eviction_queue_entries: usize,
        max_cache_entry_size: usize,
    ) -> Self {
        Self {
            max_cache_size,
            max_cache_entries,
            max_eviction_queue_size,
            max_eviction_queue_entries,
            max_cache_entry_size,
        }
    }
}

/// Default params of the decoded image cache, derived from the memory available to the process.
#[derive(Debug, Clone, Copy)]
pub struct DefaultBitmapMemoryCacheParamsSupplier {
    max_memory: usize,
}

impl DefaultBitmapMemoryCacheParamsSupplier {
    const MAX_CACHE_ENTRIES: usize = 256;
    const MAX_EVICTION_QUEUE_SIZE: usize = usize::MAX;
    const MAX_EVICTION_QUEUE_ENTRIES: usize = usize::MAX;
    const MAX_CACHE_ENTRY_SIZE: usize = usize::MAX;

    /// Create the supplier for a process with `max_memory` bytes of memory.
    pub fn new(max_memory: usize) -> Self {
        Self { max_memory }
    }

    fn max_cache_size(&self) -> usize {
        if self.max_memory < 32 * MB {
            4 * MB
        } else if self.max_memory < 64 * MB {
            6 * MB
        } else {
            self.max_memory / 4
        }
    }
}

impl Supplier<MemoryCacheParams> for DefaultBitmapMemoryCacheParamsSupplier {
    fn get(&self) -> MemoryCacheParams {
        MemoryCacheParams {
            max_cache_size: self.max_cache_size(),
            max_cache_entries: Self::MAX_CACHE_ENTRIES,
            max_eviction_queue_size: Self::MAX_EVICTION_QUEUE_SIZE,
            max_eviction_queue_entries: Self::MAX_EVICTION_QUEUE_ENTRIES,
            max_cache_entry_size: Self::MAX_CACHE_ENTRY_SIZE,
        }
    }
}

/// Default params of the encoded image cache, derived from the memory available to the process.
#[derive(Debug, Clone, Copy)]
pub struct DefaultEncodedMemoryCacheParamsSupplier {
    max_memory: usize,
}

impl DefaultEncodedMemoryCacheParamsSupplier {
    const MAX_CACHE_ENTRIES: usize = usize::MAX;
    const MAX_EVICTION_QUEUE_ENTRIES: usize = usize::MAX;

    /// Create the supplier for a process with `max_memory` bytes of memory.
    pub fn new(max_memory: usize) -> Self {
        Self { max_memory }
    }

    fn max_cache_size(&self) -> usize {
        if self.max_memory < 16 * MB {
            MB
        } else if self.max_memory < 32 * MB {
            2 * MB
        } else {
            20 * MB
        }
    }
}

impl Supplier<MemoryCacheParams> for DefaultEncodedMemoryCacheParamsSupplier {
    fn get(&self) -> MemoryCacheParams {
        let max_cache_size = self.max_cache_size();
        MemoryCacheParams {
            max_cache_size,
            max_cache_entries: Self::MAX_CACHE_ENTRIES,
            max_eviction_queue_size: max_cache_size,
            max_eviction_queue_entries: Self::MAX_EVICTION_QUEUE_ENTRIES,
            max_cache_entry_size: max_cache_size / 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_params() {
        let params = DefaultBitmapMemoryCacheParamsSupplier::new(16 * MB).get();
        assert_eq!(params.max_cache_size, 4 * MB);
        assert_eq!(params.max_cache_entries, 256);
        assert_eq!(params.max_eviction_queue_size, usize::MAX);
        assert_eq!(params.max_eviction_queue_entries, usize::MAX);
        assert_eq!(params.max_cache_entry_size, usize::MAX);

        assert_eq!(DefaultBitmapMemoryCacheParamsSupplier::new(48 * MB).get().max_cache_size, 6 * MB);
        assert_eq!(DefaultBitmapMemoryCacheParamsSupplier::new(64 * MB).get().max_cache_size, 16 * MB);
        assert_eq!(DefaultBitmapMemoryCacheParamsSupplier::new(512 * MB).get().max_cache_size, 128 * MB);
    }

    #[test]
    fn test_encoded_params() {
        let params = DefaultEncodedMemoryCacheParamsSupplier::new(8 * MB).get();
        assert_eq!(params.max_cache_size, MB);
        assert_eq!(params.max_cache_entries, usize::MAX);
        assert_eq!(params.max_eviction_queue_size, MB);
        assert_eq!(params.max_eviction_queue_entries, usize::MAX);
        assert_eq!(params.max_cache_entry_size, MB / 8);

        assert_eq!(DefaultEncodedMemoryCacheParamsSupplier::new(24 * MB).get().max_cache_size, 2 * MB);
        assert_eq!(DefaultEncodedMemoryCacheParamsSupplier::new(256 * MB).get().max_cache_size, 20 * MB);
    }

    #[test]
    fn test_params_from_config() {
        let config = r#"{
            "max_cache_size": 1200,
            "max_cache_entries": 4,
            "max_eviction_queue_size": 1100,
            "max_eviction_queue_entries": 3,
            "max_cache_entry_size": 1000
        }"#;
        let params: MemoryCacheParams = serde_json::from_str(config).unwrap();
        assert_eq!(params, MemoryCacheParams::new(1200, 4, 1100, 3, 1000));
    }
}
