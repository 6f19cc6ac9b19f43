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

use std::sync::Arc;

use imagepipe_common::{code::Key, memory::MemoryTrimmableRegistry, supplier::Supplier};
use imagepipe_memory::{
    cache::{CountingMemoryCache, CountingMemoryCacheBuilder},
    instrumented::InstrumentedMemoryCache,
    params::MemoryCacheParams,
    trim::{BitmapMemoryCacheTrimStrategy, NativeMemoryCacheTrimStrategy},
};

use crate::{
    buffer::DynPooledByteBuffer,
    stats::{BitmapMemoryCacheTracker, EncodedMemoryCacheTracker, ImageCacheStatsTracker},
};

/// A decoded image that can be held by the bitmap memory cache.
pub trait CloseableImage: Send + Sync + 'static {
    /// Memory held by the decoded image, in bytes.
    fn size_in_bytes(&self) -> usize;
}

/// Create the memory cache of decoded images and register it for memory trim signals.
///
/// The registry does not keep the cache alive.
///
/// Values weigh their decoded size. The cache gives up half of its exclusive entries when the process is close to
/// its heap limit, and all of them under system memory pressure.
pub fn bitmap_counting_memory_cache<K, V>(
    params_supplier: impl Supplier<MemoryCacheParams>,
    registry: &MemoryTrimmableRegistry,
) -> CountingMemoryCache<K, V>
where
    K: Key,
    V: CloseableImage,
{
    let params = params_supplier.get();
    let cache = CountingMemoryCacheBuilder::new(params)
        .with_params_supplier(params_supplier)
        .with_value_descriptor(|image: &V| image.size_in_bytes())
        .with_trim_strategy(BitmapMemoryCacheTrimStrategy)
        .build();
    registry.register(cache.downgrade_trimmable());
    tracing::debug!("[factory]: bitmap memory cache created with {:?}", cache.params());
    cache
}

/// Create the memory cache of encoded bytes and register it for memory trim signals.
///
/// Values weigh their buffer size.
pub fn encoded_counting_memory_cache<K>(
    params_supplier: impl Supplier<MemoryCacheParams>,
    registry: &MemoryTrimmableRegistry,
) -> CountingMemoryCache<K, DynPooledByteBuffer>
where
    K: Key,
{
    let params = params_supplier.get();
    let cache = CountingMemoryCacheBuilder::new(params)
        .with_params_supplier(params_supplier)
        .with_value_descriptor(|buffer: &DynPooledByteBuffer| buffer.size())
        .with_trim_strategy(NativeMemoryCacheTrimStrategy)
        .build();
    registry.register(cache.downgrade_trimmable());
    tracing::debug!("[factory]: encoded memory cache created with {:?}", cache.params());
    cache
}

/// Wrap the bitmap memory cache so that its lookups and insertions are reported to the stats tracker.
pub fn bitmap_memory_cache<K, V>(
    cache: CountingMemoryCache<K, V>,
    stats_tracker: Arc<dyn ImageCacheStatsTracker>,
) -> InstrumentedMemoryCache<K, V>
where
    K: Key,
    V: CloseableImage,
{
    InstrumentedMemoryCache::new(cache, Arc::new(BitmapMemoryCacheTracker(stats_tracker)))
}

/// Wrap the encoded memory cache so that its lookups and insertions are reported to the stats tracker.
pub fn encoded_memory_cache<K>(
    cache: CountingMemoryCache<K, DynPooledByteBuffer>,
    stats_tracker: Arc<dyn ImageCacheStatsTracker>,
) -> InstrumentedMemoryCache<K, DynPooledByteBuffer>
where
    K: Key,
{
    InstrumentedMemoryCache::new(cache, Arc::new(EncodedMemoryCacheTracker(stats_tracker)))
}

#[cfg(test)]
mod tests {
    use imagepipe_common::{memory::MemoryTrimType, reference::CloseableReference};
    use imagepipe_memory::params::{DefaultBitmapMemoryCacheParamsSupplier, DefaultEncodedMemoryCacheParamsSupplier};

    use std::sync::atomic::{AtomicUsize, Ordering};

    use imagepipe_memory::instrumented::MemoryCache;

    use super::*;
    use crate::{buffer::BytesPooledByteBuffer, stats::NoOpImageCacheStatsTracker};

    const MB: usize = 1024 * 1024;

    struct Bitmap(usize);

    impl CloseableImage for Bitmap {
        fn size_in_bytes(&self) -> usize {
            self.0
        }
    }

    fn encoded(size: usize) -> CloseableReference<DynPooledByteBuffer> {
        let buffer: DynPooledByteBuffer = Box::new(BytesPooledByteBuffer::new(vec![0u8; size]));
        CloseableReference::new(buffer)
    }

    #[test_log::test]
    fn test_bitmap_cache() {
        let registry = MemoryTrimmableRegistry::new();
        let cache = bitmap_counting_memory_cache::<u64, Bitmap>(DefaultBitmapMemoryCacheParamsSupplier::new(16 * MB), &registry);
        assert_eq!(registry.len(), 1);
        assert_eq!(cache.params().max_cache_size, 4 * MB);

        for i in 0..4 {
            let handle = cache.cache(i, &CloseableReference::new(Bitmap(100))).unwrap();
            drop(handle);
        }
        assert_eq!(cache.size_in_bytes(), 400);
        assert_eq!(cache.eviction_queue_count(), 4);

        // Half of the exclusive entries go when close to the heap limit.
        registry.trim(MemoryTrimType::OnCloseToHeapLimit);
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.size_in_bytes(), 200);

        registry.trim(MemoryTrimType::OnAppBackgrounded);
        assert_eq!(cache.count(), 0);
    }

    #[test_log::test]
    fn test_encoded_cache() {
        let registry = MemoryTrimmableRegistry::new();
        let cache = encoded_counting_memory_cache::<String>(DefaultEncodedMemoryCacheParamsSupplier::new(16 * MB), &registry);
        assert_eq!(registry.len(), 1);
        assert_eq!(cache.params().max_cache_size, 2 * MB);
        assert_eq!(cache.params().max_cache_entry_size, 2 * MB / 8);

        let handle = cache.cache("small".to_string(), &encoded(1024)).unwrap();
        assert_eq!(cache.size_in_bytes(), 1024);
        assert_eq!(cache.in_use_count(), 1);
        drop(handle);

        // Too large for a single entry.
        assert!(cache.cache("large".to_string(), &encoded(2 * MB / 8 + 1)).is_none());

        // Native memory is not trimmed when close to the heap limit.
        registry.trim(MemoryTrimType::OnCloseToHeapLimit);
        assert_eq!(cache.count(), 1);
        registry.trim(MemoryTrimType::OnSystemLowMemoryWhileAppInBackground);
        assert_eq!(cache.count(), 0);
    }

    #[test_log::test]
    fn test_registry_does_not_keep_caches_alive() {
        let registry = MemoryTrimmableRegistry::new();
        let bitmaps =
            bitmap_counting_memory_cache::<u64, Bitmap>(DefaultBitmapMemoryCacheParamsSupplier::new(16 * MB), &registry);
        let encoded_cache =
            encoded_counting_memory_cache::<u64>(DefaultEncodedMemoryCacheParamsSupplier::new(16 * MB), &registry);
        assert_eq!(registry.len(), 2);

        // A clone keeps the cache registered.
        let clone = bitmaps.clone();
        drop(bitmaps);
        assert_eq!(registry.len(), 2);
        drop(clone);
        assert_eq!(registry.len(), 1);
        drop(encoded_cache);
        assert!(registry.is_empty());
        registry.trim(MemoryTrimType::OnAppBackgrounded);
    }

    #[derive(Default)]
    struct RecordingStatsTracker {
        bitmap: [AtomicUsize; 3],
        encoded: [AtomicUsize; 3],
    }

    impl RecordingStatsTracker {
        fn bitmap(&self) -> [usize; 3] {
            self.bitmap.each_ref().map(|c| c.load(Ordering::Relaxed))
        }

        fn encoded(&self) -> [usize; 3] {
            self.encoded.each_ref().map(|c| c.load(Ordering::Relaxed))
        }
    }

    // Counters are ordered as hit, miss, put.
    impl ImageCacheStatsTracker for RecordingStatsTracker {
        fn on_bitmap_cache_hit(&self) {
            self.bitmap[0].fetch_add(1, Ordering::Relaxed);
        }

        fn on_bitmap_cache_miss(&self) {
            self.bitmap[1].fetch_add(1, Ordering::Relaxed);
        }

        fn on_bitmap_cache_put(&self) {
            self.bitmap[2].fetch_add(1, Ordering::Relaxed);
        }

        fn on_memory_cache_hit(&self) {
            self.encoded[0].fetch_add(1, Ordering::Relaxed);
        }

        fn on_memory_cache_miss(&self) {
            self.encoded[1].fetch_add(1, Ordering::Relaxed);
        }

        fn on_memory_cache_put(&self) {
            self.encoded[2].fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test_log::test]
    fn test_instrumented_caches_report_to_stats_tracker() {
        let registry = MemoryTrimmableRegistry::new();
        let stats = Arc::new(RecordingStatsTracker::default());

        let bitmaps = bitmap_memory_cache(
            bitmap_counting_memory_cache::<u64, Bitmap>(DefaultBitmapMemoryCacheParamsSupplier::new(16 * MB), &registry),
            stats.clone(),
        );
        let encoded_cache = encoded_memory_cache(
            encoded_counting_memory_cache::<u64>(DefaultEncodedMemoryCacheParamsSupplier::new(16 * MB), &registry),
            stats.clone(),
        );

        drop(bitmaps.cache(1, &CloseableReference::new(Bitmap(100))));
        assert!(bitmaps.get(&1).is_some());
        assert!(bitmaps.get(&2).is_none());
        assert_eq!(stats.bitmap(), [1, 1, 1]);
        assert_eq!(stats.encoded(), [0, 0, 0]);

        drop(encoded_cache.cache(1, &encoded(10)));
        assert!(encoded_cache.get(&1).is_some());
        assert!(encoded_cache.get(&1).is_some());
        assert_eq!(stats.encoded(), [2, 0, 1]);
        assert_eq!(stats.bitmap(), [1, 1, 1]);
    }

    #[test_log::test]
    fn test_no_op_stats_tracker() {
        let registry = MemoryTrimmableRegistry::new();
        let cache = encoded_memory_cache(
            encoded_counting_memory_cache::<u64>(DefaultEncodedMemoryCacheParamsSupplier::new(16 * MB), &registry),
            Arc::new(NoOpImageCacheStatsTracker),
        );
        drop(cache.cache(7, &encoded(10)));
        assert!(cache.contains(&|k: &u64| *k == 7));
        assert_eq!(cache.remove_all(&|_: &u64| true), 1);
        assert!(cache.get(&7).is_none());
    }
}
