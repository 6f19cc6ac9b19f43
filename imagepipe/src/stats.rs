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

use imagepipe_memory::instrumented::MemoryCacheTracker;

/// Hooks for the hit rates of the image caches.
///
/// Every hook defaults to a no-op, so a tracker only implements what it records.
pub trait ImageCacheStatsTracker: Send + Sync + 'static {
    /// A decoded image is offered to the bitmap memory cache.
    fn on_bitmap_cache_put(&self) {}

    /// The bitmap memory cache has the requested image.
    fn on_bitmap_cache_hit(&self) {}

    /// The bitmap memory cache misses the requested image.
    fn on_bitmap_cache_miss(&self) {}

    /// Encoded bytes are offered to the encoded memory cache.
    fn on_memory_cache_put(&self) {}

    /// The encoded memory cache has the requested bytes.
    fn on_memory_cache_hit(&self) {}

    /// The encoded memory cache misses the requested bytes.
    fn on_memory_cache_miss(&self) {}
}

/// A tracker that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpImageCacheStatsTracker;

impl ImageCacheStatsTracker for NoOpImageCacheStatsTracker {}

/// Forwards the bitmap memory cache events to the stats tracker.
pub(crate) struct BitmapMemoryCacheTracker(pub(crate) Arc<dyn ImageCacheStatsTracker>);

impl MemoryCacheTracker for BitmapMemoryCacheTracker {
    fn on_cache_hit(&self) {
        self.0.on_bitmap_cache_hit();
    }

    fn on_cache_miss(&self) {
        self.0.on_bitmap_cache_miss();
    }

    fn on_cache_put(&self) {
        self.0.on_bitmap_cache_put();
    }
}

/// Forwards the encoded memory cache events to the stats tracker.
pub(crate) struct EncodedMemoryCacheTracker(pub(crate) Arc<dyn ImageCacheStatsTracker>);

impl MemoryCacheTracker for EncodedMemoryCacheTracker {
    fn on_cache_hit(&self) {
        self.0.on_memory_cache_hit();
    }

    fn on_cache_miss(&self) {
        self.0.on_memory_cache_miss();
    }

    fn on_cache_put(&self) {
        self.0.on_memory_cache_put();
    }
}
