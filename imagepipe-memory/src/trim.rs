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

use imagepipe_common::memory::MemoryTrimType;

/// Decides how much of a cache to release on a memory pressure signal.
pub trait CacheTrimStrategy: Send + Sync + 'static {
    /// Ratio of the cached size to release, in `[0, 1]`.
    fn trim_ratio(&self, trim_type: MemoryTrimType) -> f64;
}

/// Trim strategy of the decoded image cache.
///
/// Decoded images live on the heap, so the cache also reacts to the heap limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitmapMemoryCacheTrimStrategy;

impl CacheTrimStrategy for BitmapMemoryCacheTrimStrategy {
    fn trim_ratio(&self, trim_type: MemoryTrimType) -> f64 {
        match trim_type {
            MemoryTrimType::OnCloseToHeapLimit => trim_type.suggested_trim_ratio(),
            MemoryTrimType::OnAppBackgrounded
            | MemoryTrimType::OnSystemLowMemoryWhileAppInForeground
            | MemoryTrimType::OnSystemLowMemoryWhileAppInBackground => 1.0,
        }
    }
}

/// Trim strategy of caches whose values live out of the heap, like the encoded image cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeMemoryCacheTrimStrategy;

impl CacheTrimStrategy for NativeMemoryCacheTrimStrategy {
    fn trim_ratio(&self, trim_type: MemoryTrimType) -> f64 {
        match trim_type {
            // Out of heap memory does not count against the heap limit.
            MemoryTrimType::OnCloseToHeapLimit => 0.0,
            MemoryTrimType::OnAppBackgrounded
            | MemoryTrimType::OnSystemLowMemoryWhileAppInForeground
            | MemoryTrimType::OnSystemLowMemoryWhileAppInBackground => 1.0,
        }
    }
}
