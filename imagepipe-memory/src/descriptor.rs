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

/// Size of a cached value in bytes.
pub trait ValueDescriptor<V>: Fn(&V) -> usize + Send + Sync + 'static {}
impl<V, T> ValueDescriptor<V> for T where T: Fn(&V) -> usize + Send + Sync + 'static {}

/// Observer of the exclusivity of a cache entry.
///
/// An entry is exclusive when no client holds a handle to it, which makes it a candidate for eviction and reuse.
pub trait EntryStateObserver<K>: Send + Sync + 'static {
    /// Called out of the cache lock when the entry enters or leaves the eviction queue.
    fn on_exclusivity_changed(&self, key: &K, is_exclusive: bool);
}
