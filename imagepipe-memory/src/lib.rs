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

//! The counting memory cache of imagepipe.
//!
//! [`CountingMemoryCache`](crate::cache::CountingMemoryCache) shares its values with
//! [`CloseableReference`](imagepipe_common::reference::CloseableReference)s and tracks how many clients hold each
//! entry. Only entries with no client are evicted.

/// The counting memory cache and its builder.
pub mod cache;
/// Value sizing and entry state observation.
pub mod descriptor;
/// The memory cache interface and its instrumented wrapper.
pub mod instrumented;
/// The insertion-ordered counting map behind the cache.
pub mod lru_map;
/// Cache limits and their default suppliers.
pub mod params;
/// Memory trim strategies.
pub mod trim;

/// Re-export of the commonly used items.
pub mod prelude;
