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

use std::sync::Weak;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Memory pressure signals that a trimmable component may react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryTrimType {
    /// The process is close to its heap limit.
    OnCloseToHeapLimit,
    /// The system is low on memory and the app is in the foreground.
    OnSystemLowMemoryWhileAppInForeground,
    /// The system is low on memory and the app is in the background.
    OnSystemLowMemoryWhileAppInBackground,
    /// The app went to the background.
    OnAppBackgrounded,
}

impl MemoryTrimType {
    /// Suggested ratio of the cached memory to release, in `[0, 1]`.
    pub fn suggested_trim_ratio(&self) -> f64 {
        match self {
            MemoryTrimType::OnCloseToHeapLimit => 0.5,
            MemoryTrimType::OnSystemLowMemoryWhileAppInForeground => 0.5,
            MemoryTrimType::OnSystemLowMemoryWhileAppInBackground => 1.0,
            MemoryTrimType::OnAppBackgrounded => 1.0,
        }
    }
}

/// A component that can release memory on a memory pressure signal.
pub trait MemoryTrimmable: Send + Sync + 'static {
    /// Release memory according to the signal.
    fn trim(&self, trim_type: MemoryTrimType);
}

/// Fans out memory pressure signals to the registered trimmables.
///
/// The registry holds weak handles, a trimmable is dropped from it once its owner is gone.
#[derive(Default)]
pub struct MemoryTrimmableRegistry {
    trimmables: Mutex<Vec<Weak<dyn MemoryTrimmable>>>,
}

impl MemoryTrimmableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trimmable.
    pub fn register(&self, trimmable: Weak<dyn MemoryTrimmable>) {
        let mut trimmables = self.trimmables.lock();
        trimmables.retain(|t| t.strong_count() > 0);
        trimmables.push(trimmable);
    }

    /// Unregister a trimmable. Returns `true` if it was registered.
    pub fn unregister(&self, trimmable: &Weak<dyn MemoryTrimmable>) -> bool {
        let mut trimmables = self.trimmables.lock();
        let len = trimmables.len();
        trimmables.retain(|t| !Weak::ptr_eq(t, trimmable));
        trimmables.len() != len
    }

    /// Count of registered trimmables that are still alive.
    pub fn len(&self) -> usize {
        self.trimmables.lock().iter().filter(|t| t.strong_count() > 0).count()
    }

    /// Check if there is no live registered trimmable.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send the signal to every registered trimmable that is still alive.
    pub fn trim(&self, trim_type: MemoryTrimType) {
        let trimmables = {
            let mut trimmables = self.trimmables.lock();
            trimmables.retain(|t| t.strong_count() > 0);
            trimmables.iter().filter_map(Weak::upgrade).collect::<Vec<_>>()
        };
        tracing::debug!("[trimmable registry]: trim {} trimmables with {trim_type:?}", trimmables.len());
        // Call out of the lock critical section.
        for trimmable in trimmables {
            trimmable.trim(trim_type);
        }
    }
}
