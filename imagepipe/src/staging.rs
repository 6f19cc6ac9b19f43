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

use std::fmt::Debug;

use hashbrown::HashMap;
use imagepipe_common::code::Key;
use parking_lot::Mutex;

use crate::encoded_image::EncodedImage;

/// Encoded images whose disk write is in flight, by key.
///
/// Readers that miss the disk cache look here for values that are not persisted yet. The staging area holds its own
/// clone of each staged image, which is closed when the entry is replaced or removed.
pub struct StagingArea<K> {
    map: Mutex<HashMap<K, EncodedImage>>,
}

impl<K> Debug for StagingArea<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingArea").field("len", &self.map.lock().len()).finish()
    }
}

impl<K> Default for StagingArea<K> {
    fn default() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> StagingArea<K>
where
    K: Key,
{
    /// Create an empty staging area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a clone of the image for the key, replacing the staged one.
    ///
    /// # Panics
    ///
    /// Panics if the image is closed.
    pub fn put(&self, key: K, image: &EncodedImage) {
        let Some(image) = image.clone_or_none() else {
            panic!("stage a closed encoded image for key {key:?}");
        };
        let old = self.map.lock().insert(key, image);
        // Release data out of the lock critical section.
        drop(old);
    }

    /// Get a clone of the staged image.
    pub fn get(&self, key: &K) -> Option<EncodedImage> {
        let mut map = self.map.lock();
        let image = map.get(key)?.clone_or_none();
        if image.is_none() {
            tracing::warn!("[staging area]: found closed image for key {key:?}");
            let stale = map.remove(key);
            drop(map);
            drop(stale);
        }
        image
    }

    /// Check if an image is staged for the key.
    pub fn contains_key(&self, key: &K) -> bool {
        let mut map = self.map.lock();
        let valid = match map.get(key) {
            Some(image) => image.is_valid(),
            None => return false,
        };
        if !valid {
            tracing::warn!("[staging area]: found closed image for key {key:?}");
            let stale = map.remove(key);
            drop(map);
            drop(stale);
        }
        valid
    }

    /// Unstage the image of the key. Returns `true` if a valid image was staged.
    pub fn remove(&self, key: &K) -> bool {
        let Some(mut image) = self.map.lock().remove(key) else {
            return false;
        };
        let valid = image.is_valid();
        image.close();
        valid
    }

    /// Unstage the image of the key only if it shares the byte buffer of the given image.
    ///
    /// A writer calls this once its write is done, so that it never unstages an image staged after its own.
    pub fn remove_if_same(&self, key: &K, image: &EncodedImage) -> bool {
        let removed = {
            let mut map = self.map.lock();
            let same = map.get(key).is_some_and(|staged| staged.is_same_buffer(image));
            if same {
                map.remove(key)
            } else {
                None
            }
        };
        // Release data out of the lock critical section.
        removed.is_some()
    }

    /// Unstage all images.
    pub fn clear_all(&self) {
        let old = std::mem::take(&mut *self.map.lock());
        tracing::debug!("[staging area]: clear {} images", old.len());
        // Release data out of the lock critical section.
        drop(old);
    }

    /// Count of staged images.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// Check if no image is staged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
