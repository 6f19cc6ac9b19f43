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

//! Memory caches, staging area and data sources working together.

use std::{io::Cursor, sync::Arc};

use imagepipe::*;

const MB: usize = 1024 * 1024;

fn new_buffer(data: Vec<u8>) -> CloseableReference<DynPooledByteBuffer> {
    let buffer = BytesPooledByteBufferFactory
        .new_byte_buffer(&mut Cursor::new(data), 0)
        .unwrap();
    CloseableReference::new(buffer)
}

#[test_log::test]
fn test_reuse_exclusive_entry() {
    let cache = CountingMemoryCacheBuilder::<String, u64>::new(MemoryCacheParams::new(1200, 4, 1100, 3, 1000))
        .with_value_descriptor(|v: &u64| *v as usize)
        .build();

    let handle = cache.cache("k1".to_string(), &CloseableReference::new(100)).unwrap();
    drop(handle);
    let a = cache.get("k1").unwrap();
    let b = cache.get("k1").unwrap();
    assert_eq!(cache.in_use_count(), 1);
    drop(a);
    drop(b);
    assert_eq!(cache.in_use_count(), 0);
    assert_eq!(cache.eviction_queue_count(), 1);

    let reused = cache.reuse("k1").unwrap();
    assert_eq!(*reused, 100);
    assert_eq!(cache.count(), 0);
    assert!(!cache.contains_key("k1"));
}

#[test_log::test]
fn test_lru_map_order() {
    let map = CountingLruMap::<String, usize>::new(Arc::new(|v: &usize| *v));
    map.put("k1".to_string(), 110);
    map.put("k2".to_string(), 120);
    map.put("k3".to_string(), 130);
    map.put("k2".to_string(), 150);
    assert_eq!(map.keys(), vec!["k1", "k3", "k2"]);
    assert_eq!(map.size_in_bytes(), 390);
}

#[test_log::test]
fn test_in_use_entries_are_never_evicted() {
    let cache = CountingMemoryCacheBuilder::<u64, u64>::new(MemoryCacheParams::new(1200, 4, 1100, 3, 1000))
        .with_value_descriptor(|v: &u64| *v as usize)
        .build();
    let sizes = [400u64, 300, 200, 250, 350];
    let mut handles = vec![];
    for (key, size) in sizes.into_iter().enumerate() {
        handles.push(cache.cache(key as u64, &CloseableReference::new(size)));
    }
    // The clients still hold the admitted entries, nothing is evicted to admit more.
    let admitted = handles.iter().filter(|handle| handle.is_some()).count();
    assert_eq!(admitted, 4);
    assert!(handles[4].is_none());
    assert_eq!(cache.count(), 4);
    assert!(cache.size_in_bytes() <= 1200);
    for (key, handle) in handles.iter().enumerate() {
        if handle.is_some() {
            assert!(cache.contains_key(&(key as u64)));
        }
    }
}

#[test_log::test]
fn test_staged_write_serves_readers() {
    let registry = MemoryTrimmableRegistry::new();
    let encoded_cache =
        encoded_counting_memory_cache::<String>(DefaultEncodedMemoryCacheParamsSupplier::new(64 * MB), &registry);
    let staging = StagingArea::<String>::new();
    let key = "https://example.com/image.jpg".to_string();

    // A fetched image enters the memory cache and is staged while its disk write is in flight.
    let buffer = new_buffer(vec![0xff, 0xd8, 0xff, 0xe0]);
    let cached = encoded_cache.cache(key.clone(), &buffer).unwrap();
    let image = EncodedImage::new(&cached)
        .with_width(1)
        .with_height(1)
        .with_rotation_angle(0)
        .with_image_format(ImageFormat::Jpeg);
    staging.put(key.clone(), &image);

    // A reader that misses the disk gets the staged image, sharing the cached bytes.
    let staged = staging.get(&key).unwrap();
    assert!(staged.is_same_buffer(&image));
    assert_eq!(staged.image_format(), ImageFormat::Jpeg);
    assert_eq!(staged.size(), 4);

    // The write is done, the staged image is gone.
    assert!(staging.remove_if_same(&key, &image));
    assert!(staging.get(&key).is_none());

    // Trimming does not drop bytes still held by a reader.
    drop(cached);
    drop(image);
    registry.trim(MemoryTrimType::OnAppBackgrounded);
    assert_eq!(encoded_cache.count(), 1);
    assert_eq!(staged.byte_buffer_ref().unwrap().as_bytes(), &[0xff, 0xd8, 0xff, 0xe0]);

    drop(staged);
    registry.trim(MemoryTrimType::OnAppBackgrounded);
    assert_eq!(encoded_cache.count(), 0);
}

#[test_log::test]
fn test_cached_value_through_data_source() {
    let cache = CountingMemoryCacheBuilder::<u64, String>::new(MemoryCacheParams::new(1200, 4, 1100, 3, 1000))
        .with_value_descriptor(|v: &String| v.len())
        .build();
    let handle = cache.cache(1, &CloseableReference::new("decoded".to_string())).unwrap();

    let data_source = SettableDataSource::create();
    assert!(data_source.set(&handle));
    drop(handle);
    // The data source is a client of the cache entry.
    assert_eq!(cache.in_use_count(), 1);

    let result = data_source.result().unwrap();
    assert_eq!(result.as_str(), "decoded");
    drop(result);

    assert!(data_source.close());
    assert_eq!(cache.in_use_count(), 0);
    assert_eq!(cache.eviction_queue_count(), 1);
}
