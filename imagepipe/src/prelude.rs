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

pub use crate::{
    buffer::{
        BytesPooledByteBuffer, BytesPooledByteBufferFactory, DynPooledByteBuffer, PooledByteBuffer,
        PooledByteBufferFactory,
    },
    common::{
        code::{Key, Value},
        error::{Error, ErrorKind, Result},
        executor::{CallerThreadExecutor, Executor, Task},
        memory::{MemoryTrimType, MemoryTrimmable, MemoryTrimmableRegistry},
        reference::CloseableReference,
        supplier::{InstanceSupplier, Supplier},
    },
    datasource::{
        abstract_source::AbstractDataSource,
        data_source::{DataSource, DataSourceSupplier, DataSubscriber, DynDataSource},
        first_available::FirstAvailableDataSourceSupplier,
        increasing_quality::IncreasingQualityDataSourceSupplier,
        settable::SettableDataSource,
        simple::SimpleDataSource,
        sources::{failed_data_source_supplier, immediate_data_source, immediate_failed_data_source},
        subscriber::BaseDataSubscriber,
    },
    disk::{BinaryResource, BytesResource, FileCache},
    encoded_image::{EncodedImage, ImageFormat, DEFAULT_SAMPLE_SIZE},
    factory::{
        bitmap_counting_memory_cache, bitmap_memory_cache, encoded_counting_memory_cache, encoded_memory_cache,
        CloseableImage,
    },
    memory::prelude::{
        BitmapMemoryCacheTrimStrategy, CacheTrimStrategy, CountingLruMap, CountingMemoryCache,
        CountingMemoryCacheBuilder, DefaultBitmapMemoryCacheParamsSupplier, DefaultEncodedMemoryCacheParamsSupplier,
        EntryStateObserver, InstrumentedMemoryCache, MemoryCache, MemoryCacheParams, MemoryCacheTracker,
        NativeMemoryCacheTrimStrategy, ValueDescriptor,
    },
    staging::StagingArea,
    stats::{ImageCacheStatsTracker, NoOpImageCacheStatsTracker},
};
#[cfg(feature = "executor-tokio")]
pub use crate::common::executor::{TokioHandleExecutor, TokioRuntimeExecutor};
