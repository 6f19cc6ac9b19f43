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

use imagepipe_common::error::Error;

use crate::{
    data_source::{DataSourceSupplier, DynDataSource},
    simple::SimpleDataSource,
};

/// A data source that has already finished with the given result.
pub fn immediate_data_source<T>(result: T) -> DynDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    let data_source = SimpleDataSource::create();
    data_source.set_result(result);
    data_source
}

/// A data source that has already failed with the given failure.
pub fn immediate_failed_data_source<T>(failure: Error) -> DynDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    let data_source = SimpleDataSource::create();
    data_source.set_failure(failure);
    data_source
}

/// A supplier of data sources that have already failed with the given failure.
pub fn failed_data_source_supplier<T>(failure: Error) -> DataSourceSupplier<T>
where
    T: Clone + Send + Sync + 'static,
{
    Arc::new(move || immediate_failed_data_source::<T>(failure.clone()))
}
