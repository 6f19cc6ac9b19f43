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

use imagepipe_common::{error::Error, executor::Executor, supplier::Supplier};

/// A shared data source.
pub type DynDataSource<T> = Arc<dyn DataSource<T>>;

/// A supplier of data sources. Composite data sources are built over these.
pub type DataSourceSupplier<T> = Arc<dyn Supplier<DynDataSource<T>>>;

/// A cancellable container for zero or more progressively improving results.
///
/// A data source starts in progress, and finishes either with success (the last result is set) or with failure.
/// Closing a data source before it finishes cancels it. Results are observed with [`DataSubscriber`]s.
pub trait DataSource<T>: Send + Sync + 'static {
    /// Check if the data source has been closed.
    fn is_closed(&self) -> bool;

    /// Get the current result, if any.
    ///
    /// Returns `None` once the data source is closed.
    fn result(&self) -> Option<T>;

    /// Check if the data source has a result.
    fn has_result(&self) -> bool;

    /// Check if the data source has finished, with success or with failure.
    fn is_finished(&self) -> bool;

    /// Check if the data source has finished with failure.
    fn has_failed(&self) -> bool;

    /// Get the failure cause, if the data source has failed.
    fn failure_cause(&self) -> Option<Error>;

    /// Get the progress in `[0, 1]`.
    fn progress(&self) -> f32;

    /// Close the data source and release its result.
    ///
    /// Returns `true` exactly once, on the first call.
    fn close(&self) -> bool;

    /// Subscribe to the data source. Notifications are delivered on the given executor.
    ///
    /// A subscriber that subscribes after the data source got a result, finished or was cancelled is notified of
    /// the current state right away. Subscribing to a closed data source does nothing.
    fn subscribe(&self, subscriber: Arc<dyn DataSubscriber<T>>, executor: Arc<dyn Executor>);
}

/// Subscriber of a [`DataSource`].
pub trait DataSubscriber<T>: Send + Sync + 'static {
    /// Called when the data source got a new result, or finished without one.
    fn on_new_result(&self, data_source: &DynDataSource<T>);

    /// Called when the data source failed.
    fn on_failure(&self, data_source: &DynDataSource<T>);

    /// Called when the data source was closed before it finished.
    fn on_cancellation(&self, data_source: &DynDataSource<T>);

    /// Called when the progress of the data source increased.
    fn on_progress_update(&self, data_source: &DynDataSource<T>);
}
