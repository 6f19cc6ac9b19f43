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

use std::{
    fmt::Debug,
    marker::PhantomData,
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
};

use crate::data_source::{DataSubscriber, DynDataSource};

/// A subscriber that closes the data source once it is done with it.
///
/// `on_new_result` is called on every new result and the data source is closed after the final one. `on_failure` is
/// called on failure and the data source is closed afterwards. Cancellation and progress are ignored.
pub struct BaseDataSubscriber<T, N, F> {
    on_new_result: N,
    on_failure: F,
    _marker: PhantomData<fn(T)>,
}

impl<T, N, F> Debug for BaseDataSubscriber<T, N, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseDataSubscriber").finish()
    }
}

impl<T, N, F> BaseDataSubscriber<T, N, F>
where
    T: 'static,
    N: Fn(&DynDataSource<T>) + Send + Sync + 'static,
    F: Fn(&DynDataSource<T>) + Send + Sync + 'static,
{
    /// Create a subscriber with the handlers of new results and failures.
    pub fn new(on_new_result: N, on_failure: F) -> Self {
        Self {
            on_new_result,
            on_failure,
            _marker: PhantomData,
        }
    }
}

impl<T, N, F> DataSubscriber<T> for BaseDataSubscriber<T, N, F>
where
    T: 'static,
    N: Fn(&DynDataSource<T>) + Send + Sync + 'static,
    F: Fn(&DynDataSource<T>) + Send + Sync + 'static,
{
    fn on_new_result(&self, data_source: &DynDataSource<T>) {
        // Check before handling the result, or the final result may be lost to a close racing with it.
        let should_close = data_source.is_finished();
        let res = catch_unwind(AssertUnwindSafe(|| (self.on_new_result)(data_source)));
        if should_close {
            data_source.close();
        }
        if let Err(e) = res {
            resume_unwind(e);
        }
    }

    fn on_failure(&self, data_source: &DynDataSource<T>) {
        let res = catch_unwind(AssertUnwindSafe(|| (self.on_failure)(data_source)));
        data_source.close();
        if let Err(e) = res {
            resume_unwind(e);
        }
    }

    fn on_cancellation(&self, _: &DynDataSource<T>) {}

    fn on_progress_update(&self, _: &DynDataSource<T>) {}
}
