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

use std::sync::{Arc, Weak};

use imagepipe_common::{error::Error, executor::Executor};

use crate::{
    abstract_source::AbstractDataSource,
    data_source::{DataSource, DataSubscriber},
};

/// A data source whose state is set by its owner.
#[derive(Debug)]
pub struct SimpleDataSource<T> {
    base: AbstractDataSource<T>,
}

impl<T> SimpleDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a data source in progress.
    pub fn create() -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let this: Weak<dyn DataSource<T>> = weak.clone();
            Self::from_base(AbstractDataSource::new(this))
        })
    }

    pub(crate) fn from_base(base: AbstractDataSource<T>) -> Self {
        Self { base }
    }

    /// Set the last result. The data source finishes with success.
    pub fn set_result(&self, value: T) -> bool {
        self.base.set_result(value, true)
    }

    /// Set a result, the last one if `is_last` is set.
    pub fn set_result_with(&self, value: T, is_last: bool) -> bool {
        self.base.set_result(value, is_last)
    }

    /// Finish the data source with failure.
    pub fn set_failure(&self, failure: Error) -> bool {
        self.base.set_failure(failure)
    }

    /// Update the progress, it never decreases.
    pub fn set_progress(&self, progress: f32) -> bool {
        self.base.set_progress(progress)
    }
}

impl<T> DataSource<T> for SimpleDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn is_closed(&self) -> bool {
        self.base.is_closed()
    }

    fn result(&self) -> Option<T> {
        self.base.result()
    }

    fn has_result(&self) -> bool {
        self.base.has_result()
    }

    fn is_finished(&self) -> bool {
        self.base.is_finished()
    }

    fn has_failed(&self) -> bool {
        self.base.has_failed()
    }

    fn failure_cause(&self) -> Option<Error> {
        self.base.failure_cause()
    }

    fn progress(&self) -> f32 {
        self.base.progress()
    }

    fn close(&self) -> bool {
        self.base.close()
    }

    fn subscribe(&self, subscriber: Arc<dyn DataSubscriber<T>>, executor: Arc<dyn Executor>) {
        self.base.subscribe(subscriber, executor)
    }
}
