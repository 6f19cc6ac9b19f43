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
    sync::{Arc, Weak},
};

use imagepipe_common::{
    error::{Error, ErrorKind},
    executor::{CallerThreadExecutor, Executor},
    strict_assert,
    supplier::Supplier,
};
use parking_lot::Mutex;

use crate::{
    abstract_source::AbstractDataSource,
    data_source::{DataSource, DataSourceSupplier, DataSubscriber, DynDataSource},
};

/// Supplies data sources that expose the best result available among their children.
///
/// Suppliers are ordered by decreasing quality, index `0` being the best. All children are started at once, but no
/// child is started after one that already has a result. The exposed result only ever improves: a child takes over
/// when no child has a result yet, or when it finishes and is better than the current one. Children worse than the
/// current one are closed.
///
/// The data source finishes, fails and reports progress along with child `0`.
pub struct IncreasingQualityDataSourceSupplier<T> {
    suppliers: Arc<Vec<DataSourceSupplier<T>>>,
}

impl<T> Debug for IncreasingQualityDataSourceSupplier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncreasingQualityDataSourceSupplier")
            .field("suppliers", &self.suppliers.len())
            .finish()
    }
}

impl<T> Clone for IncreasingQualityDataSourceSupplier<T> {
    fn clone(&self) -> Self {
        Self {
            suppliers: self.suppliers.clone(),
        }
    }
}

impl<T> IncreasingQualityDataSourceSupplier<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create the supplier over the child suppliers, best quality first.
    pub fn new(suppliers: Vec<DataSourceSupplier<T>>) -> Self {
        Self {
            suppliers: Arc::new(suppliers),
        }
    }
}

impl<T> Supplier<DynDataSource<T>> for IncreasingQualityDataSourceSupplier<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> DynDataSource<T> {
        IncreasingQualityDataSource::create(&self.suppliers)
    }
}

struct IncreasingQualityState<T> {
    /// `None` once closed. A slot is cleared when its child is closed.
    data_sources: Option<Vec<Option<DynDataSource<T>>>>,
    /// Index of the child that exposes its result, `usize::MAX` if none.
    index_with_result: usize,
}

impl<T> IncreasingQualityState<T> {
    fn data_source(&self, index: usize) -> Option<&DynDataSource<T>> {
        self.data_sources.as_ref()?.get(index)?.as_ref()
    }

    fn data_source_with_result(&self) -> Option<&DynDataSource<T>> {
        self.data_source(self.index_with_result)
    }

    fn take_data_source(&mut self, index: usize) -> Option<DynDataSource<T>> {
        self.data_sources.as_mut()?.get_mut(index)?.take()
    }
}

fn is_same<T>(a: Option<&DynDataSource<T>>, b: &DynDataSource<T>) -> bool {
    a.is_some_and(|a| Arc::ptr_eq(a, b))
}

struct IncreasingQualityDataSource<T: 'static> {
    base: AbstractDataSource<T>,
    state: Mutex<IncreasingQualityState<T>>,
}

impl<T> IncreasingQualityDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn create(suppliers: &[DataSourceSupplier<T>]) -> Arc<Self> {
        let data_source = Arc::new_cyclic(|weak: &Weak<Self>| {
            let this: Weak<dyn DataSource<T>> = weak.clone();
            Self {
                base: AbstractDataSource::new(this),
                state: Mutex::new(IncreasingQualityState {
                    data_sources: Some(Vec::with_capacity(suppliers.len())),
                    index_with_result: usize::MAX,
                }),
            }
        });
        if suppliers.is_empty() {
            data_source.base.set_failure(Error::no_data_source());
        } else {
            data_source.start(suppliers);
        }
        data_source
    }

    fn start(self: &Arc<Self>, suppliers: &[DataSourceSupplier<T>]) {
        for (index, supplier) in suppliers.iter().enumerate() {
            let child = supplier.get();
            let added = {
                let mut state = self.state.lock();
                match state.data_sources.as_mut() {
                    Some(data_sources) => {
                        strict_assert!(data_sources.len() == index);
                        data_sources.push(Some(child.clone()));
                        true
                    }
                    None => false,
                }
            };
            if !added {
                child.close();
                break;
            }
            let subscriber = Arc::new(IncreasingQualitySubscriber {
                parent: Arc::downgrade(self),
                index,
            });
            child.subscribe(subscriber, CallerThreadExecutor::shared());
            if child.has_result() {
                tracing::trace!("[increasing quality]: child {index} already has a result, skip the worse ones");
                break;
            }
        }
    }

    fn data_source_with_result(&self) -> Option<DynDataSource<T>> {
        self.state.lock().data_source_with_result().cloned()
    }

    fn maybe_set_index_with_result(&self, index: usize, data_source: &DynDataSource<T>, is_finished: bool) {
        let stale = {
            let mut state = self.state.lock();
            if !is_same(state.data_source(index), data_source) || index == state.index_with_result {
                return;
            }
            let old = state.index_with_result;
            if state.data_source_with_result().is_none() || (is_finished && index < old) {
                state.index_with_result = index;
            }
            let new = state.index_with_result;
            let end = match state.data_sources.as_ref() {
                Some(data_sources) => old.min(data_sources.len().saturating_sub(1)),
                None => return,
            };
            ((new + 1)..=end)
                .filter_map(|i| state.take_data_source(i))
                .collect::<Vec<_>>()
        };

        // Release data out of the lock critical section.
        for data_source in stale {
            data_source.close();
        }
    }

    /// Take the child out of its slot to close it, unless it exposes the result.
    fn try_get_and_clear_data_source(&self, index: usize, data_source: &DynDataSource<T>) -> Option<DynDataSource<T>> {
        let mut state = self.state.lock();
        if is_same(state.data_source_with_result(), data_source) {
            return None;
        }
        if is_same(state.data_source(index), data_source) {
            return state.take_data_source(index);
        }
        Some(data_source.clone())
    }

    fn on_data_source_new_result(&self, index: usize, data_source: &DynDataSource<T>) {
        let is_finished = data_source.is_finished();
        self.maybe_set_index_with_result(index, data_source, is_finished);
        if is_same(self.data_source_with_result().as_ref(), data_source) {
            self.base.signal_result(index == 0 && is_finished);
        }
    }

    fn on_data_source_failed(&self, index: usize, data_source: &DynDataSource<T>) {
        if let Some(data_source) = self.try_get_and_clear_data_source(index, data_source) {
            data_source.close();
        }
        if index == 0 {
            let failure = data_source
                .failure_cause()
                .unwrap_or_else(|| Error::new(ErrorKind::NoDataSource, "data source finished without result"));
            self.base.set_failure(failure);
        }
    }

    fn on_data_source_progress(&self, index: usize, data_source: &DynDataSource<T>) {
        if index == 0 {
            self.base.set_progress(data_source.progress());
        }
    }
}

impl<T> DataSource<T> for IncreasingQualityDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn is_closed(&self) -> bool {
        self.base.is_closed()
    }

    fn result(&self) -> Option<T> {
        self.data_source_with_result().and_then(|data_source| data_source.result())
    }

    fn has_result(&self) -> bool {
        self.data_source_with_result()
            .is_some_and(|data_source| data_source.has_result())
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
        if !self.base.close() {
            return false;
        }
        let data_sources = self.state.lock().data_sources.take();
        for data_source in data_sources.into_iter().flatten().flatten() {
            data_source.close();
        }
        true
    }

    fn subscribe(&self, subscriber: Arc<dyn DataSubscriber<T>>, executor: Arc<dyn Executor>) {
        self.base.subscribe(subscriber, executor)
    }
}

impl<T: 'static> Drop for IncreasingQualityDataSource<T> {
    fn drop(&mut self) {
        if let Some(data_sources) = self.state.get_mut().data_sources.take() {
            for data_source in data_sources.into_iter().flatten() {
                data_source.close();
            }
        }
    }
}

struct IncreasingQualitySubscriber<T: 'static> {
    parent: Weak<IncreasingQualityDataSource<T>>,
    index: usize,
}

impl<T> DataSubscriber<T> for IncreasingQualitySubscriber<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn on_new_result(&self, data_source: &DynDataSource<T>) {
        let Some(parent) = self.parent.upgrade() else {
            return;
        };
        if data_source.has_result() {
            parent.on_data_source_new_result(self.index, data_source);
        } else if data_source.is_finished() {
            parent.on_data_source_failed(self.index, data_source);
        }
    }

    fn on_failure(&self, data_source: &DynDataSource<T>) {
        if let Some(parent) = self.parent.upgrade() {
            parent.on_data_source_failed(self.index, data_source);
        }
    }

    fn on_cancellation(&self, _: &DynDataSource<T>) {}

    fn on_progress_update(&self, data_source: &DynDataSource<T>) {
        if let Some(parent) = self.parent.upgrade() {
            parent.on_data_source_progress(self.index, data_source);
        }
    }
}
