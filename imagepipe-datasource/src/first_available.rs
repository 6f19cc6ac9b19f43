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
    supplier::Supplier,
};
use parking_lot::Mutex;

use crate::{
    abstract_source::AbstractDataSource,
    data_source::{DataSource, DataSourceSupplier, DataSubscriber, DynDataSource},
};

/// Supplies data sources that forward the result of the first child that has one.
///
/// Each data source tries the suppliers in order. The next child is started only when the current one fails or
/// finishes without a result. When all children fail, the data source fails with the failure of the last one.
pub struct FirstAvailableDataSourceSupplier<T> {
    suppliers: Arc<Vec<DataSourceSupplier<T>>>,
}

impl<T> Debug for FirstAvailableDataSourceSupplier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirstAvailableDataSourceSupplier")
            .field("suppliers", &self.suppliers.len())
            .finish()
    }
}

impl<T> Clone for FirstAvailableDataSourceSupplier<T> {
    fn clone(&self) -> Self {
        Self {
            suppliers: self.suppliers.clone(),
        }
    }
}

impl<T> FirstAvailableDataSourceSupplier<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create the supplier over the child suppliers, in order of preference.
    pub fn new(suppliers: Vec<DataSourceSupplier<T>>) -> Self {
        Self {
            suppliers: Arc::new(suppliers),
        }
    }
}

impl<T> Supplier<DynDataSource<T>> for FirstAvailableDataSourceSupplier<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> DynDataSource<T> {
        FirstAvailableDataSource::create(self.suppliers.clone())
    }
}

struct FirstAvailableState<T> {
    index: usize,
    current: Option<DynDataSource<T>>,
    with_result: Option<DynDataSource<T>>,
}

impl<T> FirstAvailableState<T> {
    /// Take both children, the one with the result only once if it is also the current one.
    fn take_children(&mut self) -> Vec<DynDataSource<T>> {
        let with_result = self.with_result.take();
        let current = self
            .current
            .take()
            .filter(|current| !is_same(with_result.as_ref(), current));
        [with_result, current].into_iter().flatten().collect()
    }
}

fn is_same<T>(a: Option<&DynDataSource<T>>, b: &DynDataSource<T>) -> bool {
    a.is_some_and(|a| Arc::ptr_eq(a, b))
}

struct FirstAvailableDataSource<T: 'static> {
    base: AbstractDataSource<T>,
    suppliers: Arc<Vec<DataSourceSupplier<T>>>,
    state: Mutex<FirstAvailableState<T>>,
}

impl<T> FirstAvailableDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn create(suppliers: Arc<Vec<DataSourceSupplier<T>>>) -> Arc<Self> {
        let data_source = Arc::new_cyclic(|weak: &Weak<Self>| {
            let this: Weak<dyn DataSource<T>> = weak.clone();
            Self {
                base: AbstractDataSource::new(this),
                suppliers,
                state: Mutex::new(FirstAvailableState {
                    index: 0,
                    current: None,
                    with_result: None,
                }),
            }
        });
        if !data_source.start_next_data_source() {
            data_source.base.set_failure(Error::no_data_source());
        }
        data_source
    }

    fn start_next_data_source(self: &Arc<Self>) -> bool {
        let data_source = self.next_supplier().map(|supplier| supplier.get());
        match data_source {
            Some(data_source) if self.set_current_data_source(&data_source) => {
                let subscriber = Arc::new(FirstAvailableSubscriber {
                    parent: Arc::downgrade(self),
                });
                data_source.subscribe(subscriber, CallerThreadExecutor::shared());
                true
            }
            data_source => {
                if let Some(data_source) = data_source {
                    data_source.close();
                }
                false
            }
        }
    }

    fn next_supplier(&self) -> Option<DataSourceSupplier<T>> {
        let mut state = self.state.lock();
        if self.base.is_closed() || state.index >= self.suppliers.len() {
            return None;
        }
        let supplier = self.suppliers[state.index].clone();
        state.index += 1;
        Some(supplier)
    }

    fn set_current_data_source(&self, data_source: &DynDataSource<T>) -> bool {
        let mut state = self.state.lock();
        if self.base.is_closed() {
            return false;
        }
        state.current = Some(data_source.clone());
        true
    }

    fn clear_current_data_source(&self, data_source: &DynDataSource<T>) -> bool {
        let mut state = self.state.lock();
        if self.base.is_closed() || !is_same(state.current.as_ref(), data_source) {
            return false;
        }
        state.current = None;
        true
    }

    fn data_source_with_result(&self) -> Option<DynDataSource<T>> {
        self.state.lock().with_result.clone()
    }

    fn is_data_source_with_result(&self, data_source: &DynDataSource<T>) -> bool {
        is_same(self.state.lock().with_result.as_ref(), data_source)
    }

    fn maybe_set_data_source_with_result(&self, data_source: &DynDataSource<T>, is_finished: bool) {
        let old = {
            let mut state = self.state.lock();
            if !is_same(state.current.as_ref(), data_source) || is_same(state.with_result.as_ref(), data_source) {
                return;
            }
            // A later child only takes over a result of an earlier one with its final result.
            if state.with_result.is_none() || is_finished {
                state.with_result.replace(data_source.clone())
            } else {
                None
            }
        };
        if let Some(old) = old {
            old.close();
        }
    }

    fn on_data_source_failed(self: &Arc<Self>, data_source: &DynDataSource<T>) {
        if !self.clear_current_data_source(data_source) {
            return;
        }
        if !self.is_data_source_with_result(data_source) {
            data_source.close();
        }
        if !self.start_next_data_source() {
            let failure = data_source
                .failure_cause()
                .unwrap_or_else(|| Error::new(ErrorKind::NoDataSource, "data source finished without result"));
            self.base.set_failure(failure);
        }
    }

    fn on_data_source_new_result(&self, data_source: &DynDataSource<T>) {
        let is_finished = data_source.is_finished();
        self.maybe_set_data_source_with_result(data_source, is_finished);
        if self.is_data_source_with_result(data_source) {
            self.base.signal_result(is_finished);
        }
    }

    fn on_data_source_progress(&self, data_source: &DynDataSource<T>) {
        let progress = self.base.progress().max(data_source.progress());
        self.base.set_progress(progress);
    }

    fn close_children(&self) {
        let children = self.state.lock().take_children();
        // Release data out of the lock critical section.
        for data_source in children {
            data_source.close();
        }
    }
}

impl<T> DataSource<T> for FirstAvailableDataSource<T>
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
        // The result lives in the children, the base holds none.
        if !self.base.close() {
            return false;
        }
        self.close_children();
        true
    }

    fn subscribe(&self, subscriber: Arc<dyn DataSubscriber<T>>, executor: Arc<dyn Executor>) {
        self.base.subscribe(subscriber, executor)
    }
}

impl<T: 'static> Drop for FirstAvailableDataSource<T> {
    fn drop(&mut self) {
        for data_source in self.state.get_mut().take_children() {
            data_source.close();
        }
    }
}

struct FirstAvailableSubscriber<T: 'static> {
    parent: Weak<FirstAvailableDataSource<T>>,
}

impl<T> DataSubscriber<T> for FirstAvailableSubscriber<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn on_new_result(&self, data_source: &DynDataSource<T>) {
        let Some(parent) = self.parent.upgrade() else {
            return;
        };
        if data_source.has_result() {
            parent.on_data_source_new_result(data_source);
        } else if data_source.is_finished() {
            parent.on_data_source_failed(data_source);
        }
    }

    fn on_failure(&self, data_source: &DynDataSource<T>) {
        if let Some(parent) = self.parent.upgrade() {
            parent.on_data_source_failed(data_source);
        }
    }

    fn on_cancellation(&self, _: &DynDataSource<T>) {}

    fn on_progress_update(&self, data_source: &DynDataSource<T>) {
        if let Some(parent) = self.parent.upgrade() {
            parent.on_data_source_progress(data_source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        simple::SimpleDataSource,
        sources::{failed_data_source_supplier, immediate_data_source},
        test_utils::{RecordingSubscriber, SubscriberEvent},
    };

    fn failure(message: &'static str) -> Error {
        Error::new(ErrorKind::External, message)
    }

    /// A data source over suppliers that hand out pre-created simple data sources.
    struct Harness {
        children: Vec<Arc<SimpleDataSource<u64>>>,
        data_source: DynDataSource<u64>,
        subscriber: Arc<RecordingSubscriber<u64>>,
    }

    impl Harness {
        fn new(n: usize) -> Self {
            let children = (0..n).map(|_| SimpleDataSource::create()).collect::<Vec<_>>();
            let suppliers = children
                .iter()
                .map(|child| {
                    let child = child.clone();
                    Arc::new(move || -> DynDataSource<u64> { child.clone() }) as DataSourceSupplier<u64>
                })
                .collect();
            let data_source = FirstAvailableDataSourceSupplier::new(suppliers).get();
            let subscriber = Arc::new(RecordingSubscriber::default());
            data_source.subscribe(subscriber.clone(), CallerThreadExecutor::shared());
            Self {
                children,
                data_source,
                subscriber,
            }
        }

        #[track_caller]
        fn assert_closed(&self, closed: &[bool]) {
            let actual = self.children.iter().map(|child| child.is_closed()).collect::<Vec<_>>();
            assert_eq!(actual, closed);
        }
    }

    #[test_log::test]
    fn test_first_child_succeeds() {
        let h = Harness::new(3);
        h.children[0].set_result_with(1, false);
        assert_eq!(h.subscriber.take_events(), vec![SubscriberEvent::NewResult]);
        assert_eq!(h.data_source.result(), Some(1));
        assert!(!h.data_source.is_finished());

        h.children[0].set_result_with(2, true);
        assert_eq!(h.subscriber.take_events(), vec![SubscriberEvent::NewResult]);
        assert_eq!(h.data_source.result(), Some(2));
        assert!(h.data_source.is_finished());
        assert_eq!(h.data_source.progress(), 1.0);
        h.assert_closed(&[false, false, false]);

        h.data_source.close();
        h.assert_closed(&[true, false, false]);
    }

    #[test_log::test]
    fn test_fall_back_on_failure() {
        let h = Harness::new(2);
        h.children[0].set_failure(failure("first"));
        assert!(h.subscriber.take_events().is_empty());
        h.assert_closed(&[true, false]);
        assert!(!h.data_source.is_finished());

        h.children[1].set_result(5);
        assert_eq!(h.subscriber.take_events(), vec![SubscriberEvent::NewResult]);
        assert!(h.data_source.is_finished());
        assert!(!h.data_source.has_failed());
        assert_eq!(h.data_source.result(), Some(5));
    }

    #[test_log::test]
    fn test_all_children_fail() {
        let h = Harness::new(3);
        h.children[0].set_failure(failure("first"));
        h.children[1].set_failure(failure("second"));
        assert!(h.subscriber.take_events().is_empty());
        h.children[2].set_failure(failure("third"));
        assert_eq!(h.subscriber.take_events(), vec![SubscriberEvent::Failure]);
        assert!(h.data_source.has_failed());
        assert_eq!(h.data_source.failure_cause().unwrap().message(), "third");
        h.assert_closed(&[true, true, true]);
    }

    #[test_log::test]
    fn test_later_child_takes_over_with_final_result() {
        let h = Harness::new(2);
        h.children[0].set_result_with(1, false);
        assert_eq!(h.data_source.result(), Some(1));

        // The first child fails after an intermediate result, it keeps the result until the next child finishes.
        h.children[0].set_failure(failure("first"));
        assert!(!h.children[0].is_closed());
        assert_eq!(h.data_source.result(), Some(1));

        h.children[1].set_result_with(2, false);
        assert_eq!(h.data_source.result(), Some(1));
        assert!(!h.children[0].is_closed());

        h.children[1].set_result_with(3, true);
        assert_eq!(h.data_source.result(), Some(3));
        assert!(h.children[0].is_closed());
        assert!(h.data_source.is_finished());
    }

    #[test_log::test]
    fn test_close_closes_children() {
        let h = Harness::new(3);
        h.children[0].set_failure(failure("first"));
        assert!(h.data_source.close());
        assert!(!h.data_source.close());
        assert_eq!(h.subscriber.take_events(), vec![SubscriberEvent::Cancellation]);
        h.assert_closed(&[true, true, false]);

        // Late callbacks of children do not resurrect the data source.
        h.children[1].set_result(2);
        assert!(h.subscriber.take_events().is_empty());
        assert_eq!(h.data_source.result(), None);
    }

    #[test_log::test]
    fn test_progress_is_max_of_children() {
        let h = Harness::new(2);
        h.children[0].set_progress(0.4);
        assert_eq!(h.data_source.progress(), 0.4);
        h.children[0].set_failure(failure("first"));
        h.children[1].set_progress(0.2);
        assert_eq!(h.data_source.progress(), 0.4);
        h.children[1].set_progress(0.7);
        assert_eq!(h.data_source.progress(), 0.7);
    }

    #[test_log::test]
    fn test_no_suppliers() {
        let ds = FirstAvailableDataSourceSupplier::<u64>::new(vec![]).get();
        assert!(ds.has_failed());
        assert_eq!(ds.failure_cause().unwrap().kind(), ErrorKind::NoDataSource);
    }

    #[test_log::test]
    fn test_immediate_children() {
        let supplier = FirstAvailableDataSourceSupplier::new(vec![
            failed_data_source_supplier(failure("first")),
            Arc::new(|| immediate_data_source(9u64)) as DataSourceSupplier<u64>,
        ]);
        let ds = supplier.get();
        assert!(ds.is_finished());
        assert_eq!(ds.result(), Some(9));

        // Each call builds a new data source.
        let other = supplier.get();
        assert!(!Arc::ptr_eq(&ds, &other));
    }

    #[test_log::test]
    fn test_nested_composites() {
        let inner = FirstAvailableDataSourceSupplier::new(vec![failed_data_source_supplier::<u64>(failure("inner"))]);
        let outer = FirstAvailableDataSourceSupplier::new(vec![
            Arc::new(inner) as DataSourceSupplier<u64>,
            Arc::new(|| immediate_data_source(3u64)) as DataSourceSupplier<u64>,
        ]);
        let ds = outer.get();
        assert_eq!(ds.result(), Some(3));
    }

    /// A child that counts how often it is asked to close.
    struct CloseCountingDataSource {
        base: AbstractDataSource<u64>,
        closes: std::sync::atomic::AtomicUsize,
    }

    impl CloseCountingDataSource {
        fn create() -> Arc<Self> {
            Arc::new_cyclic(|weak: &Weak<Self>| {
                let this: Weak<dyn DataSource<u64>> = weak.clone();
                Self {
                    base: AbstractDataSource::new(this),
                    closes: std::sync::atomic::AtomicUsize::new(0),
                }
            })
        }

        fn closes(&self) -> usize {
            self.closes.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl DataSource<u64> for CloseCountingDataSource {
        fn is_closed(&self) -> bool {
            self.base.is_closed()
        }

        fn result(&self) -> Option<u64> {
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
            self.closes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.base.close()
        }

        fn subscribe(&self, subscriber: Arc<dyn DataSubscriber<u64>>, executor: Arc<dyn Executor>) {
            self.base.subscribe(subscriber, executor)
        }
    }

    #[test_log::test]
    fn test_child_with_result_is_closed_once() {
        let child = CloseCountingDataSource::create();
        let c = child.clone();
        let ds = FirstAvailableDataSourceSupplier::new(vec![
            Arc::new(move || -> DynDataSource<u64> { c.clone() }) as DataSourceSupplier<u64>
        ])
        .get();

        // The child is both the current one and the one with the result.
        child.base.set_result(1, false);
        assert_eq!(ds.result(), Some(1));

        assert!(ds.close());
        assert_eq!(child.closes(), 1);
        assert!(child.is_closed());

        let child = CloseCountingDataSource::create();
        let c = child.clone();
        let ds = FirstAvailableDataSourceSupplier::new(vec![
            Arc::new(move || -> DynDataSource<u64> { c.clone() }) as DataSourceSupplier<u64>
        ])
        .get();
        child.base.set_result(1, false);
        drop(ds);
        assert_eq!(child.closes(), 1);
    }
}
