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

use imagepipe_common::{error::Error, executor::Executor, reference::CloseableReference};

use crate::{
    abstract_source::AbstractDataSource,
    data_source::{DataSource, DataSubscriber},
};

/// A data source of shared values.
///
/// The data source holds its own handle to the result: [`SettableDataSource::set`] clones the given handle and
/// [`DataSource::result`] returns a new clone on every call. The held handle is closed when it is replaced or when
/// the data source is closed.
#[derive(Debug)]
pub struct SettableDataSource<V> {
    base: AbstractDataSource<CloseableReference<V>>,
}

impl<V> SettableDataSource<V>
where
    V: Send + Sync + 'static,
{
    /// Create a data source in progress.
    pub fn create() -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let this: Weak<dyn DataSource<CloseableReference<V>>> = weak.clone();
            Self {
                base: AbstractDataSource::new(this).with_result_releaser(|mut reference: CloseableReference<V>| {
                    reference.close()
                }),
            }
        })
    }

    /// Set the last result. The data source finishes with success.
    ///
    /// # Panics
    ///
    /// Panics if the given handle is closed.
    pub fn set(&self, value: &CloseableReference<V>) -> bool {
        self.base.set_result(value.clone(), true)
    }

    /// Finish the data source with failure.
    pub fn set_exception(&self, failure: Error) -> bool {
        self.base.set_failure(failure)
    }

    /// Update the progress, it never decreases.
    pub fn set_progress(&self, progress: f32) -> bool {
        self.base.set_progress(progress)
    }
}

impl<V> DataSource<CloseableReference<V>> for SettableDataSource<V>
where
    V: Send + Sync + 'static,
{
    fn is_closed(&self) -> bool {
        self.base.is_closed()
    }

    fn result(&self) -> Option<CloseableReference<V>> {
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

    fn subscribe(
        &self,
        subscriber: Arc<dyn DataSubscriber<CloseableReference<V>>>,
        executor: Arc<dyn Executor>,
    ) {
        self.base.subscribe(subscriber, executor)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use imagepipe_common::{error::ErrorKind, executor::CallerThreadExecutor};

    use super::*;
    use crate::test_utils::{RecordingSubscriber, SubscriberEvent};

    fn counted(value: u64) -> (CloseableReference<u64>, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let r = released.clone();
        let reference = CloseableReference::of(value, move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });
        (reference, released)
    }

    #[test_log::test]
    fn test_initial_state() {
        let ds = SettableDataSource::<u64>::create();
        assert!(!ds.is_closed());
        assert!(!ds.is_finished());
        assert!(!ds.has_result());
        assert!(ds.result().is_none());
    }

    #[test_log::test]
    fn test_set_clones_and_returns_clones() {
        let ds = SettableDataSource::create();
        let (mut original, released) = counted(42);
        assert!(ds.set(&original));
        assert!(ds.is_finished());
        assert_eq!(original.refs(), 2);

        // The data source keeps the value alive.
        original.close();
        assert_eq!(released.load(Ordering::SeqCst), 0);

        let mut result = ds.result().unwrap();
        assert_eq!(*result, 42);
        assert_eq!(result.refs(), 2);
        result.close();

        ds.close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(ds.result().is_none());
    }

    #[test_log::test]
    fn test_rejected_value_is_not_held() {
        let ds = SettableDataSource::create();
        let (first, _) = counted(1);
        let (mut second, released) = counted(2);
        assert!(ds.set(&first));
        assert!(!ds.set(&second));
        assert_eq!(second.refs(), 1);
        second.close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(*ds.result().unwrap(), 1);
    }

    #[test_log::test]
    fn test_set_exception() {
        let ds = SettableDataSource::<u64>::create();
        let subscriber = Arc::new(RecordingSubscriber::default());
        ds.subscribe(subscriber.clone(), CallerThreadExecutor::shared());
        assert!(ds.set_progress(0.5));
        assert!(ds.set_exception(Error::new(ErrorKind::Io, "disk read failed")));
        assert!(ds.has_failed());
        assert_eq!(ds.failure_cause().unwrap().kind(), ErrorKind::Io);
        assert_eq!(
            subscriber.take_events(),
            vec![SubscriberEvent::ProgressUpdate, SubscriberEvent::Failure]
        );
    }
}
