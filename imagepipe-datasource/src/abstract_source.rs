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
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Weak},
};

use imagepipe_common::{error::Error, executor::Executor};
use parking_lot::Mutex;

use crate::data_source::{DataSource, DataSubscriber, DynDataSource};

type ResultReleaser<T> = Box<dyn Fn(T) + Send + Sync + 'static>;
type Subscription<T> = (Arc<dyn DataSubscriber<T>>, Arc<dyn Executor>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataSourceStatus {
    InProgress,
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notification {
    NewResult,
    Failure,
    Cancellation,
    ProgressUpdate,
}

struct DataSourceState<T> {
    status: DataSourceStatus,
    is_closed: bool,
    result: Option<T>,
    failure: Option<Error>,
    progress: f32,
    subscribers: Vec<Subscription<T>>,
}

impl<T> DataSourceState<T> {
    fn is_finished(&self) -> bool {
        self.status != DataSourceStatus::InProgress
    }

    fn was_cancelled(&self) -> bool {
        self.is_closed && !self.is_finished()
    }

    /// Kind of the notification that reflects the current state.
    fn notification(&self) -> Notification {
        if self.status == DataSourceStatus::Failure {
            Notification::Failure
        } else if self.was_cancelled() {
            Notification::Cancellation
        } else {
            Notification::NewResult
        }
    }

    fn accepts_transition(&self) -> bool {
        !self.is_closed && self.status == DataSourceStatus::InProgress
    }
}

/// The state machine shared by all data sources.
///
/// A concrete data source embeds an `AbstractDataSource` and forwards the [`DataSource`] methods to it, overriding
/// the ones it computes differently. The state is guarded by one mutex. Transitions are linearized by that mutex:
/// when [`AbstractDataSource::close`] races with a final [`AbstractDataSource::set_result`], whichever takes the lock
/// first wins.
///
/// Results that are replaced, rejected or held when the data source is closed are released out of the lock, with the
/// result releaser if one is set or by dropping them otherwise. Notifications are posted to the executor of each
/// subscriber, a panicking subscriber is logged and does not affect the other ones.
pub struct AbstractDataSource<T> {
    this: Weak<dyn DataSource<T>>,
    state: Mutex<DataSourceState<T>>,
    result_releaser: Option<ResultReleaser<T>>,
}

impl<T> Debug for AbstractDataSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AbstractDataSource")
            .field("status", &state.status)
            .field("is_closed", &state.is_closed)
            .field("has_result", &state.result.is_some())
            .field("progress", &state.progress)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl<T> AbstractDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create the state machine of a data source.
    ///
    /// `this` points to the data source that embeds it, it is handed to the subscribers on notification. Build the
    /// data source with [`Arc::new_cyclic`] to get it.
    pub fn new(this: Weak<dyn DataSource<T>>) -> Self {
        Self {
            this,
            state: Mutex::new(DataSourceState {
                status: DataSourceStatus::InProgress,
                is_closed: false,
                result: None,
                failure: None,
                progress: 0.0,
                subscribers: vec![],
            }),
            result_releaser: None,
        }
    }

    /// Release results with the given releaser instead of dropping them.
    pub fn with_result_releaser<F>(mut self, releaser: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.result_releaser = Some(Box::new(releaser));
        self
    }

    /// See [`DataSource::is_closed`].
    pub fn is_closed(&self) -> bool {
        self.state.lock().is_closed
    }

    /// See [`DataSource::result`].
    pub fn result(&self) -> Option<T> {
        self.state.lock().result.clone()
    }

    /// See [`DataSource::has_result`].
    pub fn has_result(&self) -> bool {
        self.state.lock().result.is_some()
    }

    /// See [`DataSource::is_finished`].
    pub fn is_finished(&self) -> bool {
        self.state.lock().is_finished()
    }

    /// See [`DataSource::has_failed`].
    pub fn has_failed(&self) -> bool {
        self.state.lock().status == DataSourceStatus::Failure
    }

    /// See [`DataSource::failure_cause`].
    pub fn failure_cause(&self) -> Option<Error> {
        self.state.lock().failure.clone()
    }

    /// See [`DataSource::progress`].
    pub fn progress(&self) -> f32 {
        self.state.lock().progress
    }

    /// Close the data source.
    ///
    /// Returns `false` if it was already closed. Otherwise releases the result, notifies the subscribers of the
    /// cancellation if the data source had not finished, and drops the subscribers.
    pub fn close(&self) -> bool {
        let (result, subscribers, notification) = {
            let mut state = self.state.lock();
            if state.is_closed {
                return false;
            }
            state.is_closed = true;
            let result = state.result.take();
            let subscribers = std::mem::take(&mut state.subscribers);
            let notification = state.was_cancelled().then_some(Notification::Cancellation);
            (result, subscribers, notification)
        };

        tracing::trace!("[data source]: close, cancelled: {}", notification.is_some());

        // Release data out of the lock critical section.
        if let Some(result) = result {
            self.release_result(result);
        }
        if let Some(notification) = notification {
            self.notify(subscribers, notification);
        }
        true
    }

    /// Subscribe to the data source.
    ///
    /// The subscriber is kept for further notifications while the data source is in progress. If the data source
    /// already has a result, has finished or was cancelled, the subscriber is notified of the current state.
    pub fn subscribe(&self, subscriber: Arc<dyn DataSubscriber<T>>, executor: Arc<dyn Executor>) {
        {
            let mut state = self.state.lock();
            if state.is_closed {
                return;
            }
            if state.status == DataSourceStatus::InProgress {
                state.subscribers.push((subscriber.clone(), executor.clone()));
            }
        }

        // The data source that embeds this one may compute its result differently, ask it out of the lock.
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let (is_settled, notification) = {
            let state = self.state.lock();
            (state.is_finished() || state.was_cancelled(), state.notification())
        };
        if is_settled || this.has_result() {
            Self::post(this, subscriber, executor, notification);
        }
    }

    /// Set a new result.
    ///
    /// Returns `false` and releases the value if the data source is closed or has finished. Otherwise the value
    /// replaces the current result, which is released, and the subscribers are notified. If `is_last` is set, the
    /// data source finishes with success and its progress is set to `1`.
    pub fn set_result(&self, value: T, is_last: bool) -> bool {
        let (accepted, released, subscribers) = {
            let mut state = self.state.lock();
            if !state.accepts_transition() {
                (false, Some(value), vec![])
            } else {
                if is_last {
                    state.status = DataSourceStatus::Success;
                    state.progress = 1.0;
                }
                let released = state.result.replace(value);
                (true, released, state.subscribers.clone())
            }
        };

        if !accepted {
            tracing::warn!("[data source]: reject result of a closed or finished data source");
        }

        // Release data out of the lock critical section.
        if let Some(released) = released {
            self.release_result(released);
        }
        if accepted {
            self.notify(subscribers, Notification::NewResult);
        }
        accepted
    }

    /// Signal a new result without storing it.
    ///
    /// Used by composite data sources, whose result lives in one of their children. Same transition rules as
    /// [`AbstractDataSource::set_result`].
    pub fn signal_result(&self, is_last: bool) -> bool {
        let subscribers = {
            let mut state = self.state.lock();
            if !state.accepts_transition() {
                return false;
            }
            if is_last {
                state.status = DataSourceStatus::Success;
                state.progress = 1.0;
            }
            state.subscribers.clone()
        };
        self.notify(subscribers, Notification::NewResult);
        true
    }

    /// Finish the data source with failure.
    ///
    /// Returns `false` if the data source is closed or has finished.
    pub fn set_failure(&self, failure: Error) -> bool {
        let subscribers = {
            let mut state = self.state.lock();
            if !state.accepts_transition() {
                tracing::warn!("[data source]: reject failure of a closed or finished data source: {failure}");
                return false;
            }
            state.status = DataSourceStatus::Failure;
            state.failure = Some(failure);
            state.subscribers.clone()
        };
        self.notify(subscribers, Notification::Failure);
        true
    }

    /// Update the progress.
    ///
    /// Returns `false` if the data source is closed or has finished, if the progress is not within `[0, 1]`, or if the
    /// progress would decrease.
    pub fn set_progress(&self, progress: f32) -> bool {
        if !(0.0..=1.0).contains(&progress) {
            tracing::warn!("[data source]: ignore progress {progress} out of range");
            return false;
        }
        let subscribers = {
            let mut state = self.state.lock();
            if !state.accepts_transition() || progress < state.progress {
                return false;
            }
            state.progress = progress;
            state.subscribers.clone()
        };
        self.notify(subscribers, Notification::ProgressUpdate);
        true
    }

    fn release_result(&self, result: T) {
        match self.result_releaser.as_ref() {
            Some(releaser) => releaser(result),
            None => drop(result),
        }
    }

    fn notify(&self, subscribers: Vec<Subscription<T>>, notification: Notification) {
        if subscribers.is_empty() {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        for (subscriber, executor) in subscribers {
            Self::post(this.clone(), subscriber, executor, notification);
        }
    }

    fn post(
        this: DynDataSource<T>,
        subscriber: Arc<dyn DataSubscriber<T>>,
        executor: Arc<dyn Executor>,
        notification: Notification,
    ) {
        executor.execute(Box::new(move || {
            let res = catch_unwind(AssertUnwindSafe(|| match notification {
                Notification::NewResult => subscriber.on_new_result(&this),
                Notification::Failure => subscriber.on_failure(&this),
                Notification::Cancellation => subscriber.on_cancellation(&this),
                Notification::ProgressUpdate => subscriber.on_progress_update(&this),
            }));
            if res.is_err() {
                tracing::error!("[data source]: subscriber panicked on {notification:?}");
            }
        }));
    }
}
