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

//! Test utilities for data sources.

use std::{collections::VecDeque, fmt::Debug};

use imagepipe_common::executor::{Executor, Task};
use parking_lot::Mutex;

use crate::data_source::{DataSubscriber, DynDataSource};

/// An executor that queues tasks until they are run explicitly.
#[derive(Default)]
pub struct QueuedExecutor {
    tasks: Mutex<VecDeque<Task>>,
}

impl Debug for QueuedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedExecutor").field("tasks", &self.len()).finish()
    }
}

impl QueuedExecutor {
    /// Count of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Check if no task is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the queued tasks in order, including the ones queued while running. Returns the count of run tasks.
    pub fn run_all(&self) -> usize {
        let mut count = 0;
        loop {
            // Run out of the lock, a task may queue another one.
            let task = self.tasks.lock().pop_front();
            let Some(task) = task else {
                break;
            };
            task();
            count += 1;
        }
        count
    }
}

impl Executor for QueuedExecutor {
    fn execute(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

/// A notification received by a [`RecordingSubscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberEvent {
    /// `on_new_result`.
    NewResult,
    /// `on_failure`.
    Failure,
    /// `on_cancellation`.
    Cancellation,
    /// `on_progress_update`.
    ProgressUpdate,
}

/// A subscriber that records the notifications it receives.
///
/// The result of the data source is recorded on every new result notification.
pub struct RecordingSubscriber<T> {
    events: Mutex<Vec<SubscriberEvent>>,
    results: Mutex<Vec<Option<T>>>,
}

impl<T> Default for RecordingSubscriber<T> {
    fn default() -> Self {
        Self {
            events: Mutex::new(vec![]),
            results: Mutex::new(vec![]),
        }
    }
}

impl<T> Debug for RecordingSubscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSubscriber")
            .field("events", &*self.events.lock())
            .finish()
    }
}

impl<T> RecordingSubscriber<T>
where
    T: Clone,
{
    /// Take the recorded events.
    pub fn take_events(&self) -> Vec<SubscriberEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Results seen on each new result notification so far.
    pub fn results(&self) -> Vec<Option<T>> {
        self.results.lock().clone()
    }

    /// Drop the recorded results.
    pub fn clear_results(&self) {
        self.results.lock().clear();
    }
}

impl<T> DataSubscriber<T> for RecordingSubscriber<T>
where
    T: Send + Sync + 'static,
{
    fn on_new_result(&self, data_source: &DynDataSource<T>) {
        let result = data_source.result();
        self.results.lock().push(result);
        self.events.lock().push(SubscriberEvent::NewResult);
    }

    fn on_failure(&self, _: &DynDataSource<T>) {
        self.events.lock().push(SubscriberEvent::Failure);
    }

    fn on_cancellation(&self, _: &DynDataSource<T>) {
        self.events.lock().push(SubscriberEvent::Cancellation);
    }

    fn on_progress_update(&self, _: &DynDataSource<T>) {
        self.events.lock().push(SubscriberEvent::ProgressUpdate);
    }
}
