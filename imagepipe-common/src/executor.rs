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

use std::{fmt::Debug, sync::Arc};

/// A detached unit of work posted to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// An executor that runs posted tasks, used to deliver data source notifications.
pub trait Executor: Debug + Send + Sync + 'static {
    /// Run the task, now or later, on this thread or another one.
    fn execute(&self, task: Task);
}

/// An executor that runs the task inline on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallerThreadExecutor;

impl CallerThreadExecutor {
    /// Create a shared caller-thread executor.
    pub fn shared() -> Arc<dyn Executor> {
        Arc::new(Self)
    }
}

impl Executor for CallerThreadExecutor {
    fn execute(&self, task: Task) {
        task()
    }
}

#[cfg(feature = "executor-tokio")]
pub use self::tokio_runtime::{BackgroundShutdownRuntime, TokioHandleExecutor, TokioRuntimeExecutor};

#[cfg(feature = "executor-tokio")]
mod tokio_runtime {
    use std::{
        fmt::Debug,
        mem::ManuallyDrop,
        ops::{Deref, DerefMut},
        sync::Arc,
    };

    use tokio::runtime::{Handle, Runtime};

    use super::{Executor, Task};

    /// A wrapper around [`Runtime`] that shuts down the runtime in the background when dropped.
    ///
    /// This is necessary because directly dropping a nested runtime is not allowed in a parent runtime.
    ///
    /// FYI: https://docs.rs/tokio/latest/tokio/runtime/struct.Runtime.html#method.shutdown_background
    pub struct BackgroundShutdownRuntime(ManuallyDrop<Runtime>);

    impl Debug for BackgroundShutdownRuntime {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_tuple("BackgroundShutdownRuntime").finish()
        }
    }

    impl Drop for BackgroundShutdownRuntime {
        fn drop(&mut self) {
            // Safety: The runtime is only dropped once here.
            let runtime = unsafe { ManuallyDrop::take(&mut self.0) };
            runtime.shutdown_background();
        }
    }

    impl Deref for BackgroundShutdownRuntime {
        type Target = Runtime;

        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }

    impl DerefMut for BackgroundShutdownRuntime {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.0
        }
    }

    impl From<Runtime> for BackgroundShutdownRuntime {
        fn from(runtime: Runtime) -> Self {
            Self(ManuallyDrop::new(runtime))
        }
    }

    /// An executor that owns a tokio [`Runtime`] and runs tasks on its blocking pool.
    #[derive(Debug, Clone)]
    pub struct TokioRuntimeExecutor {
        inner: Arc<BackgroundShutdownRuntime>,
    }

    impl TokioRuntimeExecutor {
        /// Creates a new `TokioRuntimeExecutor` from a `Runtime`.
        pub fn new(inner: Runtime) -> Self {
            Self {
                inner: Arc::new(inner.into()),
            }
        }
    }

    impl From<Runtime> for TokioRuntimeExecutor {
        fn from(inner: Runtime) -> Self {
            Self::new(inner)
        }
    }

    impl Executor for TokioRuntimeExecutor {
        fn execute(&self, task: Task) {
            self.inner.spawn_blocking(task);
        }
    }

    /// An executor that uses a `Handle` to run tasks on the blocking pool of an existing runtime.
    #[derive(Debug, Clone)]
    pub struct TokioHandleExecutor {
        inner: Handle,
    }

    impl TokioHandleExecutor {
        /// Creates a new `TokioHandleExecutor` from a `Handle`.
        pub fn new(inner: Handle) -> Self {
            Self { inner }
        }

        /// Creates a new `TokioHandleExecutor` from the current runtime handle.
        ///
        /// # Panics
        ///
        /// Panics if called outside of a tokio runtime.
        pub fn current() -> Self {
            Self::new(Handle::current())
        }
    }

    impl From<Handle> for TokioHandleExecutor {
        fn from(inner: Handle) -> Self {
            Self::new(inner)
        }
    }

    impl Executor for TokioHandleExecutor {
        fn execute(&self, task: Task) {
            self.inner.spawn_blocking(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread::ThreadId,
    };

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_caller_thread_executor_runs_inline() {
        let tid: Arc<Mutex<Option<ThreadId>>> = Arc::new(Mutex::new(None));
        let t = tid.clone();
        CallerThreadExecutor.execute(Box::new(move || {
            *t.lock() = Some(std::thread::current().id());
        }));
        assert_eq!(*tid.lock(), Some(std::thread::current().id()));
    }

    #[cfg(feature = "executor-tokio")]
    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn test_tokio_handle_executor() {
        let (tx, rx) = ::tokio::sync::oneshot::channel();
        let executor = TokioHandleExecutor::current();
        executor.execute(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));
        let tid = rx.await.unwrap();
        assert_ne!(tid, std::thread::current().id());
    }

    #[cfg(feature = "executor-tokio")]
    #[test_log::test]
    fn test_tokio_runtime_executor() {
        let runtime = ::tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let executor = TokioRuntimeExecutor::new(runtime);
        let done = Arc::new(AtomicBool::new(false));
        let (tx, rx) = std::sync::mpsc::channel();
        let d = done.clone();
        executor.execute(Box::new(move || {
            d.store(true, Ordering::SeqCst);
            tx.send(()).unwrap();
        }));
        rx.recv().unwrap();
        assert!(done.load(Ordering::SeqCst));
    }
}
