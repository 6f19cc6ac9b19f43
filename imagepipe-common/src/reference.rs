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

use std::{fmt::Debug, mem::ManuallyDrop, ops::Deref, sync::Arc};

type Releaser<T> = Box<dyn FnOnce(T) + Send + Sync + 'static>;
type OnRelease = Box<dyn FnOnce() + Send + Sync + 'static>;

enum Resource<T> {
    Owned {
        value: ManuallyDrop<T>,
        releaser: Option<Releaser<T>>,
    },
    Derived {
        parent: CloseableReference<T>,
        on_release: Option<OnRelease>,
    },
}

/// The shared part of a [`CloseableReference`].
///
/// The shared count is the strong count of the [`Arc`] that wraps it, so the release runs exactly once, on the thread
/// that drops the last handle.
struct SharedReference<T> {
    resource: Resource<T>,
}

impl<T> SharedReference<T> {
    fn get(&self) -> &T {
        match &self.resource {
            Resource::Owned { value, .. } => value,
            Resource::Derived { parent, .. } => parent.get(),
        }
    }
}

impl<T> Drop for SharedReference<T> {
    fn drop(&mut self) {
        match &mut self.resource {
            Resource::Owned { value, releaser } => {
                // Safety: The value is only taken once here, the shared reference is not accessible anymore.
                let value = unsafe { ManuallyDrop::take(value) };
                tracing::trace!("[reference]: release shared value");
                match releaser.take() {
                    Some(releaser) => releaser(value),
                    None => drop(value),
                }
            }
            Resource::Derived { parent, on_release } => {
                parent.close();
                if let Some(on_release) = on_release.take() {
                    on_release();
                }
            }
        }
    }
}

/// A clonable handle to a shared value, with a releaser that runs exactly once when the last handle is closed.
///
/// Each handle owns one share of the count. [`Clone`] takes another share, [`CloseableReference::close`] (or dropping
/// the handle) gives it back. Closing an already closed handle is a no-op. Reading or cloning a closed handle is a
/// programmer error and panics.
///
/// ```rust
/// # use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
/// # use imagepipe_common::reference::CloseableReference;
/// let released = Arc::new(AtomicUsize::new(0));
/// let r = released.clone();
/// let mut a = CloseableReference::of(vec![0u8; 16], move |_| {
///     r.fetch_add(1, Ordering::Relaxed);
/// });
/// let b = a.clone();
/// a.close();
/// assert_eq!(released.load(Ordering::Relaxed), 0);
/// drop(b);
/// assert_eq!(released.load(Ordering::Relaxed), 1);
/// ```
pub struct CloseableReference<T> {
    shared: Option<Arc<SharedReference<T>>>,
}

impl<T> CloseableReference<T>
where
    T: Send + Sync + 'static,
{
    /// Wrap the value. The value is dropped when the last handle is closed.
    pub fn new(value: T) -> Self {
        Self::from_resource(Resource::Owned {
            value: ManuallyDrop::new(value),
            releaser: None,
        })
    }

    /// Wrap the value with a releaser that is called with the value when the last handle is closed.
    ///
    /// The releaser must not panic.
    pub fn of<F>(value: T, releaser: F) -> Self
    where
        F: FnOnce(T) + Send + Sync + 'static,
    {
        Self::from_resource(Resource::Owned {
            value: ManuallyDrop::new(value),
            releaser: Some(Box::new(releaser)),
        })
    }

    /// Issue a handle with its own shared count over the same value.
    ///
    /// The derived handle keeps this handle's share alive. When the last clone of the derived handle is closed, the
    /// share is given back and then `on_release` is called.
    ///
    /// # Panics
    ///
    /// Panics if the handle is closed.
    pub fn derive<F>(&self, on_release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self::from_resource(Resource::Derived {
            parent: self.clone(),
            on_release: Some(Box::new(on_release)),
        })
    }

    fn from_resource(resource: Resource<T>) -> Self {
        Self {
            shared: Some(Arc::new(SharedReference { resource })),
        }
    }
}

impl<T> CloseableReference<T> {
    /// Get the shared value.
    ///
    /// # Panics
    ///
    /// Panics if the handle is closed.
    pub fn get(&self) -> &T {
        match self.try_get() {
            Some(value) => value,
            None => panic!("use of a closed reference"),
        }
    }

    /// Get the shared value, or `None` if the handle is closed.
    pub fn try_get(&self) -> Option<&T> {
        self.shared.as_ref().map(|shared| shared.get())
    }

    /// Check if the handle is still open.
    pub fn is_valid(&self) -> bool {
        self.shared.is_some()
    }

    /// Clone the handle if it is still open.
    pub fn clone_or_none(&self) -> Option<Self> {
        self.shared.as_ref().map(|shared| Self {
            shared: Some(shared.clone()),
        })
    }

    /// Give back the share held by this handle.
    ///
    /// Closing a closed handle does nothing.
    pub fn close(&mut self) {
        if let Some(shared) = self.shared.take() {
            tracing::trace!("[reference]: close, refs: {} -> {}", Arc::strong_count(&shared), Arc::strong_count(&shared) - 1);
            drop(shared);
        }
    }

    /// Shared count of the handle, `0` if the handle is closed.
    ///
    /// For diagnostics only, the value may be stale as soon as it is returned.
    pub fn refs(&self) -> usize {
        self.shared.as_ref().map(Arc::strong_count).unwrap_or_default()
    }

    /// Check if two open handles expose the same underlying value.
    ///
    /// A derived handle exposes the same value as its parent.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.try_get(), other.try_get()) {
            (Some(a), Some(b)) => std::ptr::eq(a, b),
            _ => false,
        }
    }

    /// Close the handle if there is one.
    pub fn close_safely(reference: Option<Self>) {
        if let Some(mut reference) = reference {
            reference.close();
        }
    }

    /// Close all given handles.
    pub fn close_all(references: impl IntoIterator<Item = Self>) {
        references.into_iter().for_each(|mut reference| reference.close());
    }
}

impl<T> Clone for CloseableReference<T> {
    /// # Panics
    ///
    /// Panics if the handle is closed.
    fn clone(&self) -> Self {
        match self.clone_or_none() {
            Some(reference) => reference,
            None => panic!("clone of a closed reference"),
        }
    }
}

impl<T> Drop for CloseableReference<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> Deref for CloseableReference<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get()
    }
}

impl<T> Debug for CloseableReference<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseableReference")
            .field("value", &self.try_get())
            .field("refs", &self.refs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<CloseableReference<Vec<u8>>>();
    }

    fn counted(value: u64) -> (CloseableReference<u64>, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let r = released.clone();
        let reference = CloseableReference::of(value, move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });
        (reference, released)
    }

    #[test_log::test]
    fn test_release_on_last_close() {
        let (mut a, released) = counted(42);
        let mut b = a.clone();
        let mut c = b.clone();
        assert_eq!(a.refs(), 3);

        a.close();
        b.close();
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(*c.get(), 42);
        assert_eq!(c.refs(), 1);

        c.close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_double_close_is_noop() {
        let (mut a, released) = counted(1);
        let b = a.clone();
        a.close();
        a.close();
        assert!(!a.is_valid());
        assert!(b.is_valid());
        assert_eq!(b.refs(), 1);
        drop(b);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "clone of a closed reference")]
    fn test_clone_closed_panics() {
        let (mut a, _) = counted(1);
        a.close();
        let _ = a.clone();
    }

    #[test]
    #[should_panic(expected = "use of a closed reference")]
    fn test_get_closed_panics() {
        let (mut a, _) = counted(1);
        a.close();
        let _ = a.get();
    }

    #[test]
    fn test_clone_or_none() {
        let (mut a, released) = counted(7);
        let b = a.clone_or_none().unwrap();
        a.close();
        assert!(a.clone_or_none().is_none());
        assert_eq!(*b, 7);
        CloseableReference::close_safely(Some(b));
        CloseableReference::<u64>::close_safely(None);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_derived_reference() {
        let (mut parent, released) = counted(9);
        let derived_released = Arc::new(AtomicUsize::new(0));
        let d = derived_released.clone();
        let mut derived = parent.derive(move || {
            d.fetch_add(1, Ordering::SeqCst);
        });
        let mut derived2 = derived.clone();

        assert!(derived.ptr_eq(&parent));
        assert_eq!(parent.refs(), 2);
        assert_eq!(derived.refs(), 2);

        // The derived handle keeps the value alive.
        parent.close();
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(*derived2.get(), 9);

        derived.close();
        assert_eq!(derived_released.load(Ordering::SeqCst), 0);
        derived2.close();
        assert_eq!(derived_released.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ptr_eq() {
        let a = CloseableReference::new(1u64);
        let b = a.clone();
        let c = CloseableReference::new(1u64);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        let mut d = b.clone();
        d.close();
        assert!(!a.ptr_eq(&d));
    }

    #[test_log::test]
    fn test_concurrent_clone_close() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 1000;

        let (root, released) = counted(0);
        let handles = (0..THREADS)
            .map(|_| {
                let reference = root.clone();
                std::thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        let mut r = reference.clone();
                        assert_eq!(*r.get(), 0);
                        r.close();
                    }
                })
            })
            .collect::<Vec<_>>();
        drop(root);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
