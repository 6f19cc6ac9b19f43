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

/// Supplies values of type `T` on demand.
///
/// Any `Fn() -> T` closure is a supplier.
pub trait Supplier<T>: Send + Sync + 'static {
    /// Get a value.
    fn get(&self) -> T;
}

impl<T, F> Supplier<T> for F
where
    F: Fn() -> T + Send + Sync + 'static,
{
    fn get(&self) -> T {
        self()
    }
}

/// A supplier that always returns a clone of the same instance.
#[derive(Debug, Clone)]
pub struct InstanceSupplier<T>(T);

impl<T> InstanceSupplier<T> {
    /// Create a supplier of the given instance.
    pub fn new(instance: T) -> Self {
        Self(instance)
    }
}

impl<T> Supplier<T> for InstanceSupplier<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        self.0.clone()
    }
}
