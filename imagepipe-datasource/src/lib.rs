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

//! Data sources of imagepipe.
//!
//! A [`DataSource`](crate::data_source::DataSource) is a cancellable container for progressively improving results,
//! observed with [`DataSubscriber`](crate::data_source::DataSubscriber)s. Composite data sources combine the data
//! sources of several suppliers with a policy: the first available result, or the best result so far.

/// The state machine shared by all data sources.
pub mod abstract_source;
/// Data source and subscriber traits.
pub mod data_source;
/// The data source over the first child with a result.
pub mod first_available;
/// The data source over the best child result so far.
pub mod increasing_quality;
/// Data source of shared values.
pub mod settable;
/// Data source set by its owner.
pub mod simple;
/// Immediate data sources and suppliers.
pub mod sources;
/// Subscriber that closes the data source when done.
pub mod subscriber;
/// Test utilities.
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

/// Re-export of the commonly used items.
pub mod prelude;
