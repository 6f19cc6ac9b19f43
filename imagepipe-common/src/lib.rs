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

//! Shared components for imagepipe: errors, the ownership handle, executors, suppliers and memory trim signals.

/// Allow to enable debug assertions in release profile with feature "strict_assertion".
pub mod assert;
/// Key and value traits.
pub mod code;
/// The error type and result alias shared by all imagepipe crates.
pub mod error;
/// Executors that deliver data source notifications.
pub mod executor;
/// Memory pressure signals and the trimmable registry.
pub mod memory;
/// The reference counted ownership handle.
pub mod reference;
/// Value suppliers.
pub mod supplier;
