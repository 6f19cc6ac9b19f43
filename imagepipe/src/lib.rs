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

//! imagepipe - the resource core of an image pipeline.
//!
//! The crate wires the counting memory caches, the data sources and the ownership handle together with the encoded
//! image types shared by the pipeline stages.

pub use imagepipe_common as common;
pub use imagepipe_datasource as datasource;
pub use imagepipe_memory as memory;

/// Pooled byte buffers and their factory.
pub mod buffer;
/// The disk cache interface.
pub mod disk;
/// Encoded images.
pub mod encoded_image;
/// Factories of the memory caches.
pub mod factory;
/// Encoded images whose disk write is in flight.
pub mod staging;
/// Hit rate tracking of the image caches.
pub mod stats;

mod prelude;
pub use prelude::*;
