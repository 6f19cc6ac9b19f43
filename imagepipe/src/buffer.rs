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

use std::{fmt::Debug, io::Read};

use bytes::Bytes;
use imagepipe_common::error::{Error, ErrorKind, Result};

/// An immutable byte buffer whose memory may come from a pool.
///
/// Buffers are shared with [`CloseableReference`](imagepipe_common::reference::CloseableReference)s, the memory is
/// given back when the last handle is closed.
pub trait PooledByteBuffer: Debug + Send + Sync + 'static {
    /// Size of the buffer in bytes.
    fn size(&self) -> usize;

    /// Copy bytes starting at `offset` into `buf`. Returns the count of copied bytes, less than `buf.len()` if the
    /// end of the buffer is reached.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize>;

    /// View the whole buffer.
    fn as_bytes(&self) -> &[u8];
}

/// A boxed [`PooledByteBuffer`].
pub type DynPooledByteBuffer = Box<dyn PooledByteBuffer>;

/// Factory of [`PooledByteBuffer`]s.
pub trait PooledByteBufferFactory: Send + Sync + 'static {
    /// Read the reader to its end into a new buffer. `size` is a hint of the expected size.
    fn new_byte_buffer(&self, reader: &mut dyn Read, size: usize) -> Result<DynPooledByteBuffer>;
}

/// A [`PooledByteBuffer`] over [`Bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytesPooledByteBuffer {
    bytes: Bytes,
}

impl BytesPooledByteBuffer {
    /// Wrap the bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Get a cheap clone of the underlying bytes.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

impl PooledByteBuffer for BytesPooledByteBuffer {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        if offset > self.bytes.len() {
            return Err(Error::new(ErrorKind::Io, "read out of the buffer range")
                .with_context("offset", offset)
                .with_context("size", self.bytes.len()));
        }
        let len = buf.len().min(self.bytes.len() - offset);
        buf[..len].copy_from_slice(&self.bytes[offset..offset + len]);
        Ok(len)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Factory of [`BytesPooledByteBuffer`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesPooledByteBufferFactory;

impl PooledByteBufferFactory for BytesPooledByteBufferFactory {
    fn new_byte_buffer(&self, reader: &mut dyn Read, size: usize) -> Result<DynPooledByteBuffer> {
        let mut buf = Vec::with_capacity(size);
        reader.read_to_end(&mut buf)?;
        tracing::trace!("[byte buffer factory]: new buffer, size: {}, hint: {size}", buf.len());
        Ok(Box::new(BytesPooledByteBuffer::new(buf)))
    }
}
