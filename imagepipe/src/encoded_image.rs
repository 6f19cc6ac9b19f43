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

use imagepipe_common::reference::CloseableReference;
use serde::{Deserialize, Serialize};

use crate::buffer::DynPooledByteBuffer;

/// Format of an encoded image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Not detected yet, or not recognized.
    #[default]
    Unknown,
    /// JPEG.
    Jpeg,
    /// PNG.
    Png,
    /// GIF.
    Gif,
    /// BMP.
    Bmp,
    /// ICO.
    Ico,
    /// Lossy WebP.
    WebpSimple,
    /// Lossless WebP.
    WebpLossless,
    /// Extended WebP.
    WebpExtended,
    /// Extended WebP with alpha.
    WebpExtendedWithAlpha,
    /// Animated WebP.
    WebpAnimated,
}

/// Default sample size of an encoded image.
pub const DEFAULT_SAMPLE_SIZE: u32 = 1;

/// Encoded bytes of an image and the metadata parsed from them.
///
/// The image holds its own handle to the byte buffer. It is closed with the image, or on drop.
#[derive(Debug)]
pub struct EncodedImage {
    buffer: Option<CloseableReference<DynPooledByteBuffer>>,
    width: Option<u32>,
    height: Option<u32>,
    rotation_angle: Option<u32>,
    sample_size: u32,
    image_format: ImageFormat,
}

impl EncodedImage {
    /// Create an image over a clone of the given buffer handle, with unknown metadata.
    ///
    /// # Panics
    ///
    /// Panics if the handle is closed.
    pub fn new(buffer: &CloseableReference<DynPooledByteBuffer>) -> Self {
        Self {
            buffer: Some(buffer.clone()),
            width: None,
            height: None,
            rotation_angle: None,
            sample_size: DEFAULT_SAMPLE_SIZE,
            image_format: ImageFormat::Unknown,
        }
    }

    /// Set the width in pixels.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Set the height in pixels.
    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Set the rotation angle in degrees.
    pub fn with_rotation_angle(mut self, rotation_angle: u32) -> Self {
        self.rotation_angle = Some(rotation_angle);
        self
    }

    /// Set the sample size.
    pub fn with_sample_size(mut self, sample_size: u32) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set the image format.
    pub fn with_image_format(mut self, image_format: ImageFormat) -> Self {
        self.image_format = image_format;
        self
    }

    /// Clone the image with a new buffer handle, or `None` if the image is closed.
    pub fn clone_or_none(&self) -> Option<Self> {
        let buffer = self.buffer.as_ref()?.clone_or_none()?;
        let mut image = Self::new(&buffer);
        image.copy_meta_data_from(self);
        Some(image)
    }

    /// Copy the metadata of another image.
    pub fn copy_meta_data_from(&mut self, other: &Self) {
        self.width = other.width;
        self.height = other.height;
        self.rotation_angle = other.rotation_angle;
        self.sample_size = other.sample_size;
        self.image_format = other.image_format;
    }

    /// Check if the metadata was parsed.
    pub fn is_meta_data_available(&self) -> bool {
        self.width.is_some() && self.height.is_some() && self.rotation_angle.is_some()
    }

    /// Check if the buffer handle is still open.
    pub fn is_valid(&self) -> bool {
        self.buffer.as_ref().is_some_and(|buffer| buffer.is_valid())
    }

    /// Size of the encoded bytes, `0` once the image is closed.
    pub fn size(&self) -> usize {
        self.buffer
            .as_ref()
            .and_then(|buffer| buffer.try_get())
            .map(|buffer| buffer.size())
            .unwrap_or_default()
    }

    /// Get a new handle to the byte buffer. The caller closes it when done.
    pub fn byte_buffer_ref(&self) -> Option<CloseableReference<DynPooledByteBuffer>> {
        self.buffer.as_ref()?.clone_or_none()
    }

    /// Check if both images expose the same byte buffer.
    pub fn is_same_buffer(&self, other: &Self) -> bool {
        match (self.buffer.as_ref(), other.buffer.as_ref()) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Close the buffer handle. Closing a closed image does nothing.
    pub fn close(&mut self) {
        CloseableReference::close_safely(self.buffer.take());
    }

    /// Width in pixels, if known.
    pub fn width(&self) -> Option<u32> {
        self.width
    }

    /// Height in pixels, if known.
    pub fn height(&self) -> Option<u32> {
        self.height
    }

    /// Rotation angle in degrees, if known.
    pub fn rotation_angle(&self) -> Option<u32> {
        self.rotation_angle
    }

    /// Sample size.
    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Image format.
    pub fn image_format(&self) -> ImageFormat {
        self.image_format
    }
}
