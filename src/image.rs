// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    demand::Requester,
    frame::{FrameBuffer, FrameInfo, Provenance},
};
use core::fmt;
use std::{io, sync::Arc};

/// Shared handle to a published image.
///
/// Consumers clone and drop it freely; the pipeline reclaims the buffer once
/// it holds the last reference.
pub type ImageHandle = Arc<CameraImage>;

/// An image published by the [`FramePipeline`](crate::pipeline::FramePipeline).
///
/// `CameraImage` wraps exactly one [`FrameBuffer`] together with the set of
/// requesters that were waiting when it was published. It has no close
/// operation: consumers only read the bytes and drop their handle, the
/// pipeline alone decides when and how the buffer is released.
pub struct CameraImage {
    buffer: FrameBuffer,
    requesters: u8,
    transcoded: bool,
}

impl CameraImage {
    pub(crate) fn new(buffer: FrameBuffer, requesters: u8, transcoded: bool) -> Self {
        Self {
            buffer,
            requesters,
            transcoded,
        }
    }

    /// Encoded image bytes.
    pub fn data(&self) -> &[u8] {
        self.buffer.data()
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn info(&self) -> FrameInfo {
        self.buffer.info()
    }

    pub fn width(&self) -> u32 {
        self.info().width
    }

    pub fn height(&self) -> u32 {
        self.info().height
    }

    pub fn provenance(&self) -> Provenance {
        self.buffer.provenance()
    }

    /// Whether `requester` was waiting for an image when this one was
    /// published.
    pub fn was_requested_by(&self, requester: Requester) -> bool {
        self.requesters & requester.bit() != 0
    }

    /// Requester bitmask recorded at publish time.
    pub fn requesters(&self) -> u8 {
        self.requesters
    }

    /// Whether the bytes come from software transcode rather than the
    /// sensor.
    pub fn is_transcoded(&self) -> bool {
        self.transcoded
    }

    pub(crate) fn into_buffer(self) -> FrameBuffer {
        self.buffer
    }
}

impl fmt::Debug for CameraImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CameraImage")
            .field("info", &self.info())
            .field("len", &self.len())
            .field("provenance", &self.provenance())
            .field("requesters", &format_args!("{:#06b}", self.requesters))
            .field("transcoded", &self.transcoded)
            .finish()
    }
}

impl fmt::Display for CameraImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.buffer)
    }
}

/// Cursor over the bytes of one [`ImageHandle`].
///
/// Holding an image in a reader keeps its buffer alive; call
/// [`ImageReader::return_image`] (or drop the reader) once the bytes have
/// been sent so the pipeline can reclaim the buffer.
///
/// # Example
///
/// ```no_run
/// use edgefirst_capture::image::{ImageHandle, ImageReader};
/// use std::io;
///
/// fn send(image: ImageHandle, out: &mut impl io::Write) -> io::Result<u64> {
///     let mut reader = ImageReader::default();
///     reader.set_image(image);
///     let sent = io::copy(&mut reader, out)?;
///     reader.return_image();
///     Ok(sent)
/// }
/// ```
#[derive(Debug, Default)]
pub struct ImageReader {
    image: Option<ImageHandle>,
    offset: usize,
}

impl ImageReader {
    /// Starts reading `image` from the beginning, dropping any previous one.
    pub fn set_image(&mut self, image: ImageHandle) {
        self.image = Some(image);
        self.offset = 0;
    }

    pub fn image(&self) -> Option<&ImageHandle> {
        self.image.as_ref()
    }

    /// Bytes not consumed yet, zero without an image.
    pub fn available(&self) -> usize {
        self.image
            .as_ref()
            .map_or(0, |image| image.len() - self.offset)
    }

    /// Remaining bytes from the current offset.
    pub fn peek(&self) -> &[u8] {
        match &self.image {
            Some(image) => &image.data()[self.offset..],
            None => &[],
        }
    }

    /// Advances the cursor, clamped to the end of the image.
    pub fn consume(&mut self, consumed: usize) {
        self.offset += consumed.min(self.available());
    }

    /// Drops the reference to the current image.
    pub fn return_image(&mut self) {
        self.image = None;
        self.offset = 0;
    }
}

impl io::Read for ImageReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.peek();
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.consume(count);
        Ok(count)
    }
}
