// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::format::PixelFormat;
use core::fmt;
use std::time::Duration;

/// Geometry, format and capture time of one frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Capture time since the UNIX epoch.
    pub timestamp: Duration,
}

impl FrameInfo {
    pub fn with_format(self, format: PixelFormat) -> Self {
        Self { format, ..self }
    }
}

/// A frame buffer lent out by the driver.
///
/// Only a [`FrameDriver`](crate::driver::FrameDriver) creates these and the
/// same driver must get every one of them back through
/// [`FrameDriver::release`](crate::driver::FrameDriver::release). Not
/// `Clone`: a buffer is in exactly one place at any time.
#[derive(Debug)]
pub struct RawFrame {
    slot: usize,
    info: FrameInfo,
    data: Vec<u8>,
}

impl RawFrame {
    /// Wraps pool slot `slot` holding `data`.
    pub fn new(slot: usize, info: FrameInfo, data: Vec<u8>) -> Self {
        Self { slot, info, data }
    }

    /// Index of the driver pool slot this buffer belongs to.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn info(&self) -> FrameInfo {
        self.info
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A frame with no payload or no geometry is a driver anomaly.
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.info.width > 0 && self.info.height > 0
    }

    /// Gives the pool storage back to the driver on release.
    pub fn into_parts(self) -> (usize, Vec<u8>) {
        (self.slot, self.data)
    }
}

/// Which allocator owns a buffer and therefore how it must be released.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// Goes back to the driver through the return channel.
    Driver,
    /// Allocated by the transcoder, freed by dropping it.
    Heap,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Provenance::Driver => write!(f, "driver"),
            Provenance::Heap => write!(f, "heap"),
        }
    }
}

/// One captured image tagged with its provenance.
#[derive(Debug)]
pub enum FrameBuffer {
    Driver(RawFrame),
    Heap { info: FrameInfo, data: Vec<u8> },
}

impl FrameBuffer {
    pub fn provenance(&self) -> Provenance {
        match self {
            FrameBuffer::Driver(_) => Provenance::Driver,
            FrameBuffer::Heap { .. } => Provenance::Heap,
        }
    }

    pub fn info(&self) -> FrameInfo {
        match self {
            FrameBuffer::Driver(raw) => raw.info(),
            FrameBuffer::Heap { info, .. } => *info,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            FrameBuffer::Driver(raw) => raw.data(),
            FrameBuffer::Heap { data, .. } => data,
        }
    }
}

impl fmt::Display for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let info = self.info();
        write!(
            f,
            "{}x{} {} {} bytes ({})",
            info.width,
            info.height,
            info.format,
            self.data().len(),
            self.provenance()
        )
    }
}
