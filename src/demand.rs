// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use core::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Consumer classes that can ask the camera for images.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Requester {
    /// Native API client
    Api = 0,
    /// Web viewer snapshot or MJPEG stream
    WebServer = 1,
    /// Automation trigger
    Automation = 2,
    /// Periodic refresh while nobody else asks
    Idle = 3,
}

impl Requester {
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Requester::Api => write!(f, "api"),
            Requester::WebServer => write!(f, "web_server"),
            Requester::Automation => write!(f, "automation"),
            Requester::Idle => write!(f, "idle"),
        }
    }
}

/// Single-shot and streaming requester bitmasks.
///
/// Writes only happen on the pipeline context. The capture thread reads
/// [`Demand::is_pending`] to decide whether waking the host loop is worth it,
/// which is why the masks are atomics.
#[derive(Debug, Default)]
pub struct Demand {
    single: AtomicU8,
    stream: AtomicU8,
}

impl Demand {
    pub fn request(&self, requester: Requester) {
        self.single.fetch_or(requester.bit(), Ordering::Relaxed);
    }

    pub fn start_stream(&self, requester: Requester) {
        self.stream.fetch_or(requester.bit(), Ordering::Relaxed);
    }

    pub fn stop_stream(&self, requester: Requester) {
        self.stream.fetch_and(!requester.bit(), Ordering::Relaxed);
    }

    /// Drops all single-shot requests once a frame has been published.
    pub fn clear_single(&self) {
        self.single.store(0, Ordering::Relaxed);
    }

    pub fn single(&self) -> u8 {
        self.single.load(Ordering::Relaxed)
    }

    pub fn stream(&self) -> u8 {
        self.stream.load(Ordering::Relaxed)
    }

    /// Union of both masks, recorded on each published image.
    pub fn mask(&self) -> u8 {
        self.single() | self.stream()
    }

    pub fn is_pending(&self) -> bool {
        self.mask() != 0
    }
}
