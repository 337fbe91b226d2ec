// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! The capture task keeps exactly one frame in flight between the driver and
//! the pipeline.
//!
//! ```text
//!   driver.acquire() --> forward (1) --> pipeline
//!        ^                                  |
//!   driver.release() <-- return  (1) <------+
//! ```
//!
//! The task never acquires again before the frame it forwarded has come back
//! on the return channel, so the driver pool is never drained by capture
//! running ahead of the consumers.

use crate::{demand::Demand, driver::FrameDriver, frame::RawFrame};
use kanal::{Receiver, Sender};
use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{debug, error, trace, warn};

/// Callback invoked from the capture thread when a frame is ready and
/// somebody is waiting for it.
pub type WakeFn = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct CaptureLink {
    pub forward: Sender<RawFrame>,
    pub returns: Receiver<RawFrame>,
    pub demand: Arc<Demand>,
    pub wake: Option<WakeFn>,
    pub backoff: Duration,
    pub core: Option<usize>,
}

/// Spawns the capture thread which owns `driver` from now on.
pub(crate) fn spawn<D: FrameDriver>(driver: D, link: CaptureLink) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("framebuffer".to_string())
        .spawn(move || {
            if let Some(core) = link.core {
                match pin_to_core(core) {
                    Ok(()) => debug!("capture task pinned to core {}", core),
                    Err(e) => warn!("capture task could not be pinned to core {}: {}", core, e),
                }
            }
            run(driver, link)
        })
}

fn run<D: FrameDriver>(mut driver: D, link: CaptureLink) {
    loop {
        let frame = match driver.acquire() {
            Ok(frame) => frame,
            Err(e) => {
                if link.forward.is_disconnected() {
                    break;
                }
                if e.is_retryable() {
                    warn!("failed to get frame from driver: {}", e);
                } else {
                    error!("driver error while capturing: {}", e);
                }
                thread::sleep(link.backoff);
                continue;
            }
        };

        trace!("forwarding frame buffer slot {}", frame.slot());
        if link.forward.is_disconnected() {
            driver.release(frame);
            break;
        }
        if link.forward.send(frame).is_err() {
            break;
        }

        if link.demand.is_pending() {
            if let Some(wake) = &link.wake {
                wake();
            }
        }

        let frame = match link.returns.recv() {
            Ok(frame) => frame,
            Err(_) => break,
        };
        trace!("releasing frame buffer slot {}", frame.slot());
        driver.release(frame);
    }
    debug!("capture task stopped");
}

#[cfg(target_os = "linux")]
fn pin_to_core(core: usize) -> io::Result<()> {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(_core: usize) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "thread affinity is only supported on linux",
    ))
}
