// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst Camera Frame Buffer Pipeline
//!
//! This library moves camera frames from a sensor driver to any number of
//! consumers while keeping every frame buffer owned by exactly one party at
//! a time. A dedicated capture thread blocks on the driver, single-slot
//! channels hand frames to the pipeline and back, raw frames are optionally
//! transcoded to JPEG, and published images are shared as reference-counted
//! handles.
//!
//! ## Features
//!
//! - **Bounded Capture**: At most one driver buffer is ever outside the
//!   driver; the capture thread waits for it to come back before acquiring
//!   the next one.
//! - **Demand Driven**: Frames are only fetched while a single-shot or
//!   streaming requester is waiting.
//! - **JPEG Transcode**: YUYV, RGB565, RGB888 and grayscale frames are
//!   compressed with turbojpeg when the sensor cannot produce JPEG itself.
//! - **Sensor Profiles**: Sensor specific adjustments are selected at
//!   runtime when the configuration is built.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_capture::{CameraConfig, FramePipeline, PatternDriver, Requester};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut camera = FramePipeline::new(CameraConfig::builder().build()?);
//! camera.setup(PatternDriver::new(30));
//! camera.start_stream(Requester::WebServer);
//!
//! loop {
//!     camera.loop_once();
//!     if let Some(image) = camera.current_image() {
//!         println!("{} {} bytes", image.info().timestamp.as_millis(), image.len());
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! # }
//! ```
//!
//! ## Safety
//!
//! The only `unsafe` code pins the capture thread to a CPU core through
//! `libc` on Linux.

pub mod capture;
pub mod config;
pub mod demand;
pub mod driver;
pub mod error;
pub mod format;
pub mod frame;
pub mod image;
pub mod pipeline;
pub mod transcode;

pub use config::{CameraConfig, SensorProfile};
pub use demand::Requester;
pub use driver::{FrameDriver, PatternDriver};
pub use error::{Error, Result};
pub use format::{FrameSize, PixelFormat};
pub use image::{CameraImage, ImageHandle, ImageReader};
pub use pipeline::{FramePipeline, ImageListener, PipelineState, PipelineStats};
pub use transcode::{JpegTranscoder, Transcoder};
