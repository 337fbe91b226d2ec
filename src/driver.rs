// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    config::CameraConfig,
    error::{Error, Result},
    format::PixelFormat,
    frame::{FrameInfo, RawFrame},
    transcode::{encode_jpeg, turbojpeg_quality},
};
use std::{
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, info};
use turbojpeg::Subsamp;

/// Boundary to the camera driver which owns the frame buffer pool.
///
/// The driver is moved onto the capture thread at setup and only ever used
/// from there, so implementations need not be re-entrant.
pub trait FrameDriver: Send + 'static {
    /// Brings up the sensor. Called once, on the host context, before the
    /// capture thread starts. A failure here is permanent.
    fn init(&mut self, config: &CameraConfig) -> Result<()>;

    /// Blocks until the next frame is ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AcquireTimeout`] when the driver's internal timeout
    /// expires; any error is retried by the capture task.
    fn acquire(&mut self) -> Result<RawFrame>;

    /// Hands a frame previously returned by [`FrameDriver::acquire`] back
    /// to the pool.
    fn release(&mut self, frame: RawFrame);
}

/// Colour bars, left to right, as RGB.
const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

/// Synthetic sensor producing colour bars in the configured format.
///
/// It keeps a pool of `fb_count` buffers like a real driver and fails with
/// [`Error::PoolExhausted`] when every buffer is handed out. JPEG frames are
/// encoded once at init and copied into the pool buffers.
///
/// # Example
///
/// ```
/// use edgefirst_capture::config::CameraConfig;
/// use edgefirst_capture::driver::{FrameDriver, PatternDriver};
/// use edgefirst_capture::format::PixelFormat;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CameraConfig::builder()
///     .pixel_format(PixelFormat::Yuv422)
///     .build()?;
/// let mut driver = PatternDriver::new(0);
/// driver.init(&config)?;
///
/// let frame = driver.acquire()?;
/// assert_eq!(frame.len(), 640 * 480 * 2);
/// driver.release(frame);
/// # Ok(())
/// # }
/// ```
pub struct PatternDriver {
    fps: u32,
    info: Option<FrameInfo>,
    pattern: Vec<u8>,
    pool: Vec<Option<Vec<u8>>>,
    next_frame: Option<Instant>,
    frames: u64,
}

impl PatternDriver {
    /// `fps` paces [`FrameDriver::acquire`]; zero delivers as fast as asked.
    pub fn new(fps: u32) -> Self {
        Self {
            fps,
            info: None,
            pattern: Vec::new(),
            pool: Vec::new(),
            next_frame: None,
            frames: 0,
        }
    }

    /// Frames delivered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn render(format: PixelFormat, width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
        let (w, h) = (width as usize, height as usize);
        let mut rgb = Vec::with_capacity(w * h * 3);
        for _ in 0..h {
            for x in 0..w {
                rgb.extend_from_slice(&BARS[x * BARS.len() / w]);
            }
        }

        let pattern = match format {
            PixelFormat::Rgb888 => rgb,
            PixelFormat::Grayscale => rgb.chunks_exact(3).map(luma).collect(),
            PixelFormat::Rgb565 => rgb
                .chunks_exact(3)
                .flat_map(|px| {
                    let value = ((px[0] as u16 >> 3) << 11)
                        | ((px[1] as u16 >> 2) << 5)
                        | (px[2] as u16 >> 3);
                    value.to_be_bytes()
                })
                .collect(),
            PixelFormat::Yuv422 => rgb
                .chunks_exact(6)
                .flat_map(|pair| {
                    let (y0, u0, v0) = yuv(&pair[..3]);
                    let (y1, u1, v1) = yuv(&pair[3..]);
                    let u = ((u0 as u16 + u1 as u16) / 2) as u8;
                    let v = ((v0 as u16 + v1 as u16) / 2) as u8;
                    [y0, u, y1, v]
                })
                .collect(),
            PixelFormat::Jpeg => encode_jpeg(
                &rgb,
                w,
                h,
                turbojpeg::PixelFormat::RGB,
                turbojpeg_quality(quality),
                Subsamp::Sub2x2,
            )?
            .to_vec(),
        };
        Ok(pattern)
    }
}

fn luma(px: &[u8]) -> u8 {
    ((77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32) >> 8) as u8
}

fn yuv(px: &[u8]) -> (u8, u8, u8) {
    let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);
    let y = (77 * r + 150 * g + 29 * b) >> 8;
    let u = ((-43 * r - 85 * g + 128 * b) >> 8) + 128;
    let v = ((128 * r - 107 * g - 21 * b) >> 8) + 128;
    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}

impl FrameDriver for PatternDriver {
    fn init(&mut self, config: &CameraConfig) -> Result<()> {
        let (width, height) = config.frame_size().dimensions();
        let format = config.pixel_format();
        self.pattern = Self::render(format, width, height, config.jpeg_quality())
            .map_err(|e| Error::DriverInit(e.to_string()))?;
        self.pool = (0..config.fb_count())
            .map(|_| Some(Vec::with_capacity(self.pattern.len())))
            .collect();
        self.info = Some(FrameInfo {
            width,
            height,
            format,
            timestamp: Duration::ZERO,
        });

        info!(
            "pattern sensor {}x{} {} with {} frame buffers",
            width,
            height,
            format,
            self.pool.len()
        );
        Ok(())
    }

    fn acquire(&mut self) -> Result<RawFrame> {
        let info = self
            .info
            .ok_or_else(|| Error::Sensor("sensor not initialized".into()))?;

        if self.fps > 0 {
            let now = Instant::now();
            let due = self.next_frame.unwrap_or(now);
            if due > now {
                thread::sleep(due - now);
            }
            self.next_frame = Some(due.max(now) + Duration::from_secs(1) / self.fps);
        }

        let slot = self
            .pool
            .iter()
            .position(Option::is_some)
            .ok_or(Error::PoolExhausted)?;
        let mut data = self.pool[slot].take().unwrap_or_default();
        data.clear();
        data.extend_from_slice(&self.pattern);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.frames += 1;
        Ok(RawFrame::new(slot, FrameInfo { timestamp, ..info }, data))
    }

    fn release(&mut self, frame: RawFrame) {
        let (slot, data) = frame.into_parts();
        match self.pool.get_mut(slot) {
            Some(entry) if entry.is_none() => *entry = Some(data),
            _ => debug!("ignoring release of unknown frame buffer slot {}", slot),
        }
    }
}
