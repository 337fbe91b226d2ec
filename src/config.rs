// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Error, Result},
    format::{FrameSize, PixelFormat},
};
use core::fmt;
use std::time::Duration;

const XCLK_MIN_HZ: u32 = 6_000_000;
const XCLK_MAX_HZ: u32 = 20_000_000;

/// Highest (worst) value on the sensor JPEG quality scale.
pub const MAX_JPEG_QUALITY: u8 = 63;

/// Named sensor configurations selected at startup.
///
/// A profile adjusts the requested configuration to what the sensor can
/// actually deliver before the configuration is frozen.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SensorProfile {
    /// OV2640: hardware JPEG, the configuration is used as given.
    Ov2640,
    /// GC2145: no hardware JPEG; JPEG output is produced by software
    /// transcode from YUV 4:2:2 at a reduced clock and resolution.
    Gc2145,
}

impl SensorProfile {
    pub const fn supports_jpeg(self) -> bool {
        match self {
            SensorProfile::Ov2640 => true,
            SensorProfile::Gc2145 => false,
        }
    }

    fn apply(self, config: &mut CameraConfig) {
        match self {
            SensorProfile::Ov2640 => {}
            SensorProfile::Gc2145 => {
                config.frame_size = match config.frame_size {
                    FrameSize::Qqvga => FrameSize::Qqvga,
                    FrameSize::Qvga => FrameSize::Qvga,
                    _ => FrameSize::Vga,
                };
                if config.pixel_format == PixelFormat::Jpeg {
                    config.pixel_format = PixelFormat::Yuv422;
                    config.frame_size = FrameSize::Qvga;
                    config.xclk_freq_hz = XCLK_MIN_HZ;
                    config.fb_count = 4;
                    config.grab_mode = GrabMode::Latest;
                    config.jpeg_quality = 12;
                    config.settle_delay = Duration::from_millis(500);
                }
            }
        }
    }
}

impl fmt::Display for SensorProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SensorProfile::Ov2640 => write!(f, "OV2640"),
            SensorProfile::Gc2145 => write!(f, "GC2145"),
        }
    }
}

/// When the driver refills its buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GrabMode {
    /// Fill a buffer only once the previous one has been returned.
    WhenEmpty,
    /// Keep overwriting with the most recent frame.
    Latest,
}

/// Memory region the driver allocates its frame buffers from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameBufferLocation {
    Psram,
    Dram,
}

/// Immutable camera configuration.
///
/// Built once with [`CameraConfig::builder`] and handed to the pipeline at
/// setup. Nothing in it changes while the pipeline runs.
///
/// # Example
///
/// ```
/// use edgefirst_capture::config::{CameraConfig, SensorProfile};
/// use edgefirst_capture::format::{FrameSize, PixelFormat};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CameraConfig::builder()
///     .profile(SensorProfile::Gc2145)
///     .frame_size(FrameSize::Vga)
///     .build()?;
///
/// // GC2145 cannot encode JPEG itself, so the profile switched it to raw
/// // YUV capture which the pipeline transcodes in software.
/// assert_eq!(config.pixel_format(), PixelFormat::Yuv422);
/// assert_eq!(config.frame_size(), FrameSize::Qvga);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CameraConfig {
    profile: SensorProfile,
    pixel_format: PixelFormat,
    frame_size: FrameSize,
    jpeg_quality: u8,
    jpeg_output: bool,
    fb_count: u8,
    grab_mode: GrabMode,
    fb_location: FrameBufferLocation,
    xclk_freq_hz: u32,
    vertical_flip: bool,
    horizontal_mirror: bool,
    max_update_interval: Duration,
    idle_update_interval: Duration,
    acquire_backoff: Duration,
    settle_delay: Duration,
    capture_core: Option<usize>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            profile: SensorProfile::Ov2640,
            pixel_format: PixelFormat::Jpeg,
            frame_size: FrameSize::Vga,
            jpeg_quality: 10,
            jpeg_output: true,
            fb_count: 1,
            grab_mode: GrabMode::WhenEmpty,
            fb_location: FrameBufferLocation::Psram,
            xclk_freq_hz: XCLK_MAX_HZ,
            vertical_flip: true,
            horizontal_mirror: true,
            max_update_interval: Duration::from_millis(100),
            idle_update_interval: Duration::from_secs(10),
            acquire_backoff: Duration::from_millis(100),
            settle_delay: Duration::ZERO,
            capture_core: None,
        }
    }
}

impl CameraConfig {
    pub fn builder() -> CameraConfigBuilder {
        CameraConfigBuilder::default()
    }

    pub fn profile(&self) -> SensorProfile {
        self.profile
    }

    /// Pixel format the driver is asked to deliver.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    /// JPEG quality on the sensor scale, 0 (best) to 63 (worst).
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Whether published images must be JPEG, transcoding raw frames if
    /// needed.
    pub fn jpeg_output(&self) -> bool {
        self.jpeg_output
    }

    pub fn fb_count(&self) -> u8 {
        self.fb_count
    }

    pub fn grab_mode(&self) -> GrabMode {
        self.grab_mode
    }

    pub fn fb_location(&self) -> FrameBufferLocation {
        self.fb_location
    }

    pub fn xclk_freq_hz(&self) -> u32 {
        self.xclk_freq_hz
    }

    pub fn vertical_flip(&self) -> bool {
        self.vertical_flip
    }

    pub fn horizontal_mirror(&self) -> bool {
        self.horizontal_mirror
    }

    /// Minimum time between two published images.
    pub fn max_update_interval(&self) -> Duration {
        self.max_update_interval
    }

    /// Period of the automatic [`Requester::Idle`](crate::demand::Requester)
    /// request, zero when disabled.
    pub fn idle_update_interval(&self) -> Duration {
        self.idle_update_interval
    }

    /// Pause of the capture task after a failed acquire.
    pub fn acquire_backoff(&self) -> Duration {
        self.acquire_backoff
    }

    /// Time the sensor is given to stabilise after driver init.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// CPU core the capture thread is pinned to.
    pub fn capture_core(&self) -> Option<usize> {
        self.capture_core
    }
}

/// Builder for [`CameraConfig`].
#[derive(Clone, Debug, Default)]
pub struct CameraConfigBuilder {
    config: CameraConfig,
    grab_mode_set: bool,
}

impl CameraConfigBuilder {
    pub fn profile(mut self, profile: SensorProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.config.pixel_format = format;
        self
    }

    pub fn frame_size(mut self, size: FrameSize) -> Self {
        self.config.frame_size = size;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn jpeg_output(mut self, enabled: bool) -> Self {
        self.config.jpeg_output = enabled;
        self
    }

    /// Number of driver frame buffers. Unless a grab mode is set explicitly,
    /// more than one buffer selects [`GrabMode::Latest`].
    pub fn fb_count(mut self, count: u8) -> Self {
        self.config.fb_count = count;
        self
    }

    pub fn grab_mode(mut self, mode: GrabMode) -> Self {
        self.config.grab_mode = mode;
        self.grab_mode_set = true;
        self
    }

    pub fn fb_location(mut self, location: FrameBufferLocation) -> Self {
        self.config.fb_location = location;
        self
    }

    pub fn xclk_freq_hz(mut self, frequency: u32) -> Self {
        self.config.xclk_freq_hz = frequency;
        self
    }

    pub fn vertical_flip(mut self, enabled: bool) -> Self {
        self.config.vertical_flip = enabled;
        self
    }

    pub fn horizontal_mirror(mut self, enabled: bool) -> Self {
        self.config.horizontal_mirror = enabled;
        self
    }

    pub fn max_update_interval(mut self, interval: Duration) -> Self {
        self.config.max_update_interval = interval;
        self
    }

    pub fn idle_update_interval(mut self, interval: Duration) -> Self {
        self.config.idle_update_interval = interval;
        self
    }

    pub fn acquire_backoff(mut self, backoff: Duration) -> Self {
        self.config.acquire_backoff = backoff;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    pub fn capture_core(mut self, core: Option<usize>) -> Self {
        self.config.capture_core = core;
        self
    }

    /// Validates the settings, applies the sensor profile and freezes the
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if:
    /// - the JPEG quality is above 63
    /// - no frame buffer is requested
    /// - the external clock is outside 6-20 MHz
    pub fn build(self) -> Result<CameraConfig> {
        let mut config = self.config;

        if config.jpeg_quality > MAX_JPEG_QUALITY {
            return Err(Error::Config(format!(
                "jpeg quality {} is outside 0-{MAX_JPEG_QUALITY}",
                config.jpeg_quality
            )));
        }
        if config.fb_count == 0 {
            return Err(Error::Config("at least one frame buffer is required".into()));
        }
        if !(XCLK_MIN_HZ..=XCLK_MAX_HZ).contains(&config.xclk_freq_hz) {
            return Err(Error::Config(format!(
                "external clock {} Hz is outside {XCLK_MIN_HZ}-{XCLK_MAX_HZ} Hz",
                config.xclk_freq_hz
            )));
        }

        if !self.grab_mode_set {
            config.grab_mode = if config.fb_count > 1 {
                GrabMode::Latest
            } else {
                GrabMode::WhenEmpty
            };
        }

        config.profile.apply(&mut config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() -> Result<()> {
        let config = CameraConfig::builder().build()?;
        assert_eq!(config.profile(), SensorProfile::Ov2640);
        assert_eq!(config.pixel_format(), PixelFormat::Jpeg);
        assert_eq!(config.frame_size(), FrameSize::Vga);
        assert_eq!(config.jpeg_quality(), 10);
        assert_eq!(config.fb_count(), 1);
        assert_eq!(config.grab_mode(), GrabMode::WhenEmpty);
        assert_eq!(config.max_update_interval(), Duration::from_millis(100));
        assert_eq!(config.idle_update_interval(), Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn test_fb_count_selects_grab_mode() -> Result<()> {
        let config = CameraConfig::builder().fb_count(2).build()?;
        assert_eq!(config.grab_mode(), GrabMode::Latest);

        let config = CameraConfig::builder()
            .fb_count(2)
            .grab_mode(GrabMode::WhenEmpty)
            .build()?;
        assert_eq!(config.grab_mode(), GrabMode::WhenEmpty);
        Ok(())
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            CameraConfig::builder().jpeg_quality(64).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            CameraConfig::builder().fb_count(0).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            CameraConfig::builder().xclk_freq_hz(24_000_000).build(),
            Err(Error::Config(_))
        ));
        assert!(CameraConfig::builder().jpeg_quality(63).build().is_ok());
    }

    #[test]
    fn test_gc2145_jpeg_patch() -> Result<()> {
        let config = CameraConfig::builder()
            .profile(SensorProfile::Gc2145)
            .frame_size(FrameSize::Uxga)
            .fb_count(1)
            .build()?;
        assert_eq!(config.pixel_format(), PixelFormat::Yuv422);
        assert_eq!(config.frame_size(), FrameSize::Qvga);
        assert_eq!(config.xclk_freq_hz(), 6_000_000);
        assert_eq!(config.fb_count(), 4);
        assert_eq!(config.grab_mode(), GrabMode::Latest);
        assert_eq!(config.jpeg_quality(), 12);
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
        assert!(config.jpeg_output());
        Ok(())
    }

    #[test]
    fn test_gc2145_raw_keeps_settings() -> Result<()> {
        let config = CameraConfig::builder()
            .profile(SensorProfile::Gc2145)
            .pixel_format(PixelFormat::Rgb565)
            .frame_size(FrameSize::Qqvga)
            .build()?;
        assert_eq!(config.pixel_format(), PixelFormat::Rgb565);
        assert_eq!(config.frame_size(), FrameSize::Qqvga);
        assert_eq!(config.xclk_freq_hz(), 20_000_000);

        let config = CameraConfig::builder()
            .profile(SensorProfile::Gc2145)
            .pixel_format(PixelFormat::Rgb565)
            .frame_size(FrameSize::Sxga)
            .build()?;
        assert_eq!(config.frame_size(), FrameSize::Vga);
        Ok(())
    }
}
