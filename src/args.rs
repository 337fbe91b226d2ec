// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_capture::{
    config::{CameraConfig, FrameBufferLocation, SensorProfile},
    format::{FrameSize, PixelFormat},
    Error,
};
use std::{path::PathBuf, time::Duration};

/// Camera sensor selection.
///
/// The profile adjusts the requested capture settings to what the sensor
/// supports.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum ProfileSetting {
    /// OmniVision OV2640 with hardware JPEG
    Ov2640,
    /// GalaxyCore GC2145, JPEG is transcoded from YUV in software
    Gc2145,
}

impl From<ProfileSetting> for SensorProfile {
    fn from(setting: ProfileSetting) -> Self {
        match setting {
            ProfileSetting::Ov2640 => SensorProfile::Ov2640,
            ProfileSetting::Gc2145 => SensorProfile::Gc2145,
        }
    }
}

/// Camera image mirroring options.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum MirrorSetting {
    /// No mirroring
    None,
    /// Flip horizontally (left-right)
    Horizontal,
    /// Flip vertically (top-bottom)
    Vertical,
    /// Flip both horizontally and vertically (180-degree rotation)
    Both,
}

/// Command-line arguments for the EdgeFirst frame capture tool.
///
/// Captures frames from the synthetic pattern sensor through the frame
/// buffer pipeline and writes them as JPEG files. Arguments can be given on
/// the command line or through environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edgefirst-capture --profile gc2145 --frames 10 --output /tmp/frames
///
/// # Via environment variables
/// export CAMERA_PROFILE=gc2145
/// export FRAME_SIZE=qvga
/// edgefirst-capture
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera sensor profile
    #[arg(long, env = "CAMERA_PROFILE", default_value = "ov2640", value_enum)]
    pub profile: ProfileSetting,

    /// Sensor pixel format (jpeg, yuv422, rgb565, rgb888, grayscale)
    #[arg(long, env = "PIXEL_FORMAT", default_value = "jpeg")]
    pub format: String,

    /// Sensor frame size, by name (qvga, vga, ...) or as WIDTHxHEIGHT
    #[arg(long, env = "FRAME_SIZE", default_value = "vga")]
    pub frame_size: String,

    /// JPEG quality, 0 (best) to 63 (worst)
    #[arg(long, env = "JPEG_QUALITY", default_value = "10")]
    pub jpeg_quality: u8,

    /// Publish raw frames as they are instead of transcoding them to JPEG
    #[arg(long, env = "RAW_OUTPUT")]
    pub raw: bool,

    /// Number of driver frame buffers
    #[arg(long, env = "FB_COUNT", default_value = "1")]
    pub fb_count: u8,

    /// Allocate frame buffers from internal DRAM instead of PSRAM
    #[arg(long, env = "FB_DRAM")]
    pub fb_dram: bool,

    /// Sensor external clock in Hz
    #[arg(long, env = "XCLK_FREQ", default_value = "20000000")]
    pub xclk_freq: u32,

    /// Camera image mirroring setting
    #[arg(long, env = "MIRROR", default_value = "both", value_enum)]
    pub mirror: MirrorSetting,

    /// Sensor frame rate of the pattern generator
    #[arg(long, env = "FPS", default_value = "30")]
    pub fps: u32,

    /// Minimum time between two published images in milliseconds
    #[arg(long, env = "MAX_UPDATE_INTERVAL", default_value = "100")]
    pub max_update_interval: u64,

    /// Automatic refresh interval in milliseconds, 0 disables it
    #[arg(long, env = "IDLE_UPDATE_INTERVAL", default_value = "10000")]
    pub idle_update_interval: u64,

    /// Pin the capture thread to this CPU core
    #[arg(long, env = "CAPTURE_CORE")]
    pub capture_core: Option<usize>,

    /// Stream continuously instead of requesting single images
    #[arg(long, env = "STREAM")]
    pub stream: bool,

    /// Stop after writing this many images, 0 runs until interrupted
    #[arg(short = 'n', long, env = "FRAMES", default_value = "10")]
    pub frames: u64,

    /// Directory the JPEG files and their metadata are written to
    #[arg(short, long, env = "OUTPUT", default_value = ".")]
    pub output: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Send logs to the systemd journal
    #[arg(long, env = "JOURNALD")]
    pub journald: bool,
}

impl TryFrom<&Args> for CameraConfig {
    type Error = Error;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let pixel_format: PixelFormat = args.format.parse()?;
        let frame_size: FrameSize = args.frame_size.parse()?;
        let (vertical_flip, horizontal_mirror) = match args.mirror {
            MirrorSetting::None => (false, false),
            MirrorSetting::Horizontal => (false, true),
            MirrorSetting::Vertical => (true, false),
            MirrorSetting::Both => (true, true),
        };
        let fb_location = if args.fb_dram {
            FrameBufferLocation::Dram
        } else {
            FrameBufferLocation::Psram
        };

        CameraConfig::builder()
            .profile(args.profile.into())
            .pixel_format(pixel_format)
            .frame_size(frame_size)
            .jpeg_quality(args.jpeg_quality)
            .jpeg_output(!args.raw)
            .fb_count(args.fb_count)
            .fb_location(fb_location)
            .xclk_freq_hz(args.xclk_freq)
            .vertical_flip(vertical_flip)
            .horizontal_mirror(horizontal_mirror)
            .max_update_interval(Duration::from_millis(args.max_update_interval))
            .idle_update_interval(Duration::from_millis(args.idle_update_interval))
            .capture_core(args.capture_core)
            .build()
    }
}
