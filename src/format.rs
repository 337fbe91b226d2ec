// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::Error;
use core::fmt;
use std::str::FromStr;

/// Pixel formats a camera sensor can deliver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// JPEG compressed by the sensor (variable length)
    Jpeg,
    /// YUYV 4:2:2 YUV packed format
    Yuv422,
    /// RGB 16-bit, 5-6-5, big-endian as emitted by the sensor
    Rgb565,
    /// RGB 24-bit pixel format (8 bits per channel, no alpha)
    Rgb888,
    /// 8-bit luminance only
    Grayscale,
}

impl PixelFormat {
    /// Four character code matching the V4L2 naming of the format.
    pub const fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Jpeg => *b"JPEG",
            PixelFormat::Yuv422 => *b"YUYV",
            PixelFormat::Rgb565 => *b"RGBP",
            PixelFormat::Rgb888 => *b"RGB3",
            PixelFormat::Grayscale => *b"GREY",
        }
    }

    /// Bytes per pixel for uncompressed formats.
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Jpeg => None,
            PixelFormat::Yuv422 => Some(2),
            PixelFormat::Rgb565 => Some(2),
            PixelFormat::Rgb888 => Some(3),
            PixelFormat::Grayscale => Some(1),
        }
    }

    /// Exact payload length of a `width`x`height` frame, `None` for JPEG.
    pub const fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        match self.bytes_per_pixel() {
            Some(bpp) => Some(bpp * width as usize * height as usize),
            None => None,
        }
    }

    pub const fn is_compressed(self) -> bool {
        matches!(self, PixelFormat::Jpeg)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let code = self.fourcc();
        write!(f, "{}", String::from_utf8_lossy(&code))
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(PixelFormat::Jpeg),
            "yuv422" | "yuyv" => Ok(PixelFormat::Yuv422),
            "rgb565" | "rgbp" => Ok(PixelFormat::Rgb565),
            "rgb888" | "rgb3" => Ok(PixelFormat::Rgb888),
            "grayscale" | "grey" | "gray" => Ok(PixelFormat::Grayscale),
            _ => Err(Error::Config(format!("unknown pixel format '{s}'"))),
        }
    }
}

/// Sensor output resolutions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameSize {
    /// 160x120
    Qqvga,
    /// 176x144
    Qcif,
    /// 240x176
    Hqvga,
    /// 320x240
    Qvga,
    /// 400x296
    Cif,
    /// 480x320
    Hvga,
    /// 640x480
    Vga,
    /// 800x600
    Svga,
    /// 1024x768
    Xga,
    /// 1280x720
    Hd,
    /// 1280x1024
    Sxga,
    /// 1600x1200
    Uxga,
}

const FRAME_SIZES: [FrameSize; 12] = [
    FrameSize::Qqvga,
    FrameSize::Qcif,
    FrameSize::Hqvga,
    FrameSize::Qvga,
    FrameSize::Cif,
    FrameSize::Hvga,
    FrameSize::Vga,
    FrameSize::Svga,
    FrameSize::Xga,
    FrameSize::Hd,
    FrameSize::Sxga,
    FrameSize::Uxga,
];

impl FrameSize {
    pub const fn width(self) -> u32 {
        self.dimensions().0
    }

    pub const fn height(self) -> u32 {
        self.dimensions().1
    }

    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            FrameSize::Qqvga => (160, 120),
            FrameSize::Qcif => (176, 144),
            FrameSize::Hqvga => (240, 176),
            FrameSize::Qvga => (320, 240),
            FrameSize::Cif => (400, 296),
            FrameSize::Hvga => (480, 320),
            FrameSize::Vga => (640, 480),
            FrameSize::Svga => (800, 600),
            FrameSize::Xga => (1024, 768),
            FrameSize::Hd => (1280, 720),
            FrameSize::Sxga => (1280, 1024),
            FrameSize::Uxga => (1600, 1200),
        }
    }

    pub fn all() -> &'static [FrameSize] {
        &FRAME_SIZES
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (width, height) = self.dimensions();
        write!(f, "{width}x{height}")
    }
}

/// Accepts either `WIDTHxHEIGHT` or the short name (`qvga`, `vga`, ...).
impl FromStr for FrameSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        FRAME_SIZES
            .iter()
            .copied()
            .find(|size| {
                size.to_string() == lower || format!("{size:?}").to_lowercase() == lower
            })
            .ok_or_else(|| Error::Config(format!("unsupported frame size '{s}'")))
    }
}
