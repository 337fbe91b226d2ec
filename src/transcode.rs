// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Software conversion of raw sensor frames to JPEG.

use crate::{
    config::MAX_JPEG_QUALITY,
    error::{Error, Result},
    format::PixelFormat,
    frame::RawFrame,
};
use tracing::trace;
use turbojpeg::{OwnedBuf, Subsamp};

/// Converts a raw driver frame into a newly allocated JPEG.
///
/// The caller keeps ownership of `frame` and stays responsible for returning
/// it to the driver; the returned bytes belong to the caller and are freed by
/// dropping them.
pub trait Transcoder {
    /// Encodes `frame` at `quality`, 0 (best) to 63 (worst).
    fn encode(&self, frame: &RawFrame, quality: u8) -> Result<Vec<u8>>;
}

/// [`Transcoder`] backed by libjpeg-turbo.
///
/// YUYV and RGB565 frames are expanded to RGB888 first, RGB888 and grayscale
/// frames are compressed as they are.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegTranscoder;

impl Transcoder for JpegTranscoder {
    fn encode(&self, frame: &RawFrame, quality: u8) -> Result<Vec<u8>> {
        let info = frame.info();
        let expected = info
            .format
            .frame_len(info.width, info.height)
            .ok_or(Error::UnsupportedFormat(info.format))?;
        if frame.len() != expected {
            return Err(Error::FrameSize {
                expected,
                actual: frame.len(),
            });
        }

        let width = info.width as usize;
        let height = info.height as usize;
        let quality = turbojpeg_quality(quality);
        let jpeg = match info.format {
            PixelFormat::Yuv422 => {
                let mut rgb = vec![0; width * height * 3];
                yuyv_to_rgb(frame.data(), &mut rgb);
                encode_jpeg(
                    &rgb,
                    width,
                    height,
                    turbojpeg::PixelFormat::RGB,
                    quality,
                    Subsamp::Sub2x1,
                )?
            }
            PixelFormat::Rgb565 => {
                let mut rgb = vec![0; width * height * 3];
                rgb565_to_rgb(frame.data(), &mut rgb);
                encode_jpeg(
                    &rgb,
                    width,
                    height,
                    turbojpeg::PixelFormat::RGB,
                    quality,
                    Subsamp::Sub2x2,
                )?
            }
            PixelFormat::Rgb888 => encode_jpeg(
                frame.data(),
                width,
                height,
                turbojpeg::PixelFormat::RGB,
                quality,
                Subsamp::Sub2x2,
            )?,
            PixelFormat::Grayscale => encode_jpeg(
                frame.data(),
                width,
                height,
                turbojpeg::PixelFormat::GRAY,
                quality,
                Subsamp::Gray,
            )?,
            PixelFormat::Jpeg => return Err(Error::UnsupportedFormat(PixelFormat::Jpeg)),
        };

        trace!(
            "transcoded {}x{} {} {}KB to jpeg {}KB",
            info.width,
            info.height,
            info.format,
            frame.len() / 1024,
            jpeg.len() / 1024
        );
        Ok(jpeg.to_vec())
    }
}

/// Maps the sensor quality scale (0 best, 63 worst) onto libjpeg's 1-100.
pub const fn turbojpeg_quality(quality: u8) -> i32 {
    let quality = if quality > MAX_JPEG_QUALITY {
        MAX_JPEG_QUALITY
    } else {
        quality
    };
    let mapped = 100 - quality as i32 * 100 / MAX_JPEG_QUALITY as i32;
    if mapped < 1 {
        1
    } else {
        mapped
    }
}

/// Compresses packed pixels using turbojpeg with SIMD.
///
/// # Arguments
///
/// * `pix` - Packed pixel rows without padding
/// * `width`, `height` - Image dimensions in pixels
/// * `format` - Layout of `pix` (`RGB` or `GRAY`)
/// * `quality` - libjpeg quality, 1-100
/// * `subsamp` - Chroma subsampling of the output
///
/// # Errors
///
/// Returns an error if the pixel buffer is too small for the dimensions or
/// if compression fails.
pub fn encode_jpeg(
    pix: &[u8],
    width: usize,
    height: usize,
    format: turbojpeg::PixelFormat,
    quality: i32,
    subsamp: Subsamp,
) -> Result<OwnedBuf> {
    let pitch = width * format.size();
    if pix.len() < pitch * height {
        return Err(Error::FrameSize {
            expected: pitch * height,
            actual: pix.len(),
        });
    }

    let img = turbojpeg::Image {
        width,
        height,
        format,
        pixels: pix,
        pitch,
    };

    Ok(turbojpeg::compress(img, quality, subsamp)?)
}

/// Expands YUYV 4:2:2 (full-range BT.601) into packed RGB888.
///
/// `dst` must hold `src.len() / 2 * 3` bytes; trailing bytes of an odd
/// `src` are ignored.
pub fn yuyv_to_rgb(src: &[u8], dst: &mut [u8]) {
    for (yuyv, rgb) in src.chunks_exact(4).zip(dst.chunks_exact_mut(6)) {
        let u = yuyv[1] as i32 - 128;
        let v = yuyv[3] as i32 - 128;
        let (r, g, b) = ycbcr(yuyv[0], u, v);
        rgb[0] = r;
        rgb[1] = g;
        rgb[2] = b;
        let (r, g, b) = ycbcr(yuyv[2], u, v);
        rgb[3] = r;
        rgb[4] = g;
        rgb[5] = b;
    }
}

// Fixed point (x1024) of r = y + 1.402v, g = y - 0.344u - 0.714v, b = y + 1.772u
#[inline]
fn ycbcr(y: u8, u: i32, v: i32) -> (u8, u8, u8) {
    let y = (y as i32) << 10;
    let r = (y + 1436 * v) >> 10;
    let g = (y - 352 * u - 731 * v) >> 10;
    let b = (y + 1815 * u) >> 10;
    (clamp(r), clamp(g), clamp(b))
}

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Expands big-endian RGB565 into packed RGB888.
pub fn rgb565_to_rgb(src: &[u8], dst: &mut [u8]) {
    for (px, rgb) in src.chunks_exact(2).zip(dst.chunks_exact_mut(3)) {
        let value = u16::from_be_bytes([px[0], px[1]]);
        let r = ((value >> 11) & 0x1f) as u8;
        let g = ((value >> 5) & 0x3f) as u8;
        let b = (value & 0x1f) as u8;
        rgb[0] = (r << 3) | (r >> 2);
        rgb[1] = (g << 2) | (g >> 4);
        rgb[2] = (b << 3) | (b >> 2);
    }
}
