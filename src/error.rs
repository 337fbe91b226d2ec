// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::format::PixelFormat;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the frame buffer pipeline and its collaborators.
///
/// Per-frame errors are handled inside the pipeline and never reach image
/// consumers; only setup-time errors are surfaced to the host, through
/// [`FramePipeline::init_error`](crate::pipeline::FramePipeline::init_error).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The camera driver could not be brought up. Permanent.
    #[error("camera driver initialization failed: {0}")]
    DriverInit(String),

    /// The driver did not deliver a frame within its internal timeout.
    #[error("timed out waiting for a frame from the driver")]
    AcquireTimeout,

    /// The sensor reported a fault while capturing.
    #[error("sensor fault: {0}")]
    Sensor(String),

    /// Every buffer of the driver pool is currently handed out.
    #[error("frame buffer pool exhausted")]
    PoolExhausted,

    /// The transcoder cannot handle this pixel format.
    #[error("unsupported pixel format {0} for jpeg transcode")]
    UnsupportedFormat(PixelFormat),

    /// The frame payload does not match its declared geometry.
    #[error("frame size mismatch: expected {expected} bytes but found {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("jpeg compression failed: {0}")]
    Jpeg(#[from] turbojpeg::Error),

    /// Rejected by [`CameraConfigBuilder::build`](crate::config::CameraConfigBuilder::build).
    #[error("invalid camera configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the capture task should simply try again after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::AcquireTimeout | Error::Sensor(_) | Error::PoolExhausted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_faults_are_retryable() {
        assert!(Error::AcquireTimeout.is_retryable());
        assert!(Error::Sensor("xclk unstable".into()).is_retryable());
        assert!(!Error::DriverInit("no sensor".into()).is_retryable());
        assert!(!Error::UnsupportedFormat(PixelFormat::Jpeg).is_retryable());
    }

    #[test]
    fn messages() {
        let err = Error::FrameSize {
            expected: 153600,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "frame size mismatch: expected 153600 bytes but found 12"
        );
        assert_eq!(
            Error::UnsupportedFormat(PixelFormat::Jpeg).to_string(),
            "unsupported pixel format JPEG for jpeg transcode"
        );
    }
}
