// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_capture::{
    format::PixelFormat,
    image::{ImageHandle, ImageReader},
    pipeline::ImageListener,
};
use serde_json::json;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Hands published images to the writer task.
///
/// Runs on the pipeline context so it never waits; if the writer is still
/// busy with the previous image the new one is skipped.
pub struct ChannelListener {
    tx: mpsc::Sender<ImageHandle>,
}

pub fn channel() -> (ChannelListener, mpsc::Receiver<ImageHandle>) {
    let (tx, rx) = mpsc::channel(1);
    (ChannelListener { tx }, rx)
}

impl ImageListener for ChannelListener {
    fn on_new_image(&mut self, image: ImageHandle) {
        if let Err(e) = self.tx.try_send(image) {
            warn!("image writer busy, skipping image: {}", e);
        }
    }

    fn on_stream_start(&mut self) {
        debug!("stream started");
    }

    fn on_stream_stop(&mut self) {
        debug!("stream stopped");
    }
}

/// Writes images from `rx` into `dir` until `limit` images are written (0
/// for no limit) or the channel closes. Returns the number written.
pub async fn write_images(
    mut rx: mpsc::Receiver<ImageHandle>,
    dir: PathBuf,
    limit: u64,
) -> io::Result<u64> {
    let mut written = 0;
    while let Some(image) = rx.recv().await {
        let dir = dir.clone();
        let index = written;
        let path = tokio::task::spawn_blocking(move || write_image(&dir, index, image))
            .await
            .map_err(io::Error::other)?;
        match path {
            Ok(path) => {
                info!("wrote {}", path.display());
                written += 1;
            }
            Err(e) => error!("failed to write image {}: {}", index, e),
        }
        if limit > 0 && written >= limit {
            break;
        }
    }
    Ok(written)
}

/// Streams one image to `frame-NNNNN.jpg` (`.raw` when not JPEG) and its
/// metadata to `frame-NNNNN.json`.
pub fn write_image(dir: &Path, index: u64, image: ImageHandle) -> io::Result<PathBuf> {
    let info = image.info();
    let extension = match info.format {
        PixelFormat::Jpeg => "jpg",
        _ => "raw",
    };
    let path = dir.join(format!("frame-{index:05}.{extension}"));
    let meta = json!({
        "width": info.width,
        "height": info.height,
        "format": info.format.to_string(),
        "timestamp_ms": info.timestamp.as_millis() as u64,
        "bytes": image.len(),
        "provenance": image.provenance().to_string(),
        "transcoded": image.is_transcoded(),
        "requesters": image.requesters(),
    });

    let mut reader = ImageReader::default();
    reader.set_image(image);
    let mut file = BufWriter::new(File::create(&path)?);
    io::copy(&mut reader, &mut file)?;
    file.flush()?;
    reader.return_image();

    let sidecar = File::create(path.with_extension("json"))?;
    serde_json::to_writer_pretty(sidecar, &meta)?;
    Ok(path)
}
