// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    capture::{self, CaptureLink, WakeFn},
    config::CameraConfig,
    demand::{Demand, Requester},
    driver::FrameDriver,
    error::Error,
    format::PixelFormat,
    frame::{FrameBuffer, RawFrame},
    image::{CameraImage, ImageHandle},
    transcode::{JpegTranscoder, Transcoder},
};
use kanal::{Receiver, Sender};
use std::{
    collections::VecDeque,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};
use tracing::{debug, error, info, trace, warn};

/// Consumer notified synchronously for every published image.
///
/// A listener may keep the handle for as long as it needs the bytes; the
/// buffer is reclaimed after the last clone is dropped.
pub trait ImageListener {
    fn on_new_image(&mut self, image: ImageHandle);

    fn on_stream_start(&mut self) {}

    fn on_stream_stop(&mut self) {}
}

/// Publish/release state of the current image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// No image is published.
    Idle,
    /// An image was published and handed to the listeners.
    Published,
    /// Consumers still hold the published image.
    AwaitingRelease,
}

/// Counters of frame movements through the pipeline.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Images handed to listeners.
    pub published: u64,
    /// Frames lost to transcode failures.
    pub dropped: u64,
    /// Frames rejected as invalid.
    pub invalid: u64,
    /// Driver buffers sent back to the capture task.
    pub driver_returns: u64,
    /// Transcoded buffers deallocated.
    pub heap_releases: u64,
}

struct Link {
    forward: Receiver<RawFrame>,
    returns: Sender<RawFrame>,
    parked: VecDeque<RawFrame>,
    capture: Option<JoinHandle<()>>,
}

impl Link {
    fn give_back(&mut self, frame: RawFrame, stats: &mut PipelineStats) {
        stats.driver_returns += 1;
        self.parked.push_back(frame);
        self.flush();
    }

    /// Sends parked frames without blocking; whatever does not fit stays
    /// parked for the next invocation.
    fn flush(&mut self) {
        while let Some(frame) = self.parked.pop_front() {
            let slot = frame.slot();
            let mut pending = Some(frame);
            match self.returns.try_send_option(&mut pending) {
                Ok(true) => trace!("returned frame buffer slot {}", slot),
                Ok(false) => {
                    if let Some(frame) = pending {
                        debug!("return channel busy, parking frame buffer slot {}", slot);
                        self.parked.push_front(frame);
                    }
                    break;
                }
                Err(_) => {
                    debug!("capture task gone, dropping frame buffer slot {}", slot);
                    self.parked.clear();
                    break;
                }
            }
        }
    }
}

enum Status {
    Configured,
    Running(Link),
    Failed(Error),
}

/// The frame buffer pipeline.
///
/// Owns the forward and return channels to the capture task, the currently
/// published image and the requester demand. [`FramePipeline::loop_once`] is
/// meant to be called periodically from a single host context and never
/// blocks.
///
/// # Example
///
/// ```no_run
/// use edgefirst_capture::config::CameraConfig;
/// use edgefirst_capture::demand::Requester;
/// use edgefirst_capture::driver::PatternDriver;
/// use edgefirst_capture::image::ImageHandle;
/// use edgefirst_capture::pipeline::{FramePipeline, ImageListener};
///
/// struct Print;
///
/// impl ImageListener for Print {
///     fn on_new_image(&mut self, image: ImageHandle) {
///         println!("{}", image);
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut camera = FramePipeline::new(CameraConfig::builder().build()?);
/// camera.add_listener(Print);
/// camera.setup(PatternDriver::new(30));
///
/// camera.request_image(Requester::Api);
/// loop {
///     camera.loop_once();
///     if camera.stats().published > 0 {
///         break;
///     }
///     std::thread::sleep(std::time::Duration::from_millis(5));
/// }
/// # Ok(())
/// # }
/// ```
pub struct FramePipeline {
    config: CameraConfig,
    demand: Arc<Demand>,
    listeners: Vec<Box<dyn ImageListener>>,
    transcoder: Box<dyn Transcoder>,
    wake: Option<WakeFn>,
    status: Status,
    current: Option<ImageHandle>,
    state: PipelineState,
    stats: PipelineStats,
    last_update: Instant,
    last_idle_request: Instant,
}

impl FramePipeline {
    pub fn new(config: CameraConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            demand: Arc::default(),
            listeners: Vec::new(),
            transcoder: Box::new(JpegTranscoder),
            wake: None,
            status: Status::Configured,
            current: None,
            state: PipelineState::Idle,
            stats: PipelineStats::default(),
            last_update: now,
            last_idle_request: now,
        }
    }

    pub fn add_listener(&mut self, listener: impl ImageListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Replaces the default [`JpegTranscoder`].
    pub fn set_transcoder(&mut self, transcoder: impl Transcoder + 'static) {
        self.transcoder = Box::new(transcoder);
    }

    /// Callback the capture thread uses to wake the host loop when a frame
    /// is ready and requested. Must be set before [`FramePipeline::setup`].
    pub fn set_wake(&mut self, wake: impl Fn() + Send + Sync + 'static) {
        self.wake = Some(Arc::new(wake));
    }

    /// Initializes the driver and starts the capture task.
    ///
    /// A driver initialization failure leaves the pipeline permanently
    /// failed; it is logged here once and available from
    /// [`FramePipeline::init_error`].
    pub fn setup<D: FrameDriver>(&mut self, mut driver: D) {
        if !matches!(self.status, Status::Configured) {
            warn!("camera setup called twice, ignoring");
            return;
        }

        if let Err(e) = driver.init(&self.config) {
            error!("camera driver init failed: {}", e);
            self.status = Status::Failed(e);
            return;
        }

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            thread::sleep(settle);
        }

        let (forward_tx, forward_rx) = kanal::bounded(1);
        let (return_tx, return_rx) = kanal::bounded(1);
        let link = CaptureLink {
            forward: forward_tx,
            returns: return_rx,
            demand: self.demand.clone(),
            wake: self.wake.clone(),
            backoff: self.config.acquire_backoff(),
            core: self.config.capture_core(),
        };

        match capture::spawn(driver, link) {
            Ok(handle) => {
                self.attach(forward_rx, return_tx, Some(handle));
                info!("camera setup complete");
            }
            Err(e) => {
                error!("failed to start capture task: {}", e);
                self.status = Status::Failed(Error::Io(e));
            }
        }
    }

    pub(crate) fn attach(
        &mut self,
        forward: Receiver<RawFrame>,
        returns: Sender<RawFrame>,
        capture: Option<JoinHandle<()>>,
    ) {
        let now = Instant::now();
        self.last_update = now;
        self.last_idle_request = now;
        self.status = Status::Running(Link {
            forward,
            returns,
            parked: VecDeque::new(),
            capture,
        });
    }

    /// Runs one publish/release step. Never blocks.
    pub fn loop_once(&mut self) {
        self.poll_at(Instant::now());
    }

    pub(crate) fn poll_at(&mut self, now: Instant) {
        let Status::Running(link) = &mut self.status else {
            return;
        };
        link.flush();

        if let Some(image) = self.current.take() {
            match Arc::try_unwrap(image) {
                Ok(image) => {
                    match image.into_buffer() {
                        FrameBuffer::Driver(frame) => link.give_back(frame, &mut self.stats),
                        FrameBuffer::Heap { data, .. } => {
                            trace!("freeing {} byte transcoded image", data.len());
                            drop(data);
                            self.stats.heap_releases += 1;
                        }
                    }
                    self.state = PipelineState::Idle;
                }
                Err(image) => {
                    self.current = Some(image);
                    self.state = PipelineState::AwaitingRelease;
                }
            }
        }

        let idle = self.config.idle_update_interval();
        if !idle.is_zero() && now.saturating_duration_since(self.last_idle_request) >= idle {
            self.last_idle_request = now;
            self.demand.request(Requester::Idle);
        }

        if !self.demand.is_pending() || self.current.is_some() {
            return;
        }
        if now.saturating_duration_since(self.last_update) < self.config.max_update_interval() {
            return;
        }

        let frame = match link.forward.try_recv() {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(_) => {
                error!("capture task stopped unexpectedly");
                self.status = Status::Failed(Error::Sensor("capture task stopped".into()));
                return;
            }
        };

        if !frame.is_valid() {
            warn!(
                "got invalid frame from driver: {}x{} {} bytes",
                frame.info().width,
                frame.info().height,
                frame.len()
            );
            self.stats.invalid += 1;
            link.give_back(frame, &mut self.stats);
            return;
        }

        let info = frame.info();
        let (buffer, transcoded) =
            if self.config.jpeg_output() && info.format != PixelFormat::Jpeg {
                let encoded = self.transcoder.encode(&frame, self.config.jpeg_quality());
                // The driver buffer goes back right away, the jpeg lives on
                // the heap from here.
                link.give_back(frame, &mut self.stats);
                match encoded {
                    Ok(data) => (
                        FrameBuffer::Heap {
                            info: info.with_format(PixelFormat::Jpeg),
                            data,
                        },
                        true,
                    ),
                    Err(e) => {
                        error!("{} to jpeg conversion failed: {}", info.format, e);
                        self.stats.dropped += 1;
                        return;
                    }
                }
            } else {
                (FrameBuffer::Driver(frame), false)
            };

        let image = Arc::new(CameraImage::new(buffer, self.demand.mask(), transcoded));
        debug!("publishing {}", image);
        self.current = Some(Arc::clone(&image));
        self.state = PipelineState::Published;
        self.stats.published += 1;

        for listener in &mut self.listeners {
            listener.on_new_image(Arc::clone(&image));
        }

        self.last_update = now;
        self.demand.clear_single();
    }

    /// Asks for one image on behalf of `requester`.
    pub fn request_image(&mut self, requester: Requester) {
        self.demand.request(requester);
    }

    pub fn start_stream(&mut self, requester: Requester) {
        for listener in &mut self.listeners {
            listener.on_stream_start();
        }
        self.demand.start_stream(requester);
    }

    pub fn stop_stream(&mut self, requester: Requester) {
        for listener in &mut self.listeners {
            listener.on_stream_stop();
        }
        self.demand.stop_stream(requester);
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn demand(&self) -> &Demand {
        &self.demand
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// The image published last, until the pipeline reclaims it.
    pub fn current_image(&self) -> Option<&ImageHandle> {
        self.current.as_ref()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, Status::Running(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, Status::Failed(_))
    }

    /// Why the pipeline failed, if it did.
    pub fn init_error(&self) -> Option<&Error> {
        match &self.status {
            Status::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Logs the active configuration and, if setup failed, the reason.
    pub fn log_config(&self) {
        let config = &self.config;
        info!("camera {}:", config.profile());
        info!(
            "  resolution: {} {}",
            config.frame_size(),
            config.pixel_format()
        );
        info!(
            "  jpeg output: {} quality: {}",
            config.jpeg_output(),
            config.jpeg_quality()
        );
        info!(
            "  frame buffers: {} {:?} in {:?}",
            config.fb_count(),
            config.grab_mode(),
            config.fb_location()
        );
        info!(
            "  xclk: {}MHz vertical flip: {} horizontal mirror: {}",
            config.xclk_freq_hz() / 1_000_000,
            config.vertical_flip(),
            config.horizontal_mirror()
        );
        info!(
            "  max update interval: {:?} idle update interval: {:?}",
            config.max_update_interval(),
            config.idle_update_interval()
        );
        if let Status::Failed(e) = &self.status {
            error!("  setup failed: {}", e);
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if let Status::Running(link) = std::mem::replace(&mut self.status, Status::Configured) {
            let Link {
                forward,
                returns,
                parked,
                capture,
            } = link;
            drop(forward);
            drop(returns);
            drop(parked);
            if let Some(handle) = capture {
                if handle.join().is_err() {
                    warn!("capture task panicked");
                }
            }
            debug!("frame pipeline stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameInfo, Provenance};
    use std::{cell::RefCell, rc::Rc, time::Duration};

    #[derive(Default, Clone)]
    struct Keep(Rc<RefCell<Vec<ImageHandle>>>);

    impl ImageListener for Keep {
        fn on_new_image(&mut self, image: ImageHandle) {
            self.0.borrow_mut().push(image);
        }
    }

    struct Harness {
        pipeline: FramePipeline,
        forward: Sender<RawFrame>,
        returns: Receiver<RawFrame>,
        start: Instant,
    }

    fn harness(config: CameraConfig) -> Harness {
        let (forward_tx, forward_rx) = kanal::bounded(1);
        let (return_tx, return_rx) = kanal::bounded(1);
        let mut pipeline = FramePipeline::new(config);
        pipeline.attach(forward_rx, return_tx, None);
        Harness {
            pipeline,
            forward: forward_tx,
            returns: return_rx,
            start: Instant::now(),
        }
    }

    fn config() -> CameraConfig {
        CameraConfig::builder()
            .max_update_interval(Duration::ZERO)
            .idle_update_interval(Duration::ZERO)
            .build()
            .unwrap()
    }

    fn jpeg_frame(slot: usize) -> RawFrame {
        let info = FrameInfo {
            width: 2,
            height: 2,
            format: PixelFormat::Jpeg,
            timestamp: Duration::from_secs(1),
        };
        RawFrame::new(slot, info, vec![0xff, 0xd8, 0xff, 0xd9])
    }

    #[test]
    fn test_no_fetch_without_demand() {
        let mut h = harness(config());
        h.forward.send(jpeg_frame(0)).unwrap();
        for i in 0..10 {
            h.pipeline.poll_at(h.start + Duration::from_millis(i));
        }
        assert_eq!(h.pipeline.stats().published, 0);
        assert_eq!(h.forward.len(), 1);

        h.pipeline.request_image(Requester::Api);
        h.pipeline.poll_at(h.start + Duration::from_millis(20));
        assert_eq!(h.pipeline.stats().published, 1);
        assert_eq!(h.forward.len(), 0);
    }

    #[test]
    fn test_release_waits_for_consumers() {
        let mut h = harness(config());
        let kept = Keep::default();
        h.pipeline.add_listener(kept.clone());
        h.pipeline.request_image(Requester::WebServer);
        h.forward.send(jpeg_frame(5)).unwrap();

        h.pipeline.poll_at(h.start);
        assert_eq!(h.pipeline.state(), PipelineState::Published);
        let image = h.pipeline.current_image().cloned().unwrap();
        assert_eq!(image.provenance(), Provenance::Driver);
        assert!(image.was_requested_by(Requester::WebServer));
        drop(image);

        for _ in 0..5 {
            h.pipeline.poll_at(h.start);
            assert_eq!(h.pipeline.state(), PipelineState::AwaitingRelease);
            assert!(h.returns.try_recv().unwrap().is_none());
        }

        kept.0.borrow_mut().clear();
        h.pipeline.poll_at(h.start);
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
        let returned = h.returns.try_recv().unwrap().unwrap();
        assert_eq!(returned.slot(), 5);
        assert_eq!(h.pipeline.stats().driver_returns, 1);
        assert_eq!(h.pipeline.stats().heap_releases, 0);
    }

    #[test]
    fn test_max_update_interval() {
        let config = CameraConfig::builder()
            .max_update_interval(Duration::from_millis(100))
            .idle_update_interval(Duration::ZERO)
            .build()
            .unwrap();
        let mut h = harness(config);
        h.pipeline.start_stream(Requester::WebServer);
        h.forward.send(jpeg_frame(0)).unwrap();

        h.pipeline.poll_at(h.start + Duration::from_millis(50));
        assert_eq!(h.pipeline.stats().published, 0);

        h.pipeline.poll_at(h.start + Duration::from_millis(150));
        assert_eq!(h.pipeline.stats().published, 1);

        // released and returned, but the next frame waits for the interval
        h.pipeline.poll_at(h.start + Duration::from_millis(160));
        let frame = h.returns.try_recv().unwrap().unwrap();
        h.forward.send(frame).unwrap();
        h.pipeline.poll_at(h.start + Duration::from_millis(200));
        assert_eq!(h.pipeline.stats().published, 1);
        h.pipeline.poll_at(h.start + Duration::from_millis(251));
        assert_eq!(h.pipeline.stats().published, 2);
    }

    #[test]
    fn test_idle_request() {
        let config = CameraConfig::builder()
            .max_update_interval(Duration::ZERO)
            .idle_update_interval(Duration::from_secs(1))
            .build()
            .unwrap();
        let mut h = harness(config);
        h.forward.send(jpeg_frame(0)).unwrap();

        h.pipeline.poll_at(h.start + Duration::from_millis(500));
        assert_eq!(h.pipeline.stats().published, 0);

        h.pipeline.poll_at(h.start + Duration::from_millis(1500));
        let image = h.pipeline.current_image().cloned().unwrap();
        assert!(image.was_requested_by(Requester::Idle));
        assert_eq!(h.pipeline.demand().single(), 0);
    }

    #[test]
    fn test_busy_return_channel_parks_frame() {
        let mut h = harness(config());
        // occupy the return slot like a capture task that has not caught up
        h.pipeline_returns().send(jpeg_frame(9)).unwrap();

        h.pipeline.request_image(Requester::Api);
        h.forward.send(jpeg_frame(1)).unwrap();
        h.pipeline.poll_at(h.start);
        h.pipeline.poll_at(h.start);
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
        assert_eq!(h.pipeline.stats().driver_returns, 1);

        assert_eq!(h.returns.try_recv().unwrap().unwrap().slot(), 9);
        assert!(h.returns.try_recv().unwrap().is_none());

        h.pipeline.poll_at(h.start);
        assert_eq!(h.returns.try_recv().unwrap().unwrap().slot(), 1);
    }

    #[test]
    fn test_invalid_frame_is_returned() {
        let mut h = harness(config());
        h.pipeline.request_image(Requester::Api);
        let info = FrameInfo {
            width: 0,
            height: 0,
            format: PixelFormat::Jpeg,
            timestamp: Duration::ZERO,
        };
        h.forward.send(RawFrame::new(2, info, Vec::new())).unwrap();
        h.pipeline.poll_at(h.start);

        let stats = h.pipeline.stats();
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.published, 0);
        assert_eq!(stats.driver_returns, 1);
        assert_eq!(h.returns.try_recv().unwrap().unwrap().slot(), 2);
        assert_eq!(h.pipeline.demand().single(), Requester::Api.bit());
    }

    #[test]
    fn test_not_running_is_inert() {
        let mut pipeline = FramePipeline::new(config());
        pipeline.request_image(Requester::Api);
        pipeline.loop_once();
        assert!(!pipeline.is_running());
        assert!(!pipeline.is_failed());
        assert_eq!(pipeline.stats(), PipelineStats::default());
    }

    impl Harness {
        /// Second sender on the pipeline's return channel.
        fn pipeline_returns(&self) -> Sender<RawFrame> {
            match &self.pipeline.status {
                Status::Running(link) => link.returns.clone(),
                _ => unreachable!(),
            }
        }
    }
}
