// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

#![allow(dead_code)]

use edgefirst_capture::{
    config::CameraConfig,
    driver::FrameDriver,
    format::PixelFormat,
    frame::{FrameInfo, RawFrame},
    image::ImageHandle,
    pipeline::{FramePipeline, ImageListener},
    transcode::Transcoder,
    Error, Result,
};
use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;

/// One scripted driver response.
#[derive(Copy, Clone, Debug)]
pub enum Step {
    Timeout,
    Frame(PixelFormat),
}

/// What the scripted driver has been asked to do so far.
#[derive(Default, Debug)]
pub struct Counters {
    pub inits: AtomicUsize,
    pub acquires: AtomicUsize,
    pub timeouts: AtomicUsize,
    pub releases: AtomicUsize,
    pub outstanding: AtomicUsize,
    pub max_outstanding: AtomicUsize,
    /// Slots in release order, every acquire gets a fresh slot.
    pub released: Mutex<Vec<usize>>,
}

impl Counters {
    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn released_slots(&self) -> Vec<usize> {
        self.released.lock().unwrap().clone()
    }
}

/// Driver that plays a script of frames and timeouts, then keeps producing
/// `repeat` frames (or timeouts when there is none).
pub struct ScriptedDriver {
    script: VecDeque<Step>,
    repeat: Option<PixelFormat>,
    fail_init: bool,
    next_slot: usize,
    counters: Arc<Counters>,
}

impl ScriptedDriver {
    pub fn new(script: impl IntoIterator<Item = Step>) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let driver = Self {
            script: script.into_iter().collect(),
            repeat: None,
            fail_init: false,
            next_slot: 0,
            counters: counters.clone(),
        };
        (driver, counters)
    }

    pub fn repeating(format: PixelFormat) -> (Self, Arc<Counters>) {
        let (mut driver, counters) = Self::new([]);
        driver.repeat = Some(format);
        (driver, counters)
    }

    pub fn then_repeat(mut self, format: PixelFormat) -> Self {
        self.repeat = Some(format);
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    fn frame(&mut self, format: PixelFormat) -> RawFrame {
        let slot = self.next_slot;
        self.next_slot += 1;
        let data = match format.frame_len(WIDTH, HEIGHT) {
            Some(len) => vec![slot as u8; len],
            None => vec![0xff, 0xd8, slot as u8, 0xff, 0xd9],
        };
        let info = FrameInfo {
            width: WIDTH,
            height: HEIGHT,
            format,
            timestamp: Duration::from_millis(slot as u64),
        };
        RawFrame::new(slot, info, data)
    }
}

impl FrameDriver for ScriptedDriver {
    fn init(&mut self, _config: &CameraConfig) -> Result<()> {
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(Error::DriverInit("no sensor detected".into()));
        }
        Ok(())
    }

    fn acquire(&mut self) -> Result<RawFrame> {
        let step = match self.script.pop_front() {
            Some(step) => step,
            None => match self.repeat {
                Some(format) => Step::Frame(format),
                None => {
                    thread::sleep(Duration::from_millis(5));
                    Step::Timeout
                }
            },
        };

        match step {
            Step::Timeout => {
                self.counters.timeouts.fetch_add(1, Ordering::SeqCst);
                Err(Error::AcquireTimeout)
            }
            Step::Frame(format) => {
                self.counters.acquires.fetch_add(1, Ordering::SeqCst);
                let outstanding = self.counters.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
                self.counters
                    .max_outstanding
                    .fetch_max(outstanding, Ordering::SeqCst);
                Ok(self.frame(format))
            }
        }
    }

    fn release(&mut self, frame: RawFrame) {
        self.counters.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        self.counters.released.lock().unwrap().push(frame.slot());
    }
}

/// Transcoder that always fails.
pub struct FailingTranscoder;

impl Transcoder for FailingTranscoder {
    fn encode(&self, frame: &RawFrame, _quality: u8) -> Result<Vec<u8>> {
        Err(Error::UnsupportedFormat(frame.info().format))
    }
}

/// Transcoder that returns the same bytes for every frame.
#[derive(Clone)]
pub struct FixedTranscoder {
    pub jpeg: Vec<u8>,
    pub calls: Arc<AtomicUsize>,
}

impl FixedTranscoder {
    pub fn new(jpeg: &[u8]) -> Self {
        Self {
            jpeg: jpeg.to_vec(),
            calls: Arc::default(),
        }
    }
}

impl Transcoder for FixedTranscoder {
    fn encode(&self, _frame: &RawFrame, _quality: u8) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.jpeg.clone())
    }
}

/// Listener keeping every image it is given until told otherwise.
#[derive(Clone, Default)]
pub struct Collect {
    pub images: Rc<RefCell<Vec<ImageHandle>>>,
    pub stream_starts: Rc<RefCell<usize>>,
    pub stream_stops: Rc<RefCell<usize>>,
}

impl Collect {
    pub fn len(&self) -> usize {
        self.images.borrow().len()
    }

    pub fn last(&self) -> Option<ImageHandle> {
        self.images.borrow().last().cloned()
    }

    /// Drops every kept handle.
    pub fn clear(&self) {
        self.images.borrow_mut().clear();
    }
}

impl ImageListener for Collect {
    fn on_new_image(&mut self, image: ImageHandle) {
        self.images.borrow_mut().push(image);
    }

    fn on_stream_start(&mut self) {
        *self.stream_starts.borrow_mut() += 1;
    }

    fn on_stream_stop(&mut self) {
        *self.stream_stops.borrow_mut() += 1;
    }
}

/// Listener that only records the requester mask of each image.
#[derive(Clone, Default)]
pub struct Masks(pub Rc<RefCell<Vec<u8>>>);

impl ImageListener for Masks {
    fn on_new_image(&mut self, image: ImageHandle) {
        self.0.borrow_mut().push(image.requesters());
    }
}

/// Config with no publish throttling and no idle requests.
pub fn config(format: PixelFormat) -> CameraConfig {
    CameraConfig::builder()
        .pixel_format(format)
        .max_update_interval(Duration::ZERO)
        .idle_update_interval(Duration::ZERO)
        .acquire_backoff(Duration::from_millis(1))
        .build()
        .unwrap()
}

/// Runs the pipeline until `done` holds or a second has passed.
pub fn poll_until(
    camera: &mut FramePipeline,
    mut done: impl FnMut(&FramePipeline) -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        camera.loop_once();
        if done(camera) {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Runs the pipeline for `duration` regardless of what happens.
pub fn poll_for(camera: &mut FramePipeline, duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        camera.loop_once();
        thread::sleep(Duration::from_millis(1));
    }
}

/// Waits for the capture thread to catch up with a counter.
pub fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}
