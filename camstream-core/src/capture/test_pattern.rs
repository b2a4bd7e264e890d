//! Synthetic capture pipeline
//!
//! Generates a moving YUV420 test pattern at the configured geometry and
//! framerate. The encode stage is a passthrough (raw YUV420 output) that can
//! hold back the first few frames to model waiting for a synchronised start.

use bytes::{BufMut, BytesMut};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::{CapturePipeline, ColourspaceFlags, Msg};
use crate::config::RunOptions;
use crate::error::CaptureError;
use crate::output::SharedOutput;
use crate::transform::Transform;
use crate::types::{CompletedRequest, FrameMetadata, StreamInfo};

/// Frames queued between the producer task and the event loop
const QUEUE_DEPTH: usize = 4;

/// Shortest watchdog period before a stall is reported
const MIN_WATCHDOG: Duration = Duration::from_secs(1);

/// Test-pattern camera with a passthrough encoder
pub struct TestPatternPipeline {
    options: RunOptions,
    watchdog: Duration,
    frame_limit: Option<u64>,
    sync_remaining: u64,
    output: Option<SharedOutput>,
    opened: bool,
    stream: Option<StreamInfo>,
    encoder_running: bool,
    producer: Option<JoinHandle<()>>,
    frame_rx: Option<mpsc::Receiver<CompletedRequest>>,
    frames_encoded: u64,
    frames_held: u64,
}

impl TestPatternPipeline {
    pub fn new(options: RunOptions) -> Self {
        let watchdog = (options.frame_interval() * 10).max(MIN_WATCHDOG);
        Self {
            options,
            watchdog,
            frame_limit: None,
            sync_remaining: 0,
            output: None,
            opened: false,
            stream: None,
            encoder_running: false,
            producer: None,
            frame_rx: None,
            frames_encoded: 0,
            frames_held: 0,
        }
    }

    /// Hold back this many frames before committing any for output
    pub fn with_sync_frames(mut self, frames: u64) -> Self {
        self.sync_remaining = frames;
        self
    }

    /// Stop producing (and report `Quit`) after this many frames per start
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Override the stall watchdog period
    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    pub fn frames_held(&self) -> u64 {
        self.frames_held
    }

    pub fn is_capturing(&self) -> bool {
        self.producer.is_some()
    }
}

impl CapturePipeline for TestPatternPipeline {
    fn set_output(&mut self, output: SharedOutput) {
        self.output = Some(output);
    }

    fn open_camera(&mut self) -> Result<(), CaptureError> {
        if !self.opened {
            info!("Opened test pattern camera");
            self.opened = true;
        }
        Ok(())
    }

    fn configure_video(&mut self, flags: ColourspaceFlags) -> Result<(), CaptureError> {
        if !self.opened {
            return Err(CaptureError::NotOpen);
        }

        let stream = StreamInfo {
            width: self.options.width,
            height: self.options.height,
            stride: self.options.width,
        };
        info!(
            "Configured video stream {} @ {}fps, transform {}, colourspace {:?}",
            stream, self.options.framerate, self.options.transform, flags
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn start_encoder(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_none() {
            return Err(CaptureError::NotConfigured);
        }
        self.encoder_running = true;
        debug!("Passthrough encoder started ({})", self.options.codec);
        Ok(())
    }

    fn start_camera(&mut self) -> Result<(), CaptureError> {
        let Some(stream) = self.stream else {
            return Err(CaptureError::NotConfigured);
        };
        if self.producer.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }

        let (frame_tx, frame_rx) = mpsc::channel(QUEUE_DEPTH);
        let producer = Producer {
            stream,
            transform: self.options.transform,
            interval: self.options.frame_interval(),
            frame_limit: self.frame_limit,
        };
        self.producer = Some(tokio::spawn(producer.run(frame_tx)));
        self.frame_rx = Some(frame_rx);
        debug!("Camera started");
        Ok(())
    }

    async fn wait(&mut self) -> Msg {
        let Some(frame_rx) = self.frame_rx.as_mut() else {
            // Nothing is producing, which looks the same as a stalled device.
            tokio::time::sleep(self.watchdog).await;
            return Msg::timeout();
        };

        match tokio::time::timeout(self.watchdog, frame_rx.recv()).await {
            Ok(Some(request)) => Msg::request_complete(request),
            Ok(None) => Msg::quit(),
            Err(_) => Msg::timeout(),
        }
    }

    fn stop_camera(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
            debug!("Camera stopped");
        }
        self.frame_rx = None;
    }

    fn stop_encoder(&mut self) {
        if self.encoder_running {
            self.encoder_running = false;
            debug!(
                "Encoder stopped after {} frames ({} held for sync)",
                self.frames_encoded, self.frames_held
            );
        }
    }

    fn encode_buffer(&mut self, request: &CompletedRequest) -> bool {
        if !self.encoder_running {
            warn!("Frame {} submitted with the encoder stopped", request.sequence());
            return false;
        }

        if self.sync_remaining > 0 {
            self.sync_remaining -= 1;
            self.frames_held += 1;
            trace!(
                "Holding frame {} for sync ({} remaining)",
                request.sequence(),
                self.sync_remaining
            );
            return false;
        }

        if let Some(output) = &self.output {
            let mut output = output.lock();
            output.output_ready(&request.buffer, request.timestamp_us(), true);
            output.metadata_ready(&request.metadata);
        }
        self.frames_encoded += 1;
        true
    }

    fn show_preview(&mut self, request: &CompletedRequest) -> Result<(), CaptureError> {
        if self.options.preview {
            trace!("Preview frame {}", request.sequence());
        }
        Ok(())
    }

    fn video_stream(&self) -> Option<StreamInfo> {
        self.stream
    }
}

impl Drop for TestPatternPipeline {
    fn drop(&mut self) {
        self.stop_camera();
    }
}

/// Background frame generator for one camera start
struct Producer {
    stream: StreamInfo,
    transform: Transform,
    interval: Duration,
    frame_limit: Option<u64>,
}

impl Producer {
    async fn run(self, frame_tx: mpsc::Sender<CompletedRequest>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let started = Instant::now();
        let frame_duration_us = self.interval.as_micros() as i64;
        let mut dropped = 0u64;

        for sequence in 0.. {
            if self.frame_limit.is_some_and(|limit| sequence >= limit) {
                break;
            }
            ticker.tick().await;

            let metadata = FrameMetadata {
                sequence,
                timestamp_us: started.elapsed().as_micros() as i64,
                frame_duration_us,
            };
            let request = CompletedRequest::new(self.render(sequence).freeze(), metadata);

            match frame_tx.try_send(request) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    dropped += 1;
                    trace!("Queue full, dropped frame {} (total {})", sequence, dropped);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
    }

    /// Diagonal luma ramp that scrolls one step per frame, neutral chroma
    fn render(&self, sequence: u64) -> BytesMut {
        let width = self.stream.width as usize;
        let height = self.stream.height as usize;
        let luma = width * height;
        let phase = (sequence * 4) as usize;

        let mut buffer = BytesMut::with_capacity(luma + luma / 2);
        for y in 0..height {
            for x in 0..width {
                let (sx, sy) = self.source_coords(x, y, width, height);
                buffer.put_u8(((2 * sx + sy + phase) & 0xff) as u8);
            }
        }
        buffer.resize(luma + luma / 2, 128);
        buffer
    }

    /// Map an output pixel back to pattern coordinates
    fn source_coords(&self, x: usize, y: usize, width: usize, height: usize) -> (usize, usize) {
        let x = if self.transform.hflip() { width - 1 - x } else { x };
        let y = if self.transform.vflip() { height - 1 - y } else { y };
        if self.transform.transpose() { (y, x) } else { (x, y) }
    }
}
