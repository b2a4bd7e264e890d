//! Capture pipeline boundary
//!
//! The event loop drives a camera and encoder through [`CapturePipeline`]
//! and consumes the messages it emits. Implementations run their own capture
//! threads and deliver completed frames through a FIFO queue; `wait` is the
//! only call that suspends.

mod test_pattern;

pub use test_pattern::TestPatternPipeline;

use std::future::Future;

use crate::error::CaptureError;
use crate::output::SharedOutput;
use crate::types::{CompletedRequest, StreamInfo};

/// Kind of message emitted by a capture pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    /// A frame has been captured
    RequestComplete,
    /// No frame arrived within the device watchdog period
    Timeout,
    /// The pipeline has shut itself down
    Quit,
}

/// Message emitted by a capture pipeline
///
/// Only `RequestComplete` carries a payload. Any other combination is a
/// contract violation by the pipeline.
#[derive(Debug)]
pub struct Msg {
    pub kind: MsgType,
    pub payload: Option<CompletedRequest>,
}

impl Msg {
    pub fn request_complete(request: CompletedRequest) -> Self {
        Self {
            kind: MsgType::RequestComplete,
            payload: Some(request),
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: MsgType::Timeout,
            payload: None,
        }
    }

    pub fn quit() -> Self {
        Self {
            kind: MsgType::Quit,
            payload: None,
        }
    }
}

/// Encoder colourspace selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColourspaceFlags {
    /// Let the encoder choose
    #[default]
    None,
    /// Full-range JPEG colourspace, used for raw and MJPEG output
    JpegColourspace,
}

impl ColourspaceFlags {
    /// Flags appropriate for an output codec
    pub fn for_codec(codec: &str) -> Self {
        match codec.to_lowercase().as_str() {
            "mjpeg" | "yuv420" => Self::JpegColourspace,
            _ => Self::None,
        }
    }
}

/// Camera plus encoder, as seen by the event loop
///
/// Lifecycle: `open_camera`, `configure_video`, `start_encoder`,
/// `start_camera`, then any number of `wait` calls, then `stop_camera`
/// followed by `stop_encoder`. Stopping must be safe to repeat.
pub trait CapturePipeline {
    /// Route encoded frames and metadata to an output sink
    fn set_output(&mut self, output: SharedOutput);

    fn open_camera(&mut self) -> Result<(), CaptureError>;

    fn configure_video(&mut self, flags: ColourspaceFlags) -> Result<(), CaptureError>;

    fn start_encoder(&mut self) -> Result<(), CaptureError>;

    fn start_camera(&mut self) -> Result<(), CaptureError>;

    /// Wait for the next message
    fn wait(&mut self) -> impl Future<Output = Msg> + Send;

    fn stop_camera(&mut self);

    fn stop_encoder(&mut self);

    /// Hand a frame to the encoder
    ///
    /// Returns `false` when the frame was not committed for output, for
    /// example while waiting for a synchronised start.
    fn encode_buffer(&mut self, request: &CompletedRequest) -> bool;

    /// Show a frame on the local preview, if any
    fn show_preview(&mut self, request: &CompletedRequest) -> Result<(), CaptureError>;

    /// Geometry of the configured stream
    fn video_stream(&self) -> Option<StreamInfo>;
}
