//! Core types for camstream
//!
//! Frame handles and metadata passed between the capture pipeline, the
//! event loop and the output sink.

use bytes::Bytes;

/// Per-frame metadata forwarded to the output sink alongside encoded data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMetadata {
    /// Capture sequence number (monotonic per camera start)
    pub sequence: u64,
    /// Sensor timestamp in microseconds
    pub timestamp_us: i64,
    /// Nominal frame duration in microseconds
    pub frame_duration_us: i64,
}

/// A completed capture request holding one frame
///
/// The buffer is reference counted, so forwarding it to an output sink does
/// not copy the pixels. Dropping the request hands the slot back to the
/// pipeline.
#[derive(Debug, Clone)]
pub struct CompletedRequest {
    /// Frame data in the configured stream format
    pub buffer: Bytes,
    /// Metadata captured with the frame
    pub metadata: FrameMetadata,
}

impl CompletedRequest {
    pub fn new(buffer: impl Into<Bytes>, metadata: FrameMetadata) -> Self {
        Self {
            buffer: buffer.into(),
            metadata,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.metadata.sequence
    }

    pub fn timestamp_us(&self) -> i64 {
        self.metadata.timestamp_us
    }
}

/// Geometry of the configured video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes per luma row
    pub stride: u32,
}

impl std::fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} (stride {})", self.width, self.height, self.stride)
    }
}
