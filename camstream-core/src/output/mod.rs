//! Output sinks
//!
//! The encode stage hands finished buffers and metadata to an
//! [`OutputSink`]; the event loop uses the same sink for the operator
//! `signal` action. All calls are fire-and-forget: a sink logs its own
//! failures and never stops the run.
//!
//! Supported targets:
//! - Raw stream to stdout, a file, or a TCP receiver
//! - Discard (tally signalling only)

mod stream;
mod tally;

pub use stream::{OutputTarget, StreamOutput};
pub use tally::TallyFile;

use parking_lot::Mutex;
use std::sync::Arc;

use crate::types::FrameMetadata;

/// Receiver of encoded frames
pub trait OutputSink: Send {
    /// An encoded buffer is ready
    fn output_ready(&mut self, buffer: &[u8], timestamp_us: i64, keyframe: bool);

    /// Metadata for the most recent frame is ready
    fn metadata_ready(&mut self, metadata: &FrameMetadata);

    /// The operator asked for the stream to be signalled
    fn signal(&mut self);
}

/// Output sink shared by the encode stage and the event loop
pub type SharedOutput = Arc<Mutex<Box<dyn OutputSink>>>;

/// Wrap a sink for sharing
pub fn shared(sink: impl OutputSink + 'static) -> SharedOutput {
    Arc::new(Mutex::new(Box::new(sink)))
}
