//! Raw stream output
//!
//! Writes encoded buffers to stdout, a file, or a TCP receiver, and drives
//! the tally file when the operator signals.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::{OutputSink, TallyFile};
use crate::config::RunOptions;
use crate::types::FrameMetadata;

/// Where encoded frames are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Drop every frame
    Discard,
    /// Write to standard output
    Stdout,
    /// Write to a file, truncating it first
    File(PathBuf),
    /// Connect to a TCP receiver (`host:port`)
    Tcp(String),
}

impl OutputTarget {
    /// Whether frames leave the process
    pub fn is_discard(&self) -> bool {
        matches!(self, Self::Discard)
    }
}

impl FromStr for OutputTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed {
            "" | "none" => Self::Discard,
            "-" => Self::Stdout,
            _ => match trimmed.strip_prefix("tcp://") {
                Some(addr) => Self::Tcp(addr.to_string()),
                None => Self::File(PathBuf::from(trimmed)),
            },
        })
    }
}

impl std::fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discard => write!(f, "none"),
            Self::Stdout => write!(f, "-"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Output sink writing raw frames to a byte stream
pub struct StreamOutput {
    target: OutputTarget,
    writer: Option<Box<dyn Write + Send>>,
    tally: TallyFile,
    frames_written: u64,
    bytes_written: u64,
    last_metadata: Option<FrameMetadata>,
}

impl StreamOutput {
    /// Open the target and reset the tally file
    pub fn open(target: OutputTarget, tally_path: impl Into<PathBuf>) -> io::Result<Self> {
        let writer: Option<Box<dyn Write + Send>> = match &target {
            OutputTarget::Discard => None,
            OutputTarget::Stdout => Some(Box::new(BufWriter::new(io::stdout()))),
            OutputTarget::File(path) => Some(Box::new(BufWriter::new(File::create(path)?))),
            OutputTarget::Tcp(addr) => {
                let stream = TcpStream::connect(addr)?;
                stream.set_nodelay(true)?;
                Some(Box::new(BufWriter::new(stream)))
            }
        };

        info!("Stream output opened: {}", target);

        Ok(Self {
            target,
            writer,
            tally: TallyFile::new(tally_path),
            frames_written: 0,
            bytes_written: 0,
            last_metadata: None,
        })
    }

    /// Open the output named by the run options
    pub fn from_options(options: &RunOptions) -> io::Result<Self> {
        let target = options
            .output
            .parse::<OutputTarget>()
            .unwrap_or(OutputTarget::Discard);
        Self::open(target, &options.neopixel_path)
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn last_metadata(&self) -> Option<&FrameMetadata> {
        self.last_metadata.as_ref()
    }

    pub fn is_on_air(&self) -> bool {
        self.tally.is_on_air()
    }

    fn write_frame(&mut self, buffer: &[u8]) -> io::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(buffer)?;
            writer.flush()?;
        }
        Ok(())
    }
}

impl OutputSink for StreamOutput {
    fn output_ready(&mut self, buffer: &[u8], timestamp_us: i64, keyframe: bool) {
        if self.writer.is_none() {
            return;
        }

        match self.write_frame(buffer) {
            Ok(()) => {
                self.frames_written += 1;
                self.bytes_written += buffer.len() as u64;
                if self.frames_written % 300 == 0 {
                    debug!(
                        "Wrote {} frames ({} bytes), last at {}us{}",
                        self.frames_written,
                        self.bytes_written,
                        timestamp_us,
                        if keyframe { " [key]" } else { "" }
                    );
                }
            }
            Err(e) => {
                warn!("Write to {} failed, closing output: {}", self.target, e);
                self.writer = None;
            }
        }
    }

    fn metadata_ready(&mut self, metadata: &FrameMetadata) {
        self.last_metadata = Some(*metadata);
    }

    fn signal(&mut self) {
        let on_air = self.tally.toggle();
        info!(
            "Stream {} ({} frames written)",
            if on_air { "on air" } else { "off air" },
            self.frames_written
        );
    }
}

impl Drop for StreamOutput {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                debug!("Final flush of {} failed: {}", self.target, e);
            }
        }
        info!(
            "Stream output closed: {} frames, {} bytes",
            self.frames_written, self.bytes_written
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parsing() {
        assert_eq!("none".parse::<OutputTarget>().unwrap(), OutputTarget::Discard);
        assert_eq!("".parse::<OutputTarget>().unwrap(), OutputTarget::Discard);
        assert_eq!("-".parse::<OutputTarget>().unwrap(), OutputTarget::Stdout);
        assert_eq!(
            "tcp://127.0.0.1:5000".parse::<OutputTarget>().unwrap(),
            OutputTarget::Tcp("127.0.0.1:5000".into())
        );
        assert_eq!(
            "/tmp/out.yuv".parse::<OutputTarget>().unwrap(),
            OutputTarget::File(PathBuf::from("/tmp/out.yuv"))
        );
    }

    #[test]
    fn test_target_display_round_trips() {
        for s in ["none", "-", "tcp://cam:5000", "capture.yuv"] {
            let target: OutputTarget = s.parse().unwrap();
            assert_eq!(target.to_string(), s);
        }
    }
}
