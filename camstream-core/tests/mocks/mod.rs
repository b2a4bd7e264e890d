//! Mock infrastructure for testing
//!
//! Provides a scripted capture pipeline, a recording output sink and a
//! scripted key source.

#![allow(dead_code)]

use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use camstream_core::capture::{CapturePipeline, ColourspaceFlags, Msg, MsgType};
use camstream_core::config::{Budget, RunOptions};
use camstream_core::control::{ControlMonitor, KeyPoll, KeySource, SignalSlot};
use camstream_core::error::CaptureError;
use camstream_core::output::{OutputSink, SharedOutput};
use camstream_core::types::{CompletedRequest, FrameMetadata, StreamInfo};

/// Nominal frame duration of mock frames
pub const FRAME_DURATION_US: i64 = 40_000;

/// Create a small frame with a recognisable fill
pub fn test_frame(sequence: u64) -> CompletedRequest {
    CompletedRequest::new(
        vec![sequence as u8; 16],
        FrameMetadata {
            sequence,
            timestamp_us: sequence as i64 * FRAME_DURATION_US,
            frame_duration_us: FRAME_DURATION_US,
        },
    )
}

/// One scripted action of the mock pipeline
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Deliver the next frame
    Frame,
    /// Report a device timeout
    Timeout,
    /// Report that the pipeline shut down
    Quit,
    /// Deliver a message whose kind and payload disagree
    Malformed,
    /// Store a signal in the monitor's slot, then carry on
    Raise(libc::c_int),
    /// Let time pass, then carry on
    Advance(Duration),
}

/// Lifecycle call made on the mock pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    SetOutput,
    Open,
    Configure(ColourspaceFlags),
    StartEncoder,
    StartCamera,
    StopCamera,
    StopEncoder,
    Encode(u64),
    Preview(u64),
}

/// Capture pipeline that plays back a script
///
/// Once the script runs out it reports `Quit`.
pub struct MockPipeline {
    script: VecDeque<Step>,
    slot: SignalSlot,
    next_sequence: u64,
    uncommitted: HashSet<u64>,
    fail_open: bool,
    fail_restart: bool,
    fail_preview: bool,
    camera_starts: u32,
    output: Option<SharedOutput>,
    calls: Vec<Call>,
}

impl MockPipeline {
    pub fn new(script: impl IntoIterator<Item = Step>, slot: SignalSlot) -> Self {
        Self {
            script: script.into_iter().collect(),
            slot,
            next_sequence: 0,
            uncommitted: HashSet::new(),
            fail_open: false,
            fail_restart: false,
            fail_preview: false,
            camera_starts: 0,
            output: None,
            calls: Vec::new(),
        }
    }

    /// Report these frame sequences as not committed by the encoder
    pub fn with_uncommitted(mut self, sequences: impl IntoIterator<Item = u64>) -> Self {
        self.uncommitted.extend(sequences);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Fail every camera start after the first
    pub fn failing_restart(mut self) -> Self {
        self.fail_restart = true;
        self
    }

    pub fn failing_preview(mut self) -> Self {
        self.fail_preview = true;
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|&&c| c == call).count()
    }

    pub fn encoded(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Encode(seq) => Some(*seq),
                _ => None,
            })
            .collect()
    }

    /// The last `n` calls
    pub fn tail(&self, n: usize) -> &[Call] {
        &self.calls[self.calls.len().saturating_sub(n)..]
    }
}

impl CapturePipeline for MockPipeline {
    fn set_output(&mut self, output: SharedOutput) {
        self.calls.push(Call::SetOutput);
        self.output = Some(output);
    }

    fn open_camera(&mut self) -> Result<(), CaptureError> {
        self.calls.push(Call::Open);
        if self.fail_open {
            return Err(CaptureError::Device("no camera".into()));
        }
        Ok(())
    }

    fn configure_video(&mut self, flags: ColourspaceFlags) -> Result<(), CaptureError> {
        self.calls.push(Call::Configure(flags));
        Ok(())
    }

    fn start_encoder(&mut self) -> Result<(), CaptureError> {
        self.calls.push(Call::StartEncoder);
        Ok(())
    }

    fn start_camera(&mut self) -> Result<(), CaptureError> {
        self.calls.push(Call::StartCamera);
        self.camera_starts += 1;
        if self.fail_restart && self.camera_starts > 1 {
            return Err(CaptureError::Device("restart failed".into()));
        }
        Ok(())
    }

    async fn wait(&mut self) -> Msg {
        loop {
            match self.script.pop_front() {
                None | Some(Step::Quit) => return Msg::quit(),
                Some(Step::Timeout) => return Msg::timeout(),
                Some(Step::Frame) => {
                    let request = test_frame(self.next_sequence);
                    self.next_sequence += 1;
                    return Msg::request_complete(request);
                }
                Some(Step::Malformed) => {
                    return Msg {
                        kind: MsgType::RequestComplete,
                        payload: None,
                    };
                }
                Some(Step::Raise(signum)) => self.slot.raise(signum),
                Some(Step::Advance(duration)) => tokio::time::sleep(duration).await,
            }
        }
    }

    fn stop_camera(&mut self) {
        self.calls.push(Call::StopCamera);
    }

    fn stop_encoder(&mut self) {
        self.calls.push(Call::StopEncoder);
    }

    fn encode_buffer(&mut self, request: &CompletedRequest) -> bool {
        self.calls.push(Call::Encode(request.sequence()));
        if self.uncommitted.contains(&request.sequence()) {
            return false;
        }
        if let Some(output) = &self.output {
            let mut output = output.lock();
            output.output_ready(&request.buffer, request.timestamp_us(), true);
            output.metadata_ready(&request.metadata);
        }
        true
    }

    fn show_preview(&mut self, request: &CompletedRequest) -> Result<(), CaptureError> {
        self.calls.push(Call::Preview(request.sequence()));
        if self.fail_preview {
            return Err(CaptureError::Device("no display".into()));
        }
        Ok(())
    }

    fn video_stream(&self) -> Option<StreamInfo> {
        Some(StreamInfo {
            width: 4,
            height: 4,
            stride: 4,
        })
    }
}

/// Everything a [`RecordingSink`] has been given
#[derive(Debug, Default)]
pub struct SinkLog {
    pub buffers: Vec<Vec<u8>>,
    pub timestamps: Vec<i64>,
    pub metadata: Vec<FrameMetadata>,
    pub signals: u32,
}

/// Output sink that records every call
#[derive(Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
}

impl RecordingSink {
    pub fn log(&self) -> MutexGuard<'_, SinkLog> {
        self.log.lock()
    }
}

impl OutputSink for RecordingSink {
    fn output_ready(&mut self, buffer: &[u8], timestamp_us: i64, _keyframe: bool) {
        let mut log = self.log.lock();
        log.buffers.push(buffer.to_vec());
        log.timestamps.push(timestamp_us);
    }

    fn metadata_ready(&mut self, metadata: &FrameMetadata) {
        self.log.lock().metadata.push(*metadata);
    }

    fn signal(&mut self) {
        self.log.lock().signals += 1;
    }
}

/// Key source that plays back a fixed list of polls, then reports nothing
pub struct ScriptedKeys(pub VecDeque<KeyPoll>);

impl ScriptedKeys {
    pub fn lines(lines: &[&str]) -> Self {
        Self(lines.iter().map(|l| KeyPoll::Line(l.to_string())).collect())
    }
}

impl KeySource for ScriptedKeys {
    fn poll_line(&mut self) -> KeyPoll {
        self.0.pop_front().unwrap_or(KeyPoll::Nothing)
    }
}

/// Monitor with a private signal slot and scripted keys
pub fn monitor(keypress: bool, signal: bool, keys: ScriptedKeys) -> (ControlMonitor, SignalSlot) {
    let slot = SignalSlot::detached();
    (ControlMonitor::new(keypress, signal, Box::new(keys), slot), slot)
}

/// Default options with a termination budget
pub fn options(budget: Budget) -> RunOptions {
    RunOptions::default().with_budget(budget)
}

pub fn frame_budget(frames: u64) -> Budget {
    Budget::new(None, Some(frames))
}

pub fn time_budget(ms: u64) -> Budget {
    Budget::new(Some(Duration::from_millis(ms)), None)
}
