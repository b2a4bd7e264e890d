//! Capture event loop
//!
//! Drives a [`CapturePipeline`] from initialisation to shutdown:
//!
//! ```text
//! Initializing ──▶ Running ──▶ Draining ──▶ Terminated
//!                   │    ▲
//!                   ▼    │
//!                  Stalled
//! ```
//!
//! Each iteration awaits exactly one pipeline message. Device timeouts
//! restart capture, completed frames are checked against the run budget and
//! the operator controls, then handed to the encoder. Draining always stops
//! capture before the encoder.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::capture::{CapturePipeline, ColourspaceFlags, Msg, MsgType};
use crate::config::{Budget, RunOptions};
use crate::control::{ControlMonitor, ControlSignal};
use crate::error::RunError;
use crate::output::SharedOutput;
use crate::types::CompletedRequest;

/// Event loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Opening and starting the pipeline
    Initializing,
    /// Frames are flowing
    Running,
    /// The device timed out and capture is being restarted
    Stalled,
    /// Stopping capture and encoder
    Draining,
    /// Capture and encoder stopped
    Terminated,
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Wall-clock budget exceeded
    Timeout,
    /// Frame budget reached
    FrameBudget,
    /// Operator asked to quit
    Operator,
    /// The pipeline shut itself down
    PipelineQuit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout reached"),
            Self::FrameBudget => write!(f, "frame budget reached"),
            Self::Operator => write!(f, "stopped by operator"),
            Self::PipelineQuit => write!(f, "pipeline quit"),
        }
    }
}

/// A pipeline message after shape validation
#[derive(Debug)]
pub enum FrameEvent {
    Timeout,
    Quit,
    FrameReady(CompletedRequest),
}

impl FrameEvent {
    /// Validate that a message's kind and payload agree
    pub fn classify(msg: Msg) -> Result<Self, RunError> {
        match (msg.kind, msg.payload) {
            (MsgType::RequestComplete, Some(request)) => Ok(Self::FrameReady(request)),
            (MsgType::Timeout, None) => Ok(Self::Timeout),
            (MsgType::Quit, None) => Ok(Self::Quit),
            (kind, payload) => Err(RunError::UnrecognisedMessage(format!(
                "{:?} {} payload",
                kind,
                if payload.is_some() { "with" } else { "without" }
            ))),
        }
    }
}

/// Elapsed time and committed frames since the last reset
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    baseline: Instant,
    frames: u64,
}

impl RunClock {
    pub fn start(now: Instant) -> Self {
        Self {
            baseline: now,
            frames: 0,
        }
    }

    /// Restart both the time baseline and the frame counter
    pub fn reset(&mut self, now: Instant) {
        self.baseline = now;
        self.frames = 0;
    }

    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.baseline)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Decide whether the run should stop before encoding the current frame
///
/// A frame budget takes precedence: while one is set the wall-clock
/// timeout is never consulted.
pub fn check_termination(
    budget: &Budget,
    clock: &RunClock,
    now: Instant,
    signal: ControlSignal,
) -> Option<StopReason> {
    if budget.frames.is_none() {
        if let Some(timeout) = budget.timeout {
            if clock.elapsed(now) > timeout {
                return Some(StopReason::Timeout);
            }
        }
    }
    if let Some(frames) = budget.frames {
        if clock.frames() >= frames {
            return Some(StopReason::FrameBudget);
        }
    }
    if signal == ControlSignal::Quit {
        return Some(StopReason::Operator);
    }
    None
}

/// Outcome of handling one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop(StopReason),
}

/// Result of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    /// Committed frames since the last clock reset
    pub frames_since_reset: u64,
    /// Frames delivered by the pipeline
    pub frames_seen: u64,
    /// Frames the encoder committed for output
    pub frames_committed: u64,
    /// Capture restarts after device timeouts
    pub restarts: u64,
    /// Operator commit signals forwarded to the output
    pub commits: u64,
    /// Time from capture start to shutdown
    pub elapsed: Duration,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} after {:.1}s: {} frames seen, {} committed ({} since reset), {} restarts, {} commits",
            self.reason,
            self.elapsed.as_secs_f64(),
            self.frames_seen,
            self.frames_committed,
            self.frames_since_reset,
            self.restarts,
            self.commits
        )
    }
}

/// Event loop over a capture pipeline
pub struct EventLoop<P: CapturePipeline> {
    pipeline: P,
    output: SharedOutput,
    options: RunOptions,
    monitor: ControlMonitor,
    state: LoopState,
    clock: RunClock,
    started: Instant,
    frames_seen: u64,
    frames_committed: u64,
    restarts: u64,
    commits: u64,
}

impl<P: CapturePipeline> EventLoop<P> {
    pub fn new(
        pipeline: P,
        output: SharedOutput,
        options: RunOptions,
        monitor: ControlMonitor,
    ) -> Self {
        let now = Instant::now();
        Self {
            pipeline,
            output,
            options,
            monitor,
            state: LoopState::Initializing,
            clock: RunClock::start(now),
            started: now,
            frames_seen: 0,
            frames_committed: 0,
            restarts: 0,
            commits: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.pipeline
    }

    pub fn clock(&self) -> &RunClock {
        &self.clock
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run until a termination condition fires
    ///
    /// Capture and encoder are stopped before returning, including when the
    /// run fails.
    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        if let Err(e) = self.initialize() {
            error!("Failed to start capture pipeline: {}", e);
            self.drain();
            return Err(e);
        }

        info!("Capture running (budget: {})", self.options.budget);

        let result = loop {
            let msg = self.pipeline.wait().await;
            match self.handle(msg) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop(reason)) => break Ok(reason),
                Err(e) => break Err(e),
            }
        };

        self.drain();

        let reason = result?;
        let summary = self.summary(reason);
        info!("Capture finished: {}", summary);
        Ok(summary)
    }

    fn initialize(&mut self) -> Result<(), RunError> {
        self.state = LoopState::Initializing;
        self.pipeline.set_output(self.output.clone());
        self.pipeline.open_camera()?;
        self.pipeline
            .configure_video(ColourspaceFlags::for_codec(&self.options.codec))?;
        self.pipeline.start_encoder()?;
        self.pipeline.start_camera()?;

        if let Some(stream) = self.pipeline.video_stream() {
            debug!("Video stream {}", stream);
        }

        let now = Instant::now();
        self.started = now;
        self.clock.reset(now);
        self.state = LoopState::Running;
        Ok(())
    }

    /// Handle one pipeline message
    pub fn handle(&mut self, msg: Msg) -> Result<Flow, RunError> {
        match FrameEvent::classify(msg)? {
            FrameEvent::Timeout => {
                self.recover_stall();
                Ok(Flow::Continue)
            }
            FrameEvent::Quit => {
                info!("Capture pipeline quit");
                Ok(Flow::Stop(StopReason::PipelineQuit))
            }
            FrameEvent::FrameReady(request) => Ok(self.process_frame(request)),
        }
    }

    fn recover_stall(&mut self) {
        self.state = LoopState::Stalled;
        error!("Device timeout detected, attempting a restart");
        self.pipeline.stop_camera();
        match self.pipeline.start_camera() {
            Ok(()) => {
                self.restarts += 1;
                self.state = LoopState::Running;
            }
            Err(e) => error!("Camera restart failed: {}", e),
        }
    }

    fn process_frame(&mut self, request: CompletedRequest) -> Flow {
        self.state = LoopState::Running;
        self.frames_seen += 1;

        let signal = self.monitor.poll();
        if signal == ControlSignal::Commit {
            self.commits += 1;
            self.output.lock().signal();
        }

        let now = Instant::now();
        if let Some(reason) = check_termination(&self.options.budget, &self.clock, now, signal) {
            info!(
                "Stopping: {} ({} frames, {:?} since reset)",
                reason,
                self.clock.frames(),
                self.clock.elapsed(now)
            );
            return Flow::Stop(reason);
        }

        trace!("Frame {} ({} since reset)", request.sequence(), self.clock.frames());

        if self.pipeline.encode_buffer(&request) {
            self.frames_committed += 1;
            self.clock.record_frame();
        } else {
            self.clock.reset(now);
        }

        if let Err(e) = self.pipeline.show_preview(&request) {
            warn!("Preview failed for frame {}: {}", request.sequence(), e);
        }

        Flow::Continue
    }

    fn drain(&mut self) {
        self.state = LoopState::Draining;
        self.pipeline.stop_camera();
        self.pipeline.stop_encoder();
        self.state = LoopState::Terminated;
        debug!("Capture and encoder stopped");
    }

    fn summary(&self, reason: StopReason) -> RunSummary {
        RunSummary {
            reason,
            frames_since_reset: self.clock.frames(),
            frames_seen: self.frames_seen,
            frames_committed: self.frames_committed,
            restarts: self.restarts,
            commits: self.commits,
            elapsed: Instant::now().saturating_duration_since(self.started),
        }
    }
}
