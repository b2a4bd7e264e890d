//! Camstream Core Library
//!
//! Camera capture event loop for headless streaming rigs.
//!
//! This library provides:
//! - TOML configuration with typed, range-checked accessors
//! - Mirror/rotation resolution into a single frame transform
//! - Operator control through process signals and stdin keys
//! - An event loop that drives a capture pipeline into an output sink
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │ Capture Pipeline│───▶│  Event Loop  │───▶│  Output Sink    │
//! │ (camera+encode) │    │ (budget/ctl) │    │ (stream, tally) │
//! └─────────────────┘    └──────────────┘    └─────────────────┘
//!                               ▲
//!                        ┌──────┴───────┐
//!                        │ Control      │
//!                        │ (signals/key)│
//!                        └──────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod control;
pub mod error;
pub mod event_loop;
pub mod output;
pub mod transform;
pub mod types;

pub use config::{Budget, RunOptions, Settings};
pub use error::{CamstreamError, ConfigError, Result, RunError};
pub use event_loop::{EventLoop, RunSummary, StopReason};
pub use transform::{Mirror, Transform};
