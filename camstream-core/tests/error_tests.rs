//! Integration tests for error handling

use camstream_core::error::{CamstreamError, CaptureError, ConfigError, ResultExt, RunError};

#[test]
fn test_error_context_chaining() {
    let base_error: CamstreamError = RunError::UnrecognisedMessage("Quit with payload".into()).into();
    let with_context = base_error.with_context("Capture failed");

    let msg = format!("{}", with_context);
    assert!(msg.contains("Capture failed"));
    assert!(msg.contains("Quit with payload"));
}

#[test]
fn test_error_context_preserves_hint() {
    let base_error: CamstreamError = ConfigError::IllegalRotation(45).into();
    let hint_before = base_error.user_hint();

    let with_context = base_error.with_context("Loading configuration");
    let hint_after = with_context.user_hint();

    assert!(hint_before.is_some());
    assert_eq!(hint_before, hint_after);
}

#[test]
fn test_result_ext_context() {
    let result: Result<(), ConfigError> = Err(ConfigError::IllegalRotation(10));
    let err = result.context("Resolving transform").unwrap_err();

    assert!(err.to_string().contains("Resolving transform"));
    assert!(err.is_startup());
}

#[test]
fn test_startup_and_run_errors_are_distinct() {
    let startup: CamstreamError = ConfigError::InvalidValue {
        key: "width".into(),
        reason: "0 is not a positive integer".into(),
    }
    .into();
    let run: CamstreamError = RunError::from(CaptureError::NotOpen).into();

    assert!(startup.is_startup());
    assert!(!run.is_startup());
    assert!(matches!(run, CamstreamError::Run(RunError::Capture(CaptureError::NotOpen))));
}

#[test]
fn test_user_hints() {
    let missing: CamstreamError = ConfigError::Io {
        path: "/etc/camstream.toml".into(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    }
    .into();
    assert!(missing.user_hint().unwrap().contains("config sample"));

    let device: CamstreamError = RunError::Capture(CaptureError::Device("busy".into())).into();
    assert!(device.user_hint().is_some());

    let malformed: CamstreamError = RunError::UnrecognisedMessage("?".into()).into();
    assert!(malformed.user_hint().is_none());
}

#[test]
fn test_invalid_value_helper() {
    let err = CamstreamError::invalid_value("framerate", "must be at most 120");
    assert!(err.is_startup());
    assert!(err.to_string().contains("framerate"));
}
