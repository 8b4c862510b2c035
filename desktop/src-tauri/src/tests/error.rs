use crate::backend::BackendError;

use std::io;

use error_location::ErrorLocation;
use googletest::prelude::*;

fn launch_failed(kind: io::ErrorKind) -> BackendError {
    BackendError::LaunchFailed {
        command: "python3 -m streamlit run main.py".into(),
        source: io::Error::from(kind),
        location: ErrorLocation::from(std::panic::Location::caller()),
    }
}

#[test]
fn given_missing_interpreter_when_recovery_hint_then_mentions_python() {
    let error = launch_failed(io::ErrorKind::NotFound);

    assert_that!(
        error.recovery_hint(),
        contains_substring("Python interpreter could not be found")
    );
}

#[test]
fn given_permission_denied_when_recovery_hint_then_mentions_permissions() {
    let error = launch_failed(io::ErrorKind::PermissionDenied);

    assert_that!(error.recovery_hint(), contains_substring("permissions"));
}

#[test]
fn given_launch_failure_when_dialog_message_then_error_then_blank_line_then_hint() {
    let error = launch_failed(io::ErrorKind::NotFound);

    let message = error.dialog_message();

    assert_that!(
        message,
        starts_with("Failed to launch backend `python3 -m streamlit run main.py`")
    );
    assert_that!(
        message,
        contains_substring(format!("\n\n{}", error.recovery_hint()))
    );
}

#[test]
fn given_restart_cap_reached_when_displayed_then_reports_crash_count() {
    let error = BackendError::MaxRestartsExceeded {
        count: 4,
        location: ErrorLocation::from(std::panic::Location::caller()),
    };

    assert_that!(error.to_string(), contains_substring("crashed 4 times"));
}

#[test]
fn given_io_error_when_converted_then_io_variant() {
    let error: BackendError = io::Error::other("disk full").into();

    assert_that!(matches!(error, BackendError::Io { .. }), eq(true));
    assert_that!(error.recovery_hint(), contains_substring("check the logs"));
}
