use crate::backend::LifecycleState;
use crate::commands::build_shell_status;

use googletest::prelude::*;
use tauri::Url;

#[test]
fn given_ready_state_with_url_when_build_status_then_reports_port_and_ready() {
    let url = Url::parse("http://localhost:8502/").unwrap();

    let status = build_shell_status(LifecycleState::Ready, Some(&url));

    assert_that!(status.state, eq("ready"));
    assert_that!(status.port, some(eq(8502)));
    assert_that!(status.backend_url, some(eq("http://localhost:8502/")));
    assert_that!(status.is_ready, eq(true));
    assert_that!(status.version, eq(env!("CARGO_PKG_VERSION")));
}

#[test]
fn given_idle_state_without_url_when_build_status_then_empty_and_not_ready() {
    let status = build_shell_status(LifecycleState::Idle, None);

    assert_that!(status.state, eq("idle"));
    assert_that!(status.port, none());
    assert_that!(status.backend_url, none());
    assert_that!(status.is_ready, eq(false));
}

#[test]
fn given_waiting_state_with_url_when_build_status_then_not_ready() {
    let url = Url::parse("http://localhost:8501/").unwrap();

    let status = build_shell_status(LifecycleState::WaitingReady, Some(&url));

    assert_that!(status.state, eq("waiting_ready"));
    assert_that!(status.port, some(eq(8501)));
    assert_that!(status.is_ready, eq(false));
}

#[test]
fn given_status_when_serialized_then_uses_snake_case_fields() {
    let status = build_shell_status(LifecycleState::Restarting, None);

    let json = serde_json::to_value(&status).unwrap();

    assert_that!(json["state"].as_str(), some(eq("restarting")));
    assert_that!(json.get("is_ready"), some(anything()));
    assert_that!(json.get("backend_url"), some(anything()));
}
