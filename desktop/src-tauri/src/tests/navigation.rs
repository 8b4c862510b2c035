use crate::window::{NavigationDecision, decide_navigation};

use googletest::prelude::*;
use tauri::Url;

fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

#[test]
fn given_backend_origin_when_navigating_then_allowed() {
    let backend = url("http://localhost:8502/");

    let decision = decide_navigation(&url("http://localhost:8502/?page=2"), Some(&backend));

    assert_that!(decision, eq(NavigationDecision::Allow));
}

#[test]
fn given_loopback_alias_of_backend_when_navigating_then_allowed() {
    let backend = url("http://localhost:8502/");

    let decision = decide_navigation(&url("http://127.0.0.1:8502/media/a.png"), Some(&backend));

    assert_that!(decision, eq(NavigationDecision::Allow));
}

#[test]
fn given_other_local_port_when_navigating_then_not_allowed_in_app() {
    let backend = url("http://localhost:8502/");

    let decision = decide_navigation(&url("http://localhost:9000/"), Some(&backend));

    assert_that!(decision, eq(NavigationDecision::OpenExternal));
}

#[test]
fn given_external_web_link_when_navigating_then_opened_externally() {
    let backend = url("http://localhost:8501/");

    assert_that!(
        decide_navigation(&url("https://docs.streamlit.io/"), Some(&backend)),
        eq(NavigationDecision::OpenExternal)
    );
    assert_that!(
        decide_navigation(&url("mailto:support@example.com"), Some(&backend)),
        eq(NavigationDecision::OpenExternal)
    );
}

#[test]
fn given_no_backend_yet_when_navigating_to_localhost_then_not_loaded_in_app() {
    let decision = decide_navigation(&url("http://localhost:8501/"), None);

    assert_that!(decision, eq(NavigationDecision::OpenExternal));
}

#[test]
fn given_placeholder_page_when_navigating_then_allowed() {
    assert_that!(
        decide_navigation(&url("data:text/html;base64,PGgxPg=="), None),
        eq(NavigationDecision::Allow)
    );
    assert_that!(
        decide_navigation(&url("about:blank"), None),
        eq(NavigationDecision::Allow)
    );
}

#[test]
fn given_unknown_scheme_when_navigating_then_blocked() {
    let backend = url("http://localhost:8501/");

    assert_that!(
        decide_navigation(&url("file:///etc/passwd"), Some(&backend)),
        eq(NavigationDecision::Block)
    );
    assert_that!(
        decide_navigation(&url("javascript:alert(1)"), Some(&backend)),
        eq(NavigationDecision::Block)
    );
}
