#![allow(clippy::unwrap_used, clippy::expect_used)]

use herald_core::errors::HeraldError;
use herald_core::logging_facility::init_test_capture;
use herald_core::{log_op_end, log_op_error, log_op_start};
use herald_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name, command = "echo");

    let starts: Vec<_> = capture
        .events_named(EVENT_START)
        .into_iter()
        .filter(|e| e.op.as_deref() == Some(op_name))
        .collect();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].field("command"), Some("echo"));
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let end_events: Vec<_> = capture
        .events_named(EVENT_END)
        .into_iter()
        .filter(|e| e.op.as_deref() == Some(op_name))
        .collect();
    assert_eq!(end_events.len(), 1, "Should have exactly one end event");
    assert_eq!(end_events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = HeraldError::CommandNotFound {
        name: "echo".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let error_events: Vec<_> = capture
        .events_named(EVENT_END_ERROR)
        .into_iter()
        .filter(|e| e.op.as_deref() == Some(op_name))
        .collect();
    assert_eq!(error_events.len(), 1, "Should have exactly one error event");
    assert_eq!(error_events[0].field("err.code"), Some("ERR_NOT_FOUND"));
}

#[test]
fn test_boundary_ownership_single_start_end() {
    let capture = init_test_capture();
    let op_name = "test_boundary_ownership_unique_4";

    log_op_start!(op_name, command = "roll");
    log_op_end!(op_name, duration_ms = 3);

    let count = capture.count_events(|e| e.op.as_deref() == Some(op_name));
    assert_eq!(count, 2);
    capture.assert_event_exists(op_name, EVENT_START);
    capture.assert_event_exists(op_name, EVENT_END);
}
