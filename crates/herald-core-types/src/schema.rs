//! Canonical schema constants for structured logging and events
//!
//! These constants keep dispatch, policy and engine logs consistent.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_INVOCATION_ID: &str = "invocation_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Invocation fields
pub const FIELD_COMMAND: &str = "command";
pub const FIELD_SOURCE: &str = "source";
pub const FIELD_BUCKET: &str = "bucket";
pub const FIELD_HINT: &str = "hint";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
pub const EVENT_VETO: &str = "veto";
pub const EVENT_FAULT_SUPPRESSED: &str = "fault_suppressed";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_distinct() {
        let events = [
            EVENT_START,
            EVENT_END,
            EVENT_END_ERROR,
            EVENT_VETO,
            EVENT_FAULT_SUPPRESSED,
        ];
        for (i, a) in events.iter().enumerate() {
            for b in &events[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
