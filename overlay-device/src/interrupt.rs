use std::time::Duration;

use overlay_oracle::is_complete_json_object;

/// Decides whether an in-flight stream should be cut short because new
/// packets arrived mid-completion (spec §4.4 step (e)). Extracted as a pure
/// function so the three-way precondition (new input, cool-time elapsed, no
/// half-written tool call) can be tested without driving a real stream.
pub(crate) fn should_interrupt(
    has_new_input: bool,
    elapsed_since_start: Duration,
    cool_time: Duration,
    in_flight_args: Option<&str>,
) -> bool {
    if !has_new_input || elapsed_since_start <= cool_time {
        return false;
    }
    match in_flight_args {
        None => true,
        Some(buf) => is_complete_json_object(buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_interrupt_without_new_input() {
        assert!(!should_interrupt(false, Duration::from_secs(5), Duration::from_millis(200), None));
    }

    #[test]
    fn does_not_interrupt_before_cool_time_elapses() {
        assert!(!should_interrupt(true, Duration::from_millis(50), Duration::from_millis(200), None));
    }

    #[test]
    fn interrupts_when_no_call_is_in_flight() {
        assert!(should_interrupt(true, Duration::from_secs(1), Duration::from_millis(200), None));
    }

    #[test]
    fn waits_out_a_half_written_call() {
        assert!(!should_interrupt(true, Duration::from_secs(1), Duration::from_millis(200), Some(r#"{"target":"al"#)));
    }

    #[test]
    fn interrupts_once_the_in_flight_call_completes() {
        assert!(should_interrupt(true, Duration::from_secs(1), Duration::from_millis(200), Some(r#"{"target":"alice"}"#)));
    }
}
