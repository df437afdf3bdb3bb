
/// Outcome of a scenario driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Success,
    Fail,
}

#[cfg(test)]
mod suite {
    use super::tests::*;
    use super::State;

    fn setup() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn passthrough_small() {
        setup();
        assert_eq!(try_passthrough_small(), State::Success);
    }

    #[test]
    fn retry_second_target() {
        setup();
        assert_eq!(try_retry(), State::Success);
    }

    #[test]
    fn retry_exhaustion() {
        setup();
        assert_eq!(try_retry_exhaustion(), State::Success);
    }

    #[test]
    fn no_route() {
        setup();
        assert_eq!(try_no_route(), State::Success);
    }

    #[test]
    fn length_required() {
        setup();
        assert_eq!(try_length_required(), State::Success);
    }

    #[test]
    fn request_error() {
        setup();
        assert_eq!(try_request_error(), State::Success);
    }

    #[test]
    fn grip_handoff() {
        setup();
        assert_eq!(try_grip_handoff(), State::Success);
    }

    #[test]
    fn grip_handoff_request_too_large() {
        setup();
        assert_eq!(try_handoff_request_too_large(), State::Success);
    }

    #[test]
    fn grip_response_too_large() {
        setup();
        assert_eq!(try_grip_response_too_large(), State::Success);
    }

    #[test]
    fn trusted_grip_passes_through() {
        setup();
        assert_eq!(try_trusted_grip_passes_through(), State::Success);
    }

    #[test]
    fn fan_in_mid_stream() {
        setup();
        assert_eq!(try_fan_in_mid_stream(), State::Success);
    }

    #[test]
    #[should_panic(expected = "addNotAllowed")]
    fn add_after_not_allowed_panics() {
        setup();
        try_add_after_not_allowed();
    }

    #[test]
    fn upstream_drop_mid_response() {
        setup();
        assert_eq!(try_upstream_drop_mid_response(), State::Success);
    }

    #[test]
    fn backpressure_sync_to_slowest() {
        setup();
        assert_eq!(try_backpressure(), State::Success);
    }

    #[test]
    fn streaming_request_body() {
        setup();
        assert_eq!(try_streaming_request_body(), State::Success);
    }

    #[test]
    fn retried_client_has_no_input() {
        setup();
        assert_eq!(try_retried_client_has_no_input(), State::Success);
    }

    #[test]
    fn xff_appended() {
        setup();
        assert_eq!(try_xff_appended(), State::Success);
    }

    #[test]
    fn cannot_accept() {
        setup();
        assert_eq!(try_cannot_accept(), State::Success);
    }

    #[test]
    fn client_error_keeps_entry_until_finished() {
        setup();
        assert_eq!(try_client_error_keeps_entry(), State::Success);
    }
}
