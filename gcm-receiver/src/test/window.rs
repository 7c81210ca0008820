use std::time::{Duration, UNIX_EPOCH};

use crate::{
    error::ConfigError,
    window::{compute_window, Clock, FixedClock},
};

#[test]
fn window_length_and_anchor() {
    let clock = FixedClock::from_unix_seconds(1_700_000_000);
    let interval = Duration::from_secs(60);

    for delay in [0, 1, 240, 3600] {
        let delay = Duration::from_secs(delay);
        let window = compute_window(clock.now(), interval, delay).unwrap();

        assert_eq!(window.end.duration_since(window.start).unwrap(), interval);
        assert_eq!(window.start, clock.now() - delay);
    }
}

#[test]
fn window_renders_whole_seconds() {
    let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_750);
    let window = compute_window(now, Duration::from_secs(60), Duration::from_secs(240)).unwrap();

    assert_eq!(window.start_rfc3339(), "2023-11-14T22:09:20Z");
    assert_eq!(window.end_rfc3339(), "2023-11-14T22:10:20Z");
}

#[test]
fn delay_before_epoch_saturates() {
    let clock = FixedClock::from_unix_seconds(10);
    let window = compute_window(clock.now(), Duration::from_secs(60), Duration::from_secs(20)).unwrap();

    assert_eq!(window.start, UNIX_EPOCH);
    assert_eq!(window.end, UNIX_EPOCH + Duration::from_secs(60));
}

#[test]
fn unrepresentable_window_is_an_error() {
    let clock = FixedClock::from_unix_seconds(1_700_000_000);

    assert!(matches!(
        compute_window(clock.now(), Duration::MAX, Duration::ZERO),
        Err(ConfigError::WindowOutOfRange { interval }) if interval == Duration::MAX
    ));
}
