use news_ingest::config::{IngestConfig, MIN_INTERVAL_SECS, MIN_SLEEP_SECS};
use news_ingest::poller::next_cycle_delay;
use std::time::Duration;

#[test]
fn delay_is_remaining_interval() {
    let interval = Duration::from_secs(900);
    assert_eq!(
        next_cycle_delay(Duration::from_secs(100), interval),
        Duration::from_secs(800)
    );
}

#[test]
fn delay_never_drops_below_floor() {
    let floor = Duration::from_secs(MIN_SLEEP_SECS);
    let interval = Duration::from_secs(60);
    for elapsed in [58, 60, 61, 3_600] {
        assert!(next_cycle_delay(Duration::from_secs(elapsed), interval) >= floor);
    }
    assert_eq!(next_cycle_delay(Duration::from_secs(3_600), interval), floor);
}

#[test]
fn configured_interval_is_clamped() {
    let config = IngestConfig {
        interval_secs: 0,
        ..IngestConfig::default()
    };
    assert_eq!(config.poll_interval(), Duration::from_secs(MIN_INTERVAL_SECS));
}
