use std::{thread, time::Duration};

use portal_scene::flow::Clock;

#[test]
fn should_never_run_backwards() {
    let clock = Clock::start();

    let mut previous = clock.elapsed_secs();
    for _ in 0..1000 {
        let now = clock.elapsed_secs();
        assert!(now >= previous);
        previous = now;
    }
}

#[test]
fn should_count_seconds_since_start() {
    let clock = Clock::start();

    thread::sleep(Duration::from_millis(20));

    assert!(clock.elapsed_secs() >= 0.02);
}
