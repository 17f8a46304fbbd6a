// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_advances() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
    assert!(clock.epoch_ms() > 0);
}

#[test]
fn fake_clock_advance_moves_both_time_sources() {
    let clock = FakeClock::new();
    let start = clock.now();
    let start_ms = clock.epoch_ms();

    clock.advance(Duration::from_secs(5));

    assert_eq!(clock.now() - start, Duration::from_secs(5));
    assert_eq!(clock.epoch_ms() - start_ms, 5_000);
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    assert_eq!(clock.epoch_ms(), 1_700_000_000_000);
}

#[test]
fn rfc3339_formatting() {
    assert_eq!(rfc3339_from_epoch_ms(0), "1970-01-01T00:00:00.000Z");
    assert_eq!(rfc3339_from_epoch_ms(1_700_000_000_000), "2023-11-14T22:13:20.000Z");
}

#[test]
fn timestamp_uses_clock_epoch() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(0);
    assert_eq!(clock.timestamp(), "1970-01-01T00:00:00.000Z");
}
