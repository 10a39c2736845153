mod concurrency;
mod monitor;

use slot_admission::{ManualClock, QueueConfig, SlotAdmissionController};
use std::time::Duration;

/// Controller driven by a manual clock, plus a handle to that clock.
pub(crate) fn controller() -> (SlotAdmissionController, ManualClock) {
    let clock = ManualClock::new();
    let controller = SlotAdmissionController::builder()
        .clock(clock.clone())
        .build();
    (controller, clock)
}

pub(crate) fn config(capacity: usize, max_hold_ms: u64) -> QueueConfig {
    QueueConfig::builder()
        .capacity(capacity)
        .max_hold_ms(max_hold_ms)
        .build()
}

pub(crate) fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
