//! Property tests for the controller surface.
//!
//! Invariants tested:
//! - Held slots never exceed capacity across any sequence of calls
//! - Every admission is matched by a release, demotion or unregistration
//! - A participant that keeps polling is eventually admitted

use proptest::prelude::*;
use slot_admission::{
    AdmissionEvent, ManualClock, QueueConfig, SlotAdmissionController, Ticket,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Call {
    Register(u8),
    Request(usize),
    Release(usize),
    Unregister(usize),
    Advance(u64),
    Tick,
}

fn call() -> impl Strategy<Value = Call> {
    prop_oneof![
        3 => (0u8..16).prop_map(Call::Register),
        4 => any::<usize>().prop_map(Call::Request),
        2 => any::<usize>().prop_map(Call::Release),
        1 => any::<usize>().prop_map(Call::Unregister),
        2 => (1u64..400).prop_map(Call::Advance),
        1 => Just(Call::Tick),
    ]
}

/// Net slot count derived from the published events.
fn held_from_events(events: &[AdmissionEvent]) -> i64 {
    events.iter().fold(0, |held, event| match event {
        AdmissionEvent::Admitted { .. } => held + 1,
        AdmissionEvent::Demoted { .. } | AdmissionEvent::Released { .. } => held - 1,
        AdmissionEvent::Unregistered { was_admitted: true, .. } => held - 1,
        _ => held,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(150))]

    /// Property: capacity holds and events account for every held slot
    #[test]
    fn controller_respects_capacity(
        capacity in 1usize..4,
        max_hold_ms in 50u64..1000,
        calls in prop::collection::vec(call(), 1..100),
    ) {
        let clock = ManualClock::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let controller = SlotAdmissionController::builder()
            .clock(clock.clone())
            .on_event(move |event: &AdmissionEvent| sink.lock().unwrap().push(event.clone()))
            .build();
        let cfg = QueueConfig::new(capacity, Duration::from_millis(max_hold_ms));
        let mut tickets: Vec<Ticket> = Vec::new();

        for call in calls {
            match call {
                Call::Register(id) => {
                    tickets.push(controller.register("prop", format!("p{id}"), cfg).unwrap());
                }
                Call::Request(i) if !tickets.is_empty() => {
                    let _ = controller.request_admission(&tickets[i % tickets.len()]);
                }
                Call::Release(i) if !tickets.is_empty() => {
                    let _ = controller.release(&tickets[i % tickets.len()]);
                }
                Call::Unregister(i) if !tickets.is_empty() => {
                    controller.unregister(&tickets[i % tickets.len()]);
                }
                Call::Advance(ms) => clock.advance(Duration::from_millis(ms)),
                Call::Tick => {
                    let _ = controller.tick("prop");
                }
                _ => {}
            }

            if let Ok(metrics) = controller.metrics("prop") {
                prop_assert!(metrics.admitted <= capacity);
                let held = held_from_events(&events.lock().unwrap());
                prop_assert_eq!(held, metrics.admitted as i64);
            }
        }
    }

    /// Property: a participant that keeps polling while others release is admitted
    #[test]
    fn persistent_poller_is_admitted(
        capacity in 1usize..4,
        ahead in 0usize..12,
    ) {
        let clock = ManualClock::new();
        let controller = SlotAdmissionController::builder().clock(clock.clone()).build();
        let cfg = QueueConfig::new(capacity, Duration::from_secs(60));

        let others: Vec<Ticket> = (0..ahead)
            .map(|n| controller.register("prop", format!("o{n}"), cfg).unwrap())
            .collect();
        let me = controller.register("prop", "me", cfg).unwrap();

        let mut released = 0;
        while !controller.request_admission(&me).unwrap().is_admitted() {
            prop_assert!(released < others.len(), "ran out of holders to release");
            controller.release(&others[released]).unwrap();
            released += 1;
        }
        prop_assert_eq!(released, ahead.saturating_sub(capacity - 1));
    }
}
