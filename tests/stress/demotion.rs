//! Demotion stress tests

use slot_admission::{DemotionMonitor, ManualClock, QueueConfig, SlotAdmissionController};
use std::sync::Arc;
use std::time::Duration;

/// Test: Repeated demotion rounds rotate every participant through the slots
#[test]
#[ignore]
fn stress_demotion_rotation() {
    let clock = ManualClock::new();
    let controller = SlotAdmissionController::builder()
        .clock(clock.clone())
        .build();
    let capacity = 3;
    let participants = 300;
    let cfg = QueueConfig::new(capacity, Duration::from_millis(100));

    let tickets: Vec<_> = (0..participants)
        .map(|n| controller.register("rotation", format!("p{n}"), cfg).unwrap())
        .collect();

    let mut admitted_at_least_once = vec![false; participants];
    for _ in 0..(participants / capacity + 1) {
        for (n, ticket) in tickets.iter().enumerate() {
            if controller.participant(ticket).is_admitted() {
                admitted_at_least_once[n] = true;
            }
        }
        clock.advance(Duration::from_millis(101));
        assert_eq!(controller.tick("rotation").unwrap(), capacity);
    }

    assert!(admitted_at_least_once.iter().all(|seen| *seen));
    let metrics = controller.metrics("rotation").unwrap();
    assert_eq!(metrics.size, participants);
    assert_eq!(metrics.admitted, capacity);
}

/// Test: The background monitor keeps up with many queues
#[tokio::test(start_paused = true)]
#[ignore]
async fn stress_monitor_many_queues() {
    let clock = ManualClock::new();
    let controller = Arc::new(
        SlotAdmissionController::builder()
            .clock(clock.clone())
            .build(),
    );
    let cfg = QueueConfig::new(1, Duration::from_millis(100));
    for q in 0..500 {
        for p in 0..4 {
            controller.register(&format!("q{q}"), format!("p{p}"), cfg).unwrap();
        }
    }

    let monitor = DemotionMonitor::spawn(Arc::clone(&controller), Duration::from_millis(50));
    clock.advance(Duration::from_millis(101));
    tokio::time::sleep(Duration::from_millis(120)).await;
    monitor.stop();

    for queue in controller.queue_ids() {
        let metrics = controller.metrics(&queue).unwrap();
        assert_eq!(metrics.admitted, 1);
        assert_eq!(metrics.demoted, 1);
    }
}
