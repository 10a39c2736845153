use super::{config, ms};
use slot_admission::{DemotionMonitor, ManualClock, ParticipantStatus, SlotAdmissionController};
use std::sync::Arc;

fn shared_controller() -> (Arc<SlotAdmissionController>, ManualClock) {
    let clock = ManualClock::new();
    let controller = Arc::new(
        SlotAdmissionController::builder()
            .clock(clock.clone())
            .build(),
    );
    (controller, clock)
}

/// The monitor demotes overdue holders without anyone polling
#[tokio::test(start_paused = true)]
async fn monitor_demotes_without_polling() {
    let (controller, clock) = shared_controller();
    let cfg = config(1, 1000);
    let a = controller.register("q", "a", cfg).unwrap();
    let b = controller.register("q", "b", cfg).unwrap();

    let monitor = DemotionMonitor::spawn(Arc::clone(&controller), ms(100));

    clock.advance(ms(1001));
    tokio::time::sleep(ms(250)).await;

    assert!(controller.participant(&b).is_admitted());
    assert_eq!(controller.participant(&a).status, ParticipantStatus::Waiting);
    monitor.stop();
}

/// Nothing happens while holders are within budget
#[tokio::test(start_paused = true)]
async fn monitor_leaves_fresh_holders_alone() {
    let (controller, clock) = shared_controller();
    let a = controller.register("q", "a", config(1, 1000)).unwrap();

    let _monitor = DemotionMonitor::spawn(Arc::clone(&controller), ms(100));

    clock.advance(ms(900));
    tokio::time::sleep(ms(500)).await;

    assert!(controller.participant(&a).is_admitted());
}

/// Stopping or dropping the monitor ends the sweeps
#[tokio::test(start_paused = true)]
async fn stopped_monitor_no_longer_demotes() {
    let (controller, clock) = shared_controller();
    let a = controller.register("q", "a", config(1, 1000)).unwrap();

    let monitor = DemotionMonitor::spawn(Arc::clone(&controller), ms(100));
    assert!(monitor.is_running());
    drop(monitor);
    tokio::task::yield_now().await;

    clock.advance(ms(5000));
    tokio::time::sleep(ms(500)).await;

    // Only an explicit check demotes now.
    assert!(controller.participant(&a).is_admitted());
    assert_eq!(controller.tick("q").unwrap(), 1);
}
