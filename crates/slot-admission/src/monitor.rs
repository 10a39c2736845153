//! Background demotion checks.

use crate::controller::SlotAdmissionController;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Periodically runs [`SlotAdmissionController::tick_all`] on a tokio task.
///
/// Demotion checks already run on every registration and admission poll; the
/// monitor covers queues that nobody polls. The task stops when the monitor
/// is dropped or [`stop`](Self::stop) is called.
///
/// # Example
///
/// ```rust
/// use slot_admission::{DemotionMonitor, SlotAdmissionController};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let controller = Arc::new(SlotAdmissionController::new());
/// let monitor = DemotionMonitor::spawn(Arc::clone(&controller), Duration::from_millis(250));
/// assert!(monitor.is_running());
/// monitor.stop();
/// # }
/// ```
#[derive(Debug)]
pub struct DemotionMonitor {
    task: JoinHandle<()>,
}

impl DemotionMonitor {
    /// Spawns the monitor on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, or if `interval` is zero.
    pub fn spawn(controller: Arc<SlotAdmissionController>, interval: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let _demoted = controller.tick_all();

                #[cfg(feature = "tracing")]
                {
                    if _demoted > 0 {
                        tracing::debug!(demoted = _demoted, "demotion sweep");
                    }
                }
            }
        });
        Self { task }
    }

    /// True until the monitor is stopped.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the background task.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for DemotionMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
