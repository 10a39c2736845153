//! Bounded-concurrency slot admission.
//!
//! A [`SlotAdmissionController`] limits how many participants of a named queue
//! may hold a scarce slot at once, for example how many embedded exercise
//! iframes may render concurrently. Participants that cannot get a slot wait
//! in FIFO order. A participant that holds its slot longer than the queue's
//! hold budget is demoted: it loses the slot and goes to the back of the wait
//! list, but its own work is not interrupted.
//!
//! Nothing in this crate blocks. Hosts poll with
//! [`SlotAdmissionController::request_admission`] or listen for events.
//!
//! # Basic Example
//!
//! ```rust
//! use slot_admission::{QueueConfig, SlotAdmissionController, TicketState};
//!
//! # fn main() -> slot_admission::Result<()> {
//! let controller = SlotAdmissionController::new();
//! let config = QueueConfig::builder().capacity(3).max_hold_ms(1000).build();
//!
//! let tickets: Vec<_> = (1..=4)
//!     .map(|n| controller.register("exercise-iframes", format!("P{n}"), config))
//!     .collect::<Result<_, _>>()?;
//!
//! assert!(tickets[..3].iter().all(|t| t.is_admitted()));
//! assert_eq!(tickets[3].initial_state(), TicketState::Waiting { position: 0 });
//!
//! controller.release(&tickets[0])?;
//! assert!(controller.request_admission(&tickets[3])?.is_admitted());
//! # Ok(())
//! # }
//! ```
//!
//! # Deterministic Timing
//!
//! Hold durations are measured with an injected [`Clock`]. Tests use a
//! [`ManualClock`] to trigger demotion without sleeping:
//!
//! ```rust
//! use slot_admission::{ManualClock, ParticipantStatus, QueueConfig, SlotAdmissionController};
//! use std::time::Duration;
//!
//! # fn main() -> slot_admission::Result<()> {
//! let clock = ManualClock::new();
//! let controller = SlotAdmissionController::builder().clock(clock.clone()).build();
//! let config = QueueConfig::builder().capacity(1).max_hold_ms(1000).build();
//!
//! let slow = controller.register("q", "slow", config)?;
//! let next = controller.register("q", "next", config)?;
//!
//! clock.advance(Duration::from_millis(1001));
//! controller.tick("q")?;
//!
//! assert!(controller.participant(&next).is_admitted());
//! assert_eq!(controller.participant(&slow).status, ParticipantStatus::Waiting);
//! # Ok(())
//! # }
//! ```
//!
//! # Event Listeners
//!
//! ```rust
//! use slot_admission::SlotAdmissionController;
//!
//! let controller = SlotAdmissionController::builder()
//!     .on_admitted(|queue, participant| println!("{participant} admitted to {queue}"))
//!     .on_demoted(|queue, participant, held| {
//!         println!("{participant} demoted from {queue} after {held:?}")
//!     })
//!     .build();
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod monitor;
pub mod participant;
pub mod queue;
pub mod snapshot;
pub mod ticket;

pub use config::{QueueConfig, QueueConfigBuilder};
pub use controller::{SlotAdmissionController, SlotAdmissionControllerBuilder};
pub use error::{AdmissionError, Result};
pub use events::AdmissionEvent;
pub use monitor::DemotionMonitor;
pub use participant::ParticipantId;
pub use queue::{SlotQueue, Transition};
pub use slot_admission_core::{Clock, ManualClock, SystemClock};
pub use snapshot::{ParticipantStatus, ParticipantView, QueueMetrics};
pub use ticket::{AdmissionOutcome, Ticket, TicketState};

use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<Arc<SlotAdmissionController>> = OnceLock::new();

/// The process-wide controller, created on first use with the system clock.
///
/// Queues registered here live until disposed with
/// [`SlotAdmissionController::dispose_queue`].
pub fn global() -> &'static Arc<SlotAdmissionController> {
    GLOBAL.get_or_init(|| Arc::new(SlotAdmissionController::new()))
}
