//! Core infrastructure for slot-admission.
//!
//! This crate provides the pieces shared by the admission controller and its hosts:
//! - Event system for observing participant state changes
//! - Injectable monotonic clocks, so demotion timing can be driven from tests

pub mod clock;
pub mod events;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventListener, EventListeners, FnListener, SlotEvent};
