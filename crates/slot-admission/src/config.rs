//! Configuration for an admission queue.

use crate::error::{AdmissionError, Result};
use std::time::Duration;

/// Capacity and hold budget of one queue.
///
/// A queue takes its config from the first participant that registers
/// against it; configs passed by later registrants are ignored. Use
/// [`SlotAdmissionController::set_capacity`] and
/// [`SlotAdmissionController::set_max_hold`] to change a live queue.
///
/// [`SlotAdmissionController::set_capacity`]: crate::SlotAdmissionController::set_capacity
/// [`SlotAdmissionController::set_max_hold`]: crate::SlotAdmissionController::set_max_hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of participants holding a slot at once.
    pub(crate) capacity: usize,
    /// How long a participant may hold a slot before it is demoted.
    pub(crate) max_hold: Duration,
}

impl QueueConfig {
    /// Creates a config with the given capacity and hold budget.
    ///
    /// The values are checked when the config is used, see [`QueueConfig::validate`].
    pub fn new(capacity: usize, max_hold: Duration) -> Self {
        Self { capacity, max_hold }
    }

    /// Creates a new configuration builder.
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::new()
    }

    /// Maximum number of concurrently held slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grace period before a holder is demoted.
    pub fn max_hold(&self) -> Duration {
        self.max_hold
    }

    /// Checks that capacity is at least one and the hold budget is non-zero.
    pub fn validate(&self) -> Result<()> {
        validate_capacity(self.capacity)?;
        validate_max_hold(self.max_hold)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfigBuilder::new().build()
    }
}

pub(crate) fn validate_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        return Err(AdmissionError::InvalidConfig {
            reason: "capacity must be at least 1",
        });
    }
    Ok(())
}

pub(crate) fn validate_max_hold(max_hold: Duration) -> Result<()> {
    if max_hold.is_zero() {
        return Err(AdmissionError::InvalidConfig {
            reason: "max hold must be greater than zero",
        });
    }
    Ok(())
}

/// Builder for [`QueueConfig`].
#[derive(Debug, Clone)]
pub struct QueueConfigBuilder {
    capacity: usize,
    max_hold: Duration,
}

impl QueueConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            capacity: 1,
            max_hold: Duration::from_secs(10),
        }
    }

    /// Sets the number of slots.
    ///
    /// Default: 1
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets how long a slot may be held before demotion.
    ///
    /// Default: 10 seconds
    pub fn max_hold(mut self, max_hold: Duration) -> Self {
        self.max_hold = max_hold;
        self
    }

    /// Sets the hold budget in milliseconds.
    pub fn max_hold_ms(self, ms: u64) -> Self {
        self.max_hold(Duration::from_millis(ms))
    }

    /// Builds the configuration.
    pub fn build(self) -> QueueConfig {
        QueueConfig {
            capacity: self.capacity,
            max_hold: self.max_hold,
        }
    }
}

impl Default for QueueConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
