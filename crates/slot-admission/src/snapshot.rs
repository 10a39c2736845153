//! Read-only views of queue and participant state.

use crate::participant::ParticipantId;
use std::time::Duration;

/// Point-in-time counters for one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMetrics {
    /// Configured number of slots.
    pub capacity: usize,
    /// Configured hold budget.
    pub max_hold: Duration,
    /// Registered participants, admitted or waiting.
    pub size: usize,
    /// Participants in the wait list.
    pub waiting: usize,
    /// Participants holding a slot.
    pub admitted: usize,
    /// Waiting participants that lost a slot to demotion at least once.
    pub demoted: usize,
}

impl QueueMetrics {
    /// Slots not currently held.
    pub fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.admitted)
    }
}

/// Lifecycle status of a participant as seen through its ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantStatus {
    /// Holds a slot.
    Admitted,
    /// In the wait list.
    Waiting,
    /// No longer tracked: released, unregistered, or its queue was disposed.
    Released,
}

/// Snapshot of one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantView {
    /// The participant.
    pub participant_id: ParticipantId,
    /// Current status.
    pub status: ParticipantStatus,
    /// 0-based wait position while waiting.
    pub waiting_position: Option<usize>,
    /// How many times the participant has been demoted.
    pub demotions: u32,
    /// How long the current slot has been held, while admitted.
    pub held_for: Option<Duration>,
}

impl ParticipantView {
    pub(crate) fn released(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            status: ParticipantStatus::Released,
            waiting_position: None,
            demotions: 0,
            held_for: None,
        }
    }

    /// True if the participant holds a slot.
    pub fn is_admitted(&self) -> bool {
        self.status == ParticipantStatus::Admitted
    }

    /// True if the participant lost its slot to demotion and has not regained one.
    pub fn is_demoted(&self) -> bool {
        self.status == ParticipantStatus::Waiting && self.demotions > 0
    }
}
