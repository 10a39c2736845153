//! Event types for admission queues.

use crate::participant::ParticipantId;
use crate::queue::Transition;
use slot_admission_core::events::SlotEvent;
use std::time::{Duration, Instant};

/// Events emitted by the admission controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionEvent {
    /// A queue was created by its first registration.
    QueueCreated {
        /// The queue.
        queue_id: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Slots in the new queue.
        capacity: usize,
        /// Hold budget of the new queue.
        max_hold: Duration,
    },
    /// A participant was granted a slot.
    Admitted {
        /// The queue.
        queue_id: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The participant.
        participant_id: ParticipantId,
        /// Time it waited for the slot.
        waited: Duration,
    },
    /// A participant registered while all slots were taken.
    Waiting {
        /// The queue.
        queue_id: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The participant.
        participant_id: ParticipantId,
        /// 0-based wait position.
        position: usize,
    },
    /// A participant exceeded the hold budget and lost its slot.
    Demoted {
        /// The queue.
        queue_id: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The participant.
        participant_id: ParticipantId,
        /// How long the slot was held.
        held_for: Duration,
    },
    /// A participant released its slot.
    Released {
        /// The queue.
        queue_id: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The participant.
        participant_id: ParticipantId,
        /// How long the slot was held.
        held_for: Duration,
    },
    /// A participant was removed from its queue.
    Unregistered {
        /// The queue.
        queue_id: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The participant.
        participant_id: ParticipantId,
        /// Whether it held a slot.
        was_admitted: bool,
    },
    /// A queue was disposed along with its participants.
    QueueDisposed {
        /// The queue.
        queue_id: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Participants dropped with the queue.
        participants: usize,
    },
}

impl AdmissionEvent {
    pub(crate) fn from_transition(queue_id: &str, timestamp: Instant, t: Transition) -> Self {
        let queue_id = queue_id.to_string();
        match t {
            Transition::Admitted {
                participant,
                waited,
            } => AdmissionEvent::Admitted {
                queue_id,
                timestamp,
                participant_id: participant,
                waited,
            },
            Transition::Queued {
                participant,
                position,
            } => AdmissionEvent::Waiting {
                queue_id,
                timestamp,
                participant_id: participant,
                position,
            },
            Transition::Demoted {
                participant,
                held_for,
            } => AdmissionEvent::Demoted {
                queue_id,
                timestamp,
                participant_id: participant,
                held_for,
            },
            Transition::Released {
                participant,
                held_for,
            } => AdmissionEvent::Released {
                queue_id,
                timestamp,
                participant_id: participant,
                held_for,
            },
            Transition::Unregistered {
                participant,
                was_admitted,
            } => AdmissionEvent::Unregistered {
                queue_id,
                timestamp,
                participant_id: participant,
                was_admitted,
            },
        }
    }

    /// The participant this event concerns, if any.
    pub fn participant_id(&self) -> Option<&ParticipantId> {
        match self {
            AdmissionEvent::Admitted { participant_id, .. }
            | AdmissionEvent::Waiting { participant_id, .. }
            | AdmissionEvent::Demoted { participant_id, .. }
            | AdmissionEvent::Released { participant_id, .. }
            | AdmissionEvent::Unregistered { participant_id, .. } => Some(participant_id),
            AdmissionEvent::QueueCreated { .. } | AdmissionEvent::QueueDisposed { .. } => None,
        }
    }
}

impl SlotEvent for AdmissionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AdmissionEvent::QueueCreated { .. } => "queue_created",
            AdmissionEvent::Admitted { .. } => "admitted",
            AdmissionEvent::Waiting { .. } => "waiting",
            AdmissionEvent::Demoted { .. } => "demoted",
            AdmissionEvent::Released { .. } => "released",
            AdmissionEvent::Unregistered { .. } => "unregistered",
            AdmissionEvent::QueueDisposed { .. } => "queue_disposed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            AdmissionEvent::QueueCreated { timestamp, .. }
            | AdmissionEvent::Admitted { timestamp, .. }
            | AdmissionEvent::Waiting { timestamp, .. }
            | AdmissionEvent::Demoted { timestamp, .. }
            | AdmissionEvent::Released { timestamp, .. }
            | AdmissionEvent::Unregistered { timestamp, .. }
            | AdmissionEvent::QueueDisposed { timestamp, .. } => *timestamp,
        }
    }

    fn queue_id(&self) -> &str {
        match self {
            AdmissionEvent::QueueCreated { queue_id, .. }
            | AdmissionEvent::Admitted { queue_id, .. }
            | AdmissionEvent::Waiting { queue_id, .. }
            | AdmissionEvent::Demoted { queue_id, .. }
            | AdmissionEvent::Released { queue_id, .. }
            | AdmissionEvent::Unregistered { queue_id, .. }
            | AdmissionEvent::QueueDisposed { queue_id, .. } => queue_id,
        }
    }
}
