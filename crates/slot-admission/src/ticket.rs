//! Tickets and admission outcomes.

use crate::participant::ParticipantId;
use std::sync::Arc;
use std::time::Duration;

/// State of a participant at the moment its ticket was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    /// A slot was free and granted immediately.
    Admitted,
    /// All slots were taken; the participant joined the wait list.
    Waiting {
        /// 0-based position in the wait list.
        position: usize,
    },
}

/// Handle for one registration of a participant in a queue.
///
/// A ticket stays valid until the participant is released or unregistered.
/// Registering the same participant id again afterwards yields a new ticket;
/// the old one keeps referring to the finished registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    queue_id: Arc<str>,
    participant_id: ParticipantId,
    pub(crate) generation: u64,
    pub(crate) serial: u64,
    state: TicketState,
}

impl Ticket {
    pub(crate) fn new(
        queue_id: Arc<str>,
        participant_id: ParticipantId,
        generation: u64,
        serial: u64,
        state: TicketState,
    ) -> Self {
        Self {
            queue_id,
            participant_id,
            generation,
            serial,
            state,
        }
    }

    /// Queue this ticket belongs to.
    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    /// Participant this ticket was issued to.
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// State at registration time. Use
    /// [`SlotAdmissionController::request_admission`](crate::SlotAdmissionController::request_admission)
    /// for the current state.
    pub fn initial_state(&self) -> TicketState {
        self.state
    }

    /// True if the participant got a slot at registration.
    pub fn is_admitted(&self) -> bool {
        self.state == TicketState::Admitted
    }
}

/// Result of polling for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// The participant holds a slot.
    Admitted {
        /// How long the slot has been held so far.
        held_for: Duration,
    },
    /// The participant is waiting for a slot.
    Waiting {
        /// 0-based position in the wait list.
        position: usize,
    },
}

impl AdmissionOutcome {
    /// True if the participant holds a slot.
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionOutcome::Admitted { .. })
    }

    /// Wait position, if waiting.
    pub fn position(&self) -> Option<usize> {
        match self {
            AdmissionOutcome::Waiting { position } => Some(*position),
            AdmissionOutcome::Admitted { .. } => None,
        }
    }
}
