//! Error types for the admission controller.

/// Errors returned by admission operations.
///
/// Contention is never an error: a participant that cannot get a slot is
/// simply told its wait position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// The supplied queue configuration is malformed.
    #[error("invalid queue config: {reason}")]
    InvalidConfig {
        /// What is wrong with the config.
        reason: &'static str,
    },
    /// The ticket does not refer to a participant currently tracked by the queue.
    #[error("unknown participant {participant_id:?} in queue {queue_id:?}")]
    UnknownParticipant {
        /// Queue the ticket was issued for.
        queue_id: String,
        /// Participant named by the ticket.
        participant_id: String,
    },
    /// No queue with this id exists.
    #[error("unknown queue {queue_id:?}")]
    UnknownQueue {
        /// The requested queue id.
        queue_id: String,
    },
}

impl AdmissionError {
    /// Returns true if the caller should register again to recover.
    pub fn is_unknown_participant(&self) -> bool {
        matches!(self, AdmissionError::UnknownParticipant { .. })
    }
}

/// Result type for admission operations.
pub type Result<T> = std::result::Result<T, AdmissionError>;
