//! Admission state machine for a single queue.
//!
//! [`SlotQueue`] is plain data: every operation takes the current instant as
//! an argument and never reads a clock, so demotion is a pure function of the
//! queue state and `now`. The controller wraps each queue in a mutex and feeds
//! it timestamps from its injected clock.
//!
//! Each participant is in exactly one of two states:
//!
//! - **Admitted**: holds one of `capacity` slots since some instant.
//! - **Waiting**: sits in the FIFO wait list.
//!
//! A participant that holds its slot longer than `max_hold` is demoted: it
//! goes back to waiting at the tail of the wait list and its slot goes to the
//! participants that were already waiting.

use crate::config::{validate_capacity, validate_max_hold, QueueConfig};
use crate::error::{AdmissionError, Result};
use crate::participant::ParticipantId;
use crate::snapshot::{ParticipantStatus, ParticipantView, QueueMetrics};
use crate::ticket::{AdmissionOutcome, Ticket, TicketState};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A state change produced by a queue operation.
///
/// Operations record transitions in order; the controller drains them with
/// [`SlotQueue::drain_transitions`] and turns them into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The participant was granted a slot.
    Admitted {
        /// Participant that got the slot.
        participant: ParticipantId,
        /// Time spent waiting since it last entered the wait list.
        waited: Duration,
    },
    /// The participant joined the wait list at registration.
    Queued {
        /// Participant that is waiting.
        participant: ParticipantId,
        /// 0-based position at the time it joined.
        position: usize,
    },
    /// The participant held its slot too long and went back to waiting.
    Demoted {
        /// Participant that lost its slot.
        participant: ParticipantId,
        /// How long the slot was held.
        held_for: Duration,
    },
    /// The participant gave up its slot voluntarily.
    Released {
        /// Participant that released.
        participant: ParticipantId,
        /// How long the slot was held.
        held_for: Duration,
    },
    /// The participant was removed from the queue.
    Unregistered {
        /// Participant that was removed.
        participant: ParticipantId,
        /// Whether it held a slot when removed.
        was_admitted: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Waiting { since: Instant },
    Admitted { since: Instant },
}

#[derive(Debug)]
struct Participant {
    serial: u64,
    state: SlotState,
    demotions: u32,
}

enum Resolved {
    Live,
    Released,
    Unknown,
}

/// The admission state of one named queue.
#[derive(Debug)]
pub struct SlotQueue {
    id: Arc<str>,
    generation: u64,
    config: QueueConfig,
    participants: HashMap<ParticipantId, Participant>,
    wait_list: VecDeque<ParticipantId>,
    held: usize,
    next_serial: u64,
    transitions: Vec<Transition>,
}

impl SlotQueue {
    /// Creates an empty queue, failing with [`AdmissionError::InvalidConfig`]
    /// if the config is malformed.
    pub fn new(id: impl Into<Arc<str>>, config: QueueConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: id.into(),
            generation: 0,
            config,
            participants: HashMap::new(),
            wait_list: VecDeque::new(),
            held: 0,
            next_serial: 0,
            transitions: Vec::new(),
        })
    }

    /// Tags the queue so tickets from a disposed queue with the same id are
    /// not accepted by its successor.
    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// The queue id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current configuration.
    pub fn config(&self) -> QueueConfig {
        self.config
    }

    /// Number of slots currently held.
    pub fn held(&self) -> usize {
        self.held
    }

    /// Number of waiting participants.
    pub fn waiting(&self) -> usize {
        self.wait_list.len()
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// True if no participant is registered.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Registers a participant.
    ///
    /// Runs a demotion check first. The participant is admitted if a slot is
    /// free and queued at the tail otherwise. Registering an id that is
    /// already tracked returns a ticket for the existing registration.
    pub fn register(&mut self, participant: ParticipantId, now: Instant) -> Ticket {
        self.tick(now);

        if let Some(existing) = self.participants.get(&participant) {
            let state = match existing.state {
                SlotState::Admitted { .. } => TicketState::Admitted,
                SlotState::Waiting { .. } => TicketState::Waiting {
                    position: self.position_of(&participant).unwrap_or_default(),
                },
            };
            let serial = existing.serial;
            return self.ticket(participant, serial, state);
        }

        let serial = self.next_serial;
        self.next_serial += 1;

        let state = if self.held < self.config.capacity {
            self.held += 1;
            self.participants.insert(
                participant.clone(),
                Participant {
                    serial,
                    state: SlotState::Admitted { since: now },
                    demotions: 0,
                },
            );
            self.transitions.push(Transition::Admitted {
                participant: participant.clone(),
                waited: Duration::ZERO,
            });
            TicketState::Admitted
        } else {
            self.participants.insert(
                participant.clone(),
                Participant {
                    serial,
                    state: SlotState::Waiting { since: now },
                    demotions: 0,
                },
            );
            self.wait_list.push_back(participant.clone());
            let position = self.wait_list.len() - 1;
            self.transitions.push(Transition::Queued {
                participant: participant.clone(),
                position,
            });
            TicketState::Waiting { position }
        };

        self.check_invariants();
        self.ticket(participant, serial, state)
    }

    /// Polls for a slot. Never blocks.
    ///
    /// Runs a demotion check first. A waiting participant claims a free slot
    /// only if its wait position is below the number of free slots, so it
    /// cannot jump ahead of participants that are first in line.
    pub fn request_admission(&mut self, ticket: &Ticket, now: Instant) -> Result<AdmissionOutcome> {
        self.tick(now);

        let id = ticket.participant_id();
        let state = match (self.resolve(ticket), self.participants.get(id)) {
            (Resolved::Live, Some(p)) => p.state,
            _ => return Err(self.unknown(ticket)),
        };

        let outcome = match state {
            SlotState::Admitted { since } => AdmissionOutcome::Admitted {
                held_for: now.saturating_duration_since(since),
            },
            SlotState::Waiting { .. } => {
                let position = self.position_of(id).unwrap_or_default();
                let free = self.config.capacity.saturating_sub(self.held);
                if position < free {
                    self.wait_list.remove(position);
                    self.admit(id, now);
                    AdmissionOutcome::Admitted {
                        held_for: Duration::ZERO,
                    }
                } else {
                    AdmissionOutcome::Waiting { position }
                }
            }
        };

        self.check_invariants();
        Ok(outcome)
    }

    /// Gives up a held slot and promotes the longest waiter.
    ///
    /// No-op for a waiting participant and for a ticket that was already
    /// released. Fails only for tickets this queue never issued.
    pub fn release(&mut self, ticket: &Ticket, now: Instant) -> Result<()> {
        match self.resolve(ticket) {
            Resolved::Unknown => Err(self.unknown(ticket)),
            Resolved::Released => Ok(()),
            Resolved::Live => {
                let id = ticket.participant_id();
                if let Some(SlotState::Admitted { since }) =
                    self.participants.get(id).map(|p| p.state)
                {
                    self.participants.remove(id);
                    self.held -= 1;
                    self.transitions.push(Transition::Released {
                        participant: id.clone(),
                        held_for: now.saturating_duration_since(since),
                    });
                    self.promote(now, self.wait_list.len());
                }
                self.check_invariants();
                Ok(())
            }
        }
    }

    /// Removes a participant in any state. Returns false if it was not tracked.
    pub fn unregister(&mut self, ticket: &Ticket, now: Instant) -> bool {
        if !matches!(self.resolve(ticket), Resolved::Live) {
            return false;
        }
        let id = ticket.participant_id();
        let Some(removed) = self.participants.remove(id) else {
            return false;
        };

        let was_admitted = match removed.state {
            SlotState::Admitted { .. } => {
                self.held -= 1;
                true
            }
            SlotState::Waiting { .. } => {
                if let Some(position) = self.position_of(id) {
                    self.wait_list.remove(position);
                }
                false
            }
        };
        self.transitions.push(Transition::Unregistered {
            participant: id.clone(),
            was_admitted,
        });
        if was_admitted {
            self.promote(now, self.wait_list.len());
        }

        self.check_invariants();
        true
    }

    /// Demotes every participant that has held its slot longer than `max_hold`.
    ///
    /// Demoted participants are appended to the wait list, oldest grant first,
    /// and the freed slots go to participants that were waiting before this
    /// call. Returns the number of demotions.
    pub fn tick(&mut self, now: Instant) -> usize {
        let max_hold = self.config.max_hold;
        let mut expired: Vec<(Instant, u64, ParticipantId)> = self
            .participants
            .iter()
            .filter_map(|(id, p)| match p.state {
                SlotState::Admitted { since }
                    if now.saturating_duration_since(since) > max_hold =>
                {
                    Some((since, p.serial, id.clone()))
                }
                _ => None,
            })
            .collect();

        if expired.is_empty() {
            return 0;
        }
        expired.sort();

        let eligible = self.wait_list.len();
        for (since, _, id) in &expired {
            self.demote(id, *since, now);
        }
        self.promote(now, eligible);

        self.check_invariants();
        expired.len()
    }

    /// Changes the number of slots.
    ///
    /// Growing admits waiters in FIFO order. Shrinking demotes the most
    /// recently admitted holders until the held count fits.
    pub fn set_capacity(&mut self, capacity: usize, now: Instant) -> Result<()> {
        validate_capacity(capacity)?;
        self.config.capacity = capacity;

        if self.held > capacity {
            let mut holders: Vec<(Instant, u64, ParticipantId)> = self
                .participants
                .iter()
                .filter_map(|(id, p)| match p.state {
                    SlotState::Admitted { since } => Some((since, p.serial, id.clone())),
                    SlotState::Waiting { .. } => None,
                })
                .collect();
            holders.sort();
            let excess = self.held - capacity;
            let newest = holders.split_off(holders.len() - excess);
            for (since, _, id) in &newest {
                self.demote(id, *since, now);
            }
        } else {
            self.promote(now, self.wait_list.len());
        }

        self.check_invariants();
        Ok(())
    }

    /// Changes the hold budget. Takes effect at the next demotion check.
    pub fn set_max_hold(&mut self, max_hold: Duration) -> Result<()> {
        validate_max_hold(max_hold)?;
        self.config.max_hold = max_hold;
        Ok(())
    }

    /// Counters for this queue.
    pub fn metrics(&self) -> QueueMetrics {
        let demoted = self
            .wait_list
            .iter()
            .filter(|id| self.participants.get(*id).is_some_and(|p| p.demotions > 0))
            .count();
        QueueMetrics {
            capacity: self.config.capacity,
            max_hold: self.config.max_hold,
            size: self.participants.len(),
            waiting: self.wait_list.len(),
            admitted: self.held,
            demoted,
        }
    }

    /// Snapshot of the participant behind `ticket`.
    pub fn view(&self, ticket: &Ticket, now: Instant) -> ParticipantView {
        let id = ticket.participant_id();
        let participant = match (self.resolve(ticket), self.participants.get(id)) {
            (Resolved::Live, Some(p)) => p,
            _ => return ParticipantView::released(id.clone()),
        };
        match participant.state {
            SlotState::Admitted { since } => ParticipantView {
                participant_id: id.clone(),
                status: ParticipantStatus::Admitted,
                waiting_position: None,
                demotions: participant.demotions,
                held_for: Some(now.saturating_duration_since(since)),
            },
            SlotState::Waiting { .. } => ParticipantView {
                participant_id: id.clone(),
                status: ParticipantStatus::Waiting,
                waiting_position: self.position_of(id),
                demotions: participant.demotions,
                held_for: None,
            },
        }
    }

    /// Takes the transitions recorded since the last drain.
    pub fn drain_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    fn ticket(&self, participant: ParticipantId, serial: u64, state: TicketState) -> Ticket {
        Ticket::new(
            Arc::clone(&self.id),
            participant,
            self.generation,
            serial,
            state,
        )
    }

    fn resolve(&self, ticket: &Ticket) -> Resolved {
        if ticket.queue_id() != &*self.id
            || ticket.generation != self.generation
            || ticket.serial >= self.next_serial
        {
            return Resolved::Unknown;
        }
        match self.participants.get(ticket.participant_id()) {
            Some(p) if p.serial == ticket.serial => Resolved::Live,
            _ => Resolved::Released,
        }
    }

    fn unknown(&self, ticket: &Ticket) -> AdmissionError {
        AdmissionError::UnknownParticipant {
            queue_id: ticket.queue_id().to_string(),
            participant_id: ticket.participant_id().to_string(),
        }
    }

    fn position_of(&self, id: &ParticipantId) -> Option<usize> {
        self.wait_list.iter().position(|w| w == id)
    }

    fn admit(&mut self, id: &ParticipantId, now: Instant) {
        let Some(participant) = self.participants.get_mut(id) else {
            return;
        };
        let SlotState::Waiting { since } = participant.state else {
            return;
        };
        participant.state = SlotState::Admitted { since: now };
        self.held += 1;
        debug_assert!(
            self.held <= self.config.capacity,
            "queue {}: admitted beyond capacity",
            self.id
        );
        self.transitions.push(Transition::Admitted {
            participant: id.clone(),
            waited: now.saturating_duration_since(since),
        });
    }

    fn demote(&mut self, id: &ParticipantId, since: Instant, now: Instant) {
        if let Some(participant) = self.participants.get_mut(id) {
            participant.state = SlotState::Waiting { since: now };
            participant.demotions = participant.demotions.saturating_add(1);
        }
        self.held -= 1;
        self.wait_list.push_back(id.clone());
        self.transitions.push(Transition::Demoted {
            participant: id.clone(),
            held_for: now.saturating_duration_since(since),
        });
    }

    /// Admits up to `eligible` participants from the head of the wait list
    /// while slots are free.
    fn promote(&mut self, now: Instant, eligible: usize) {
        let mut budget = eligible;
        while budget > 0 && self.held < self.config.capacity {
            let Some(id) = self.wait_list.pop_front() else {
                break;
            };
            budget -= 1;
            self.admit(&id, now);
        }
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.held <= self.config.capacity,
            "queue {}: {} slots held with capacity {}",
            self.id,
            self.held,
            self.config.capacity
        );
        debug_assert_eq!(
            self.held,
            self.participants
                .values()
                .filter(|p| matches!(p.state, SlotState::Admitted { .. }))
                .count(),
            "queue {}: held count out of sync",
            self.id
        );
        debug_assert_eq!(
            self.held + self.wait_list.len(),
            self.participants.len(),
            "queue {}: participant tracked in two states or none",
            self.id
        );
    }
}
