//! The slot admission controller: a registry of named queues.

use crate::config::QueueConfig;
use crate::error::{AdmissionError, Result};
use crate::events::AdmissionEvent;
use crate::participant::ParticipantId;
use crate::queue::{SlotQueue, Transition};
use crate::snapshot::{ParticipantView, QueueMetrics};
use crate::ticket::{AdmissionOutcome, Ticket};
use slot_admission_core::clock::{Clock, SystemClock};
use slot_admission_core::events::{EventListeners, FnListener};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

type SharedQueue = Arc<QueueEntry>;

/// A queue and the events it produced that have not been delivered yet.
struct QueueEntry {
    state: Mutex<SlotQueue>,
    outbox: Mutex<Outbox>,
}

/// Undelivered batches, in the order their transitions happened.
///
/// Batches are pushed while the queue lock is held. At most one thread
/// drains at a time, without holding the queue lock.
#[derive(Default)]
struct Outbox {
    pending: VecDeque<Batch>,
    draining: bool,
}

struct Batch {
    queue_id: String,
    events: Vec<AdmissionEvent>,
    held: usize,
    waiting: usize,
}

impl QueueEntry {
    fn new(queue: SlotQueue) -> Self {
        Self {
            state: Mutex::new(queue),
            outbox: Mutex::new(Outbox::default()),
        }
    }

    /// Must be called with the queue lock held so batches keep transition order.
    fn enqueue(&self, batch: Batch) {
        lock(&self.outbox).pending.push_back(batch);
    }
}

/// Owns every admission queue, keyed by queue id.
///
/// Queues are created lazily by the first [`register`](Self::register) for
/// their id and live until [`dispose_queue`](Self::dispose_queue). Each queue
/// is guarded by its own mutex, held for the duration of one operation, so
/// all transitions of a queue are serialized. Listeners run after the lock
/// is released and may call back into the controller.
///
/// Events of one queue reach listeners in the order the transitions
/// happened. When another thread is already delivering events for the same
/// queue, that thread delivers the new ones too, so a call may return before
/// its own events have been seen.
///
/// # Example
///
/// ```rust
/// use slot_admission::{AdmissionOutcome, QueueConfig, SlotAdmissionController};
///
/// # fn main() -> slot_admission::Result<()> {
/// let controller = SlotAdmissionController::new();
/// let config = QueueConfig::builder().capacity(1).max_hold_ms(1000).build();
///
/// let first = controller.register("iframes", "task-1", config)?;
/// let second = controller.register("iframes", "task-2", config)?;
/// assert!(first.is_admitted());
/// assert!(!second.is_admitted());
///
/// controller.release(&first)?;
/// assert!(controller.request_admission(&second)?.is_admitted());
/// # Ok(())
/// # }
/// ```
pub struct SlotAdmissionController {
    queues: Mutex<HashMap<String, SharedQueue>>,
    clock: Arc<dyn Clock>,
    event_listeners: EventListeners<AdmissionEvent>,
    next_generation: AtomicU64,
}

impl SlotAdmissionController {
    /// Creates a controller on the system clock with no listeners.
    pub fn new() -> Self {
        SlotAdmissionControllerBuilder::new().build()
    }

    /// Creates a new builder.
    pub fn builder() -> SlotAdmissionControllerBuilder {
        SlotAdmissionControllerBuilder::new()
    }

    /// Registers a participant against `queue_id`, creating the queue on first use.
    ///
    /// The config is always validated. If the queue already exists its
    /// config is kept and `config` is ignored: the first registrant wins.
    pub fn register(
        &self,
        queue_id: &str,
        participant_id: impl Into<ParticipantId>,
        config: QueueConfig,
    ) -> Result<Ticket> {
        config.validate()?;

        let (queue, _created) = {
            let mut queues = lock(&self.queues);
            match queues.get(queue_id) {
                Some(queue) => (Arc::clone(queue), false),
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let queue = Arc::new(QueueEntry::new(
                        SlotQueue::new(queue_id, config)?.with_generation(generation),
                    ));
                    // Nobody else can reach the queue yet, so this event is first.
                    queue.enqueue(Batch {
                        queue_id: queue_id.to_string(),
                        events: vec![AdmissionEvent::QueueCreated {
                            queue_id: queue_id.to_string(),
                            timestamp: self.clock.now(),
                            capacity: config.capacity(),
                            max_hold: config.max_hold(),
                        }],
                        held: 0,
                        waiting: 0,
                    });
                    queues.insert(queue_id.to_string(), Arc::clone(&queue));
                    (queue, true)
                }
            }
        };

        #[cfg(feature = "tracing")]
        {
            if _created {
                tracing::info!(
                    queue = queue_id,
                    capacity = config.capacity(),
                    max_hold = ?config.max_hold(),
                    "admission queue created"
                );
            }
        }

        let participant_id = participant_id.into();
        let ticket = self.run(&queue, |q, now| {
            #[cfg(feature = "tracing")]
            {
                if !_created && q.config() != config {
                    tracing::debug!(
                        queue = q.id(),
                        requested = ?config,
                        active = ?q.config(),
                        "ignoring config from later registrant"
                    );
                }
            }
            q.register(participant_id, now)
        });
        Ok(ticket)
    }

    /// Polls for a slot without blocking.
    ///
    /// Runs the queue's demotion check, then reports the participant as
    /// admitted (claiming a free slot if it is first in line) or waiting.
    pub fn request_admission(&self, ticket: &Ticket) -> Result<AdmissionOutcome> {
        let queue = self.queue_for(ticket)?;
        self.run(&queue, |q, now| q.request_admission(ticket, now))
    }

    /// Releases the participant's slot and admits the longest waiter.
    ///
    /// Releasing twice, or releasing while waiting, is a no-op.
    pub fn release(&self, ticket: &Ticket) -> Result<()> {
        let queue = self.queue_for(ticket)?;
        self.run(&queue, |q, now| q.release(ticket, now))
    }

    /// Removes the participant from its queue, whatever its state.
    ///
    /// A held slot is handed to the next waiter. Unknown tickets are ignored.
    pub fn unregister(&self, ticket: &Ticket) {
        if let Some(queue) = self.lookup(ticket.queue_id()) {
            self.run(&queue, |q, now| q.unregister(ticket, now));
        }
    }

    /// Runs the demotion check for one queue and returns the number of demotions.
    pub fn tick(&self, queue_id: &str) -> Result<usize> {
        let queue = self.lookup(queue_id).ok_or_else(|| unknown_queue(queue_id))?;
        Ok(self.run(&queue, |q, now| q.tick(now)))
    }

    /// Runs the demotion check for every queue.
    pub fn tick_all(&self) -> usize {
        let queues: Vec<SharedQueue> = lock(&self.queues).values().cloned().collect();
        queues
            .iter()
            .map(|queue| self.run(queue, |q, now| q.tick(now)))
            .sum()
    }

    /// Changes the capacity of a live queue.
    ///
    /// Growing admits waiters immediately; shrinking demotes the most
    /// recently admitted holders.
    pub fn set_capacity(&self, queue_id: &str, capacity: usize) -> Result<()> {
        let queue = self.lookup(queue_id).ok_or_else(|| unknown_queue(queue_id))?;
        self.run(&queue, |q, now| q.set_capacity(capacity, now))
    }

    /// Changes the hold budget of a live queue.
    pub fn set_max_hold(&self, queue_id: &str, max_hold: Duration) -> Result<()> {
        let queue = self.lookup(queue_id).ok_or_else(|| unknown_queue(queue_id))?;
        self.run(&queue, |q, _| q.set_max_hold(max_hold))
    }

    /// Counters for one queue.
    pub fn metrics(&self, queue_id: &str) -> Result<QueueMetrics> {
        let queue = self.lookup(queue_id).ok_or_else(|| unknown_queue(queue_id))?;
        let metrics = lock(&queue.state).metrics();
        Ok(metrics)
    }

    /// Snapshot of the participant behind `ticket`.
    ///
    /// Tickets of released participants or disposed queues report
    /// [`ParticipantStatus::Released`](crate::ParticipantStatus::Released).
    pub fn participant(&self, ticket: &Ticket) -> ParticipantView {
        match self.lookup(ticket.queue_id()) {
            Some(queue) => lock(&queue.state).view(ticket, self.clock.now()),
            None => ParticipantView::released(ticket.participant_id().clone()),
        }
    }

    /// Drops a queue and all its participants. Returns false if it did not exist.
    ///
    /// Outstanding tickets for the queue become unknown, even if a queue
    /// with the same id is created later.
    pub fn dispose_queue(&self, queue_id: &str) -> bool {
        let Some(queue) = lock(&self.queues).remove(queue_id) else {
            return false;
        };
        {
            let state = lock(&queue.state);
            let participants = state.len();

            #[cfg(feature = "tracing")]
            tracing::info!(queue = queue_id, participants, "admission queue disposed");

            queue.enqueue(Batch {
                queue_id: queue_id.to_string(),
                events: vec![AdmissionEvent::QueueDisposed {
                    queue_id: queue_id.to_string(),
                    timestamp: self.clock.now(),
                    participants,
                }],
                held: 0,
                waiting: 0,
            });
        }
        self.deliver(&queue);
        true
    }

    /// Ids of all live queues, sorted.
    pub fn queue_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.queues).keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lookup(&self, queue_id: &str) -> Option<SharedQueue> {
        lock(&self.queues).get(queue_id).cloned()
    }

    fn queue_for(&self, ticket: &Ticket) -> Result<SharedQueue> {
        self.lookup(ticket.queue_id())
            .ok_or_else(|| AdmissionError::UnknownParticipant {
                queue_id: ticket.queue_id().to_string(),
                participant_id: ticket.participant_id().to_string(),
            })
    }

    /// Runs `op` under the queue lock, then delivers the transitions it produced.
    fn run<T>(&self, queue: &QueueEntry, op: impl FnOnce(&mut SlotQueue, Instant) -> T) -> T {
        let result = {
            let mut state = lock(&queue.state);
            let now = self.clock.now();
            let result = op(&mut state, now);

            let transitions = state.drain_transitions();
            if !transitions.is_empty() {
                let queue_id = state.id().to_string();
                let timestamp = self.clock.now();
                let events = transitions
                    .into_iter()
                    .map(|t| {
                        record(&queue_id, &t);
                        AdmissionEvent::from_transition(&queue_id, timestamp, t)
                    })
                    .collect();
                queue.enqueue(Batch {
                    queue_id,
                    events,
                    held: state.held(),
                    waiting: state.waiting(),
                });
            }
            result
        };

        self.deliver(queue);
        result
    }

    /// Drains the queue's outbox unless another thread is already doing so.
    fn deliver(&self, queue: &QueueEntry) {
        {
            let mut outbox = lock(&queue.outbox);
            if outbox.draining || outbox.pending.is_empty() {
                return;
            }
            outbox.draining = true;
        }

        loop {
            let batch = {
                let mut outbox = lock(&queue.outbox);
                match outbox.pending.pop_front() {
                    Some(batch) => batch,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            set_gauges(&batch.queue_id, batch.held, batch.waiting);
            self.event_listeners.emit_all(&batch.events);
        }
    }
}

/// Logs and counts one transition.
#[allow(unused_variables)]
fn record(queue_id: &str, transition: &Transition) {
    match transition {
        Transition::Admitted {
            participant,
            waited,
        } => {
            #[cfg(feature = "tracing")]
            tracing::debug!(queue = queue_id, participant = %participant, waited = ?waited, "slot granted");

            #[cfg(feature = "metrics")]
            counter!("slot_admission_admissions_total", "queue" => queue_id.to_string())
                .increment(1);
        }
        Transition::Queued {
            participant,
            position,
        } => {
            #[cfg(feature = "tracing")]
            tracing::debug!(queue = queue_id, participant = %participant, position, "participant waiting");

            #[cfg(feature = "metrics")]
            counter!("slot_admission_queued_total", "queue" => queue_id.to_string()).increment(1);
        }
        Transition::Demoted {
            participant,
            held_for,
        } => {
            #[cfg(feature = "tracing")]
            tracing::info!(queue = queue_id, participant = %participant, held_for = ?held_for, "slot hold exceeded, participant demoted");

            #[cfg(feature = "metrics")]
            counter!("slot_admission_demotions_total", "queue" => queue_id.to_string())
                .increment(1);
        }
        Transition::Released {
            participant,
            held_for,
        } => {
            #[cfg(feature = "tracing")]
            tracing::debug!(queue = queue_id, participant = %participant, held_for = ?held_for, "slot released");

            #[cfg(feature = "metrics")]
            counter!("slot_admission_releases_total", "queue" => queue_id.to_string())
                .increment(1);
        }
        Transition::Unregistered {
            participant,
            was_admitted,
        } => {
            #[cfg(feature = "tracing")]
            tracing::debug!(queue = queue_id, participant = %participant, was_admitted, "participant unregistered");

            #[cfg(feature = "metrics")]
            counter!("slot_admission_unregistrations_total", "queue" => queue_id.to_string())
                .increment(1);
        }
    }
}

/// Publishes the occupancy recorded with a batch.
#[allow(unused_variables)]
fn set_gauges(queue_id: &str, held: usize, waiting: usize) {
    #[cfg(feature = "metrics")]
    {
        gauge!("slot_admission_held_slots", "queue" => queue_id.to_string()).set(held as f64);
        gauge!("slot_admission_waiting", "queue" => queue_id.to_string()).set(waiting as f64);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unknown_queue(queue_id: &str) -> AdmissionError {
    AdmissionError::UnknownQueue {
        queue_id: queue_id.to_string(),
    }
}

impl Default for SlotAdmissionController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SlotAdmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotAdmissionController")
            .field("queues", &self.queue_ids())
            .field("clock", &self.clock)
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

/// Builder for [`SlotAdmissionController`].
pub struct SlotAdmissionControllerBuilder {
    clock: Arc<dyn Clock>,
    event_listeners: EventListeners<AdmissionEvent>,
}

impl SlotAdmissionControllerBuilder {
    /// Creates a new builder using the system clock.
    pub fn new() -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "slot_admission_admissions_total",
                    "Total number of slots granted to participants"
                );
                describe_counter!(
                    "slot_admission_queued_total",
                    "Total number of participants that registered into a full queue"
                );
                describe_counter!(
                    "slot_admission_demotions_total",
                    "Total number of participants demoted for holding a slot too long"
                );
                describe_counter!(
                    "slot_admission_releases_total",
                    "Total number of slots released by their holders"
                );
                describe_counter!(
                    "slot_admission_unregistrations_total",
                    "Total number of participants removed from a queue"
                );
                describe_gauge!(
                    "slot_admission_held_slots",
                    "Current number of held slots"
                );
                describe_gauge!(
                    "slot_admission_waiting",
                    "Current number of waiting participants"
                );
            });
        }

        Self {
            clock: Arc::new(SystemClock),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the clock used to time slot holds.
    ///
    /// Default: [`SystemClock`]
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Registers a callback for every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&AdmissionEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Registers a callback when a participant is granted a slot.
    ///
    /// # Callback Signature
    /// `Fn(&str, &ParticipantId)` - queue id and the admitted participant.
    ///
    /// # Example
    /// ```rust,no_run
    /// use slot_admission::SlotAdmissionController;
    ///
    /// let controller = SlotAdmissionController::builder()
    ///     .on_admitted(|queue, participant| {
    ///         println!("{} may render in {}", participant, queue);
    ///     })
    ///     .build();
    /// ```
    pub fn on_admitted<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ParticipantId) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let AdmissionEvent::Admitted {
                queue_id,
                participant_id,
                ..
            } = event
            {
                f(queue_id, participant_id);
            }
        }));
        self
    }

    /// Registers a callback when a participant registers into a full queue.
    ///
    /// # Callback Signature
    /// `Fn(&str, &ParticipantId, usize)` - queue id, participant and its 0-based wait position.
    pub fn on_waiting<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ParticipantId, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let AdmissionEvent::Waiting {
                queue_id,
                participant_id,
                position,
                ..
            } = event
            {
                f(queue_id, participant_id, *position);
            }
        }));
        self
    }

    /// Registers a callback when a participant is demoted for holding its slot too long.
    ///
    /// The participant's own work keeps running; only its slot is revoked.
    ///
    /// # Callback Signature
    /// `Fn(&str, &ParticipantId, Duration)` - queue id, participant and how long it held the slot.
    ///
    /// # Example
    /// ```rust,no_run
    /// use slot_admission::SlotAdmissionController;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let demotions = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&demotions);
    ///
    /// let controller = SlotAdmissionController::builder()
    ///     .on_demoted(move |_, participant, held_for| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///         println!("{} demoted after {:?}", participant, held_for);
    ///     })
    ///     .build();
    /// ```
    pub fn on_demoted<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ParticipantId, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let AdmissionEvent::Demoted {
                queue_id,
                participant_id,
                held_for,
                ..
            } = event
            {
                f(queue_id, participant_id, *held_for);
            }
        }));
        self
    }

    /// Registers a callback when a participant releases its slot.
    ///
    /// # Callback Signature
    /// `Fn(&str, &ParticipantId, Duration)` - queue id, participant and how long it held the slot.
    pub fn on_released<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &ParticipantId, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let AdmissionEvent::Released {
                queue_id,
                participant_id,
                held_for,
                ..
            } = event
            {
                f(queue_id, participant_id, *held_for);
            }
        }));
        self
    }

    /// Builds the controller.
    pub fn build(self) -> SlotAdmissionController {
        SlotAdmissionController {
            queues: Mutex::new(HashMap::new()),
            clock: self.clock,
            event_listeners: self.event_listeners,
            next_generation: AtomicU64::new(0),
        }
    }
}

impl Default for SlotAdmissionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
