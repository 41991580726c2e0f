//! Two-sensor train state machine
//!
//! Fuses Register/Arriving/Left reports from the proximity and timetable
//! feeds into a single crossing-wide train state. The state is
//! source-agnostic: either sensor advances it, and a feed repeating a phase
//! the crossing is already in does not restart it.

use crate::domain::types::{TrainEvent, TrainEventKind, TrainState};
use tracing::debug;

/// Outcome of applying one train event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainTransition {
    pub before: TrainState,
    pub after: TrainState,
    /// An idle crossing saw its first registration
    pub first_registration: bool,
    /// A second train registered while one was already arriving
    pub second_train_during_arrival: bool,
}

impl TrainTransition {
    /// The crossing moved into Arriving with this event
    pub fn entered_arriving(&self) -> bool {
        self.after == TrainState::Arriving && self.before != TrainState::Arriving
    }

    pub fn is_state_change(&self) -> bool {
        self.before != self.after
    }
}

/// Fused train state for one intersection
#[derive(Default)]
pub struct TrainStateMachine {
    state: TrainState,
}

impl TrainStateMachine {
    pub fn new() -> Self {
        Self { state: TrainState::Idle }
    }

    pub fn state(&self) -> TrainState {
        self.state
    }

    /// Apply one sensor report and return the transition taken
    pub fn apply(&mut self, event: TrainEvent) -> TrainTransition {
        let before = self.state;
        let mut first_registration = false;
        let mut second_train_during_arrival = false;

        let after = match (before, event.kind) {
            (TrainState::Idle, TrainEventKind::Register) => {
                first_registration = true;
                TrainState::Registered
            }
            // Arrival without a prior registration: the registering feed
            // missed or dropped its report. Trust the arrival.
            (TrainState::Idle, TrainEventKind::Arriving) => TrainState::Arriving,
            // Re-registration of the same announcement
            (TrainState::Registered, TrainEventKind::Register) => TrainState::Registered,
            (TrainState::Registered, TrainEventKind::Arriving) => TrainState::Arriving,
            (TrainState::Arriving, TrainEventKind::Register) => {
                second_train_during_arrival = true;
                TrainState::Arriving
            }
            // Second feed confirming an arrival already in progress
            (TrainState::Arriving, TrainEventKind::Arriving) => TrainState::Arriving,
            // Left always clears, including when the crossing is already idle
            (_, TrainEventKind::Left) => TrainState::Idle,
        };

        self.state = after;

        debug!(
            source = %event.source.as_str(),
            kind = %event.kind.as_str(),
            before = %before.as_str(),
            after = %after.as_str(),
            "train_event_applied"
        );

        TrainTransition { before, after, first_registration, second_train_during_arrival }
    }

    /// Return to Idle (controller reset)
    pub fn reset(&mut self) {
        self.state = TrainState::Idle;
    }
}
