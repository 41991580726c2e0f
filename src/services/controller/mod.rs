//! Intersection control and report orchestration
//!
//! The IntersectionController is the single decision point that coordinates:
//! - Train state tracking (two sensor feeds fused into one state machine)
//! - Vehicle registry bookkeeping (arrivals, departures, duplicates)
//! - Notification policy evaluation and dispatch
//!
//! Train and vehicle reports mutate crossing state under one lock, so every
//! report observes a consistent picture of the intersection. Notification
//! delivery runs after the lock is released.

mod handlers;
#[cfg(test)]
mod tests;

use crate::domain::types::TrainState;
use crate::infra::metrics::Metrics;
use crate::services::dispatcher::{DispatchReport, Dispatcher};
use crate::services::registry::VehicleRegistry;
use crate::services::train_state::{TrainStateMachine, TrainTransition};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Mutable crossing state guarded by the controller lock
pub(crate) struct CrossingState {
    /// Fused two-feed train state
    pub(crate) trains: TrainStateMachine,
    /// Vehicles currently waiting at the crossing
    pub(crate) vehicles: VehicleRegistry,
}

/// Outcome of one processed train report
#[derive(Debug)]
pub struct TrainReportOutcome {
    /// Fused state after the event was applied
    pub state: TrainState,
    /// Transition the event took
    pub transition: TrainTransition,
    /// Delivery results for the notifications the transition produced
    pub dispatch: DispatchReport,
}

/// Central decision point for one level crossing
pub struct IntersectionController {
    /// Crossing state; every report serializes on this lock
    pub(crate) state: Mutex<CrossingState>,
    /// Delivers decided notifications to the vehicle communicator
    pub(crate) dispatcher: Dispatcher,
    /// Metrics collector
    pub(crate) metrics: Arc<Metrics>,
}

impl IntersectionController {
    /// Create a new controller with the given dispatcher and metrics
    pub fn new(dispatcher: Dispatcher, metrics: Arc<Metrics>) -> Self {
        Self {
            state: Mutex::new(CrossingState {
                trains: TrainStateMachine::new(),
                vehicles: VehicleRegistry::new(),
            }),
            dispatcher,
            metrics,
        }
    }

    /// Current fused train state
    pub fn train_state(&self) -> TrainState {
        self.state.lock().trains.state()
    }

    /// Number of vehicles currently registered at the crossing
    pub fn vehicle_count(&self) -> usize {
        self.state.lock().vehicles.len()
    }

    /// Plates currently registered, sorted
    pub fn vehicles(&self) -> Vec<String> {
        self.state.lock().vehicles.snapshot()
    }

    /// Drop every registration and return the train machine to Idle
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            state.trains.reset();
            state.vehicles.clear();
        }
        self.metrics.set_train_state(TrainState::Idle.code());
        self.metrics.set_vehicles_present(0);
        info!("crossing_state_reset");
    }
}
