//! Report handlers for the IntersectionController
//!
//! Each handler validates its report, mutates crossing state under the
//! controller lock, and records metrics. Train reports additionally run
//! the notification policy; its output is dispatched once the lock has
//! been released.

use super::{IntersectionController, TrainReportOutcome};
use crate::domain::types::{
    ReportError, SensorSource, TrainEvent, TrainEventKind, VehicleEventKind,
};
use crate::services::policy;
use std::time::Instant;
use tracing::{debug, info};

impl IntersectionController {
    /// Handle one train sensor report
    ///
    /// The transition and the registry snapshot are taken under the same
    /// lock, so the notification sequence always reflects the vehicles
    /// that were present at the moment the state changed.
    pub async fn report_train(
        &self,
        source: SensorSource,
        kind: TrainEventKind,
    ) -> TrainReportOutcome {
        let received_at = Instant::now();
        self.metrics.record_train_event();

        let event = TrainEvent::new(source, kind);
        let (transition, notifications) = {
            let mut state = self.state.lock();
            let transition = state.trains.apply(event);
            let snapshot = state.vehicles.snapshot();
            let notifications = policy::decide(&transition, &snapshot);
            self.metrics.set_train_state(transition.after.code());
            (transition, notifications)
        };

        if transition.is_state_change() {
            info!(
                source = %source.as_str(),
                before = %transition.before.as_str(),
                after = %transition.after.as_str(),
                notifications = %notifications.len(),
                "train_state_changed"
            );
        }

        let dispatch = self.dispatcher.dispatch(&notifications).await;

        let latency_us = received_at.elapsed().as_micros() as u64;
        self.metrics.record_report(latency_us);

        TrainReportOutcome { state: transition.after, transition, dispatch }
    }

    /// Handle one vehicle report
    ///
    /// Arriving registers the plate (idempotent), Left removes it. Returns
    /// whether the report changed the registry. Vehicle reports never
    /// produce notifications; the policy only reacts to train transitions.
    pub fn report_vehicle(
        &self,
        plate: &str,
        kind: VehicleEventKind,
    ) -> Result<bool, ReportError> {
        let received_at = Instant::now();

        let plate = plate.trim();
        if plate.is_empty() {
            self.metrics.record_report_rejected();
            return Err(ReportError::EmptyPlate);
        }

        self.metrics.record_vehicle_report();

        let (accepted, present) = {
            let mut state = self.state.lock();
            let accepted = match kind {
                VehicleEventKind::Arriving => state.vehicles.register(plate, received_at),
                VehicleEventKind::Left => state.vehicles.remove(plate),
            };
            (accepted, state.vehicles.len())
        };
        self.metrics.set_vehicles_present(present as u64);

        match kind {
            VehicleEventKind::Arriving if accepted => {
                info!(plate = %plate, vehicles = %present, "vehicle_registered");
            }
            VehicleEventKind::Arriving => {
                self.metrics.record_duplicate_registration();
                debug!(plate = %plate, "duplicate_vehicle_report");
            }
            VehicleEventKind::Left if accepted => {
                info!(plate = %plate, vehicles = %present, "vehicle_left");
            }
            VehicleEventKind::Left => {
                debug!(plate = %plate, "unknown_vehicle_left");
            }
        }

        let latency_us = received_at.elapsed().as_micros() as u64;
        self.metrics.record_report(latency_us);

        Ok(accepted)
    }
}
