//! Tests for the IntersectionController module

use super::*;
use crate::domain::types::{
    Notification, NotificationLevel, ReportError, SensorSource, TrainEventKind, TrainState,
    VehicleEventKind,
};
use crate::io::communicator::{Communicator, DeliveryError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every communicator call and fails the targets it was told to fail
struct RecordingCommunicator {
    calls: Mutex<Vec<Notification>>,
    fail_targets: Vec<Option<String>>,
}

impl RecordingCommunicator {
    fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()), fail_targets: Vec::new() }
    }

    fn failing_on(targets: Vec<Option<String>>) -> Self {
        Self { calls: Mutex::new(Vec::new()), fail_targets: targets }
    }

    fn calls(&self) -> Vec<Notification> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Communicator for RecordingCommunicator {
    async fn send_notification(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.calls.lock().push(notification.clone());
        if self.fail_targets.contains(&notification.target) {
            return Err(DeliveryError::Rejected { status: 503 });
        }
        Ok(())
    }
}

/// Test harness that keeps the recording double reachable for assertions
struct TestController {
    controller: IntersectionController,
    communicator: Arc<RecordingCommunicator>,
}

impl std::ops::Deref for TestController {
    type Target = IntersectionController;
    fn deref(&self) -> &Self::Target {
        &self.controller
    }
}

fn create_test_controller() -> TestController {
    create_test_controller_failing(Vec::new())
}

fn create_test_controller_failing(fail_targets: Vec<Option<String>>) -> TestController {
    let communicator = Arc::new(RecordingCommunicator::failing_on(fail_targets));
    let metrics = Arc::new(Metrics::new());
    let dispatcher = Dispatcher::new(communicator.clone(), metrics.clone());
    let controller = IntersectionController::new(dispatcher, metrics);
    TestController { controller, communicator }
}

fn register_vehicle(controller: &TestController, plate: &str) -> bool {
    controller.report_vehicle(plate, VehicleEventKind::Arriving).unwrap()
}

#[tokio::test]
async fn test_first_registration_broadcasts_pass_slowly() {
    let controller = create_test_controller();

    let outcome =
        controller.report_train(SensorSource::Timetable, TrainEventKind::Register).await;

    assert_eq!(outcome.state, TrainState::Registered);
    assert!(outcome.transition.first_registration);
    assert_eq!(outcome.dispatch.sent, 1);
    assert_eq!(
        controller.communicator.calls(),
        vec![Notification::broadcast(NotificationLevel::PassSlowly)]
    );
}

#[tokio::test]
async fn test_reregistration_sends_nothing() {
    let controller = create_test_controller();

    controller.report_train(SensorSource::Timetable, TrainEventKind::Register).await;
    // Same announcement confirmed by the other feed
    let outcome =
        controller.report_train(SensorSource::Proximity, TrainEventKind::Register).await;

    assert_eq!(outcome.state, TrainState::Registered);
    assert_eq!(outcome.dispatch.sent, 0);
    assert_eq!(controller.communicator.calls().len(), 1);
}

#[tokio::test]
async fn test_arriving_stops_each_vehicle_then_broadcast() {
    let controller = create_test_controller();

    // Registration order does not matter; the snapshot is sorted
    assert!(register_vehicle(&controller, "DEF-456"));
    assert!(register_vehicle(&controller, "ABC-123"));

    controller.report_train(SensorSource::Timetable, TrainEventKind::Register).await;
    let outcome =
        controller.report_train(SensorSource::Proximity, TrainEventKind::Arriving).await;

    assert_eq!(outcome.state, TrainState::Arriving);
    assert_eq!(outcome.dispatch.sent, 3);
    assert_eq!(
        controller.communicator.calls(),
        vec![
            Notification::broadcast(NotificationLevel::PassSlowly),
            Notification::targeted("ABC-123", NotificationLevel::Stop),
            Notification::targeted("DEF-456", NotificationLevel::Stop),
            Notification::broadcast(NotificationLevel::Stop),
        ]
    );
}

#[tokio::test]
async fn test_arriving_at_empty_crossing_broadcasts_only() {
    let controller = create_test_controller();

    let outcome =
        controller.report_train(SensorSource::Proximity, TrainEventKind::Arriving).await;

    assert_eq!(outcome.state, TrainState::Arriving);
    assert_eq!(
        controller.communicator.calls(),
        vec![Notification::broadcast(NotificationLevel::Stop)]
    );
}

#[tokio::test]
async fn test_vehicle_reports_never_notify() {
    let controller = create_test_controller();

    assert!(register_vehicle(&controller, "ABC-123"));
    assert!(register_vehicle(&controller, "DEF-456"));
    assert!(controller.report_vehicle("ABC-123", VehicleEventKind::Left).unwrap());

    assert!(controller.communicator.calls().is_empty());
    assert_eq!(controller.vehicle_count(), 1);
}

#[tokio::test]
async fn test_duplicate_registration_counts_once() {
    let controller = create_test_controller();

    assert!(register_vehicle(&controller, "ABC-123"));
    assert!(!register_vehicle(&controller, "ABC-123"));

    assert_eq!(controller.vehicle_count(), 1);
    let summary = controller.metrics.report();
    assert_eq!(summary.duplicate_registrations_total, 1);
    assert_eq!(summary.vehicle_reports_total, 2);
}

#[tokio::test]
async fn test_empty_plate_rejected_before_state_change() {
    let controller = create_test_controller();

    let result = controller.report_vehicle("   ", VehicleEventKind::Arriving);

    assert_eq!(result, Err(ReportError::EmptyPlate));
    assert_eq!(controller.vehicle_count(), 0);
    let summary = controller.metrics.report();
    assert_eq!(summary.reports_rejected_total, 1);
    assert_eq!(summary.vehicle_reports_total, 0);
}

#[tokio::test]
async fn test_plate_whitespace_is_trimmed() {
    let controller = create_test_controller();

    assert!(register_vehicle(&controller, " ABC-123 "));
    assert!(!register_vehicle(&controller, "ABC-123"));

    assert_eq!(controller.vehicles(), vec!["ABC-123"]);
}

#[tokio::test]
async fn test_left_unknown_plate_returns_false() {
    let controller = create_test_controller();

    assert!(!controller.report_vehicle("ABC-123", VehicleEventKind::Left).unwrap());
    assert_eq!(controller.vehicle_count(), 0);
}

#[tokio::test]
async fn test_full_passage_scenario() {
    let controller = create_test_controller();

    assert!(register_vehicle(&controller, "ABC-123"));
    assert!(register_vehicle(&controller, "DEF-456"));

    controller.report_train(SensorSource::Timetable, TrainEventKind::Register).await;
    controller.report_train(SensorSource::Proximity, TrainEventKind::Arriving).await;

    // A vehicle reporting in mid-arrival is registered silently
    assert!(register_vehicle(&controller, "GHI-567"));

    // Second announcement while the first train is still at the crossing
    let outcome =
        controller.report_train(SensorSource::Timetable, TrainEventKind::Register).await;
    assert!(outcome.transition.second_train_during_arrival);

    controller.report_train(SensorSource::Proximity, TrainEventKind::Left).await;
    assert_eq!(controller.train_state(), TrainState::Idle);

    let calls = controller.communicator.calls();
    let stop_broadcasts = calls
        .iter()
        .filter(|n| n.is_broadcast() && n.level == NotificationLevel::Stop)
        .count();
    let look_arounds =
        calls.iter().filter(|n| n.level == NotificationLevel::LookAround).count();
    let pass_slowly =
        calls.iter().filter(|n| n.level == NotificationLevel::PassSlowly).count();

    assert_eq!(stop_broadcasts, 1, "only the arrival itself broadcasts STOP");
    assert_eq!(look_arounds, 1, "second announcement warns exactly once");
    assert_eq!(pass_slowly, 1);
    // Targeted stops went to the two vehicles present when the arrival began
    assert_eq!(calls.iter().filter(|n| !n.is_broadcast()).count(), 2);
}

#[tokio::test]
async fn test_next_cycle_notifies_again() {
    let controller = create_test_controller();

    controller.report_train(SensorSource::Timetable, TrainEventKind::Register).await;
    controller.report_train(SensorSource::Proximity, TrainEventKind::Left).await;

    // Fresh announcement after the crossing cleared
    let outcome =
        controller.report_train(SensorSource::Timetable, TrainEventKind::Register).await;

    assert!(outcome.transition.first_registration);
    let calls = controller.communicator.calls();
    assert_eq!(
        calls.iter().filter(|n| n.level == NotificationLevel::PassSlowly).count(),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_registrations_all_accepted() {
    let communicator = Arc::new(RecordingCommunicator::new());
    let metrics = Arc::new(Metrics::new());
    let dispatcher = Dispatcher::new(communicator.clone(), metrics.clone());
    let controller = Arc::new(IntersectionController::new(dispatcher, metrics));

    // Parallel workers so registrations genuinely race on the lock
    let mut handles = Vec::new();
    for i in 0..64 {
        let controller = controller.clone();
        handles.push(tokio::spawn(async move {
            controller.report_vehicle(&format!("PLT-{i:03}"), VehicleEventKind::Arriving)
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), Ok(true));
    }

    assert_eq!(controller.vehicle_count(), 64);
    assert!(communicator.calls().is_empty());
}

#[tokio::test]
async fn test_delivery_failure_preserves_state() {
    let controller = create_test_controller_failing(vec![Some("ABC-123".to_string())]);

    assert!(register_vehicle(&controller, "ABC-123"));
    assert!(register_vehicle(&controller, "DEF-456"));

    controller.report_train(SensorSource::Timetable, TrainEventKind::Register).await;
    let outcome =
        controller.report_train(SensorSource::Proximity, TrainEventKind::Arriving).await;

    // One target failed, the rest of the sequence was still attempted
    assert_eq!(outcome.dispatch.sent, 2);
    assert_eq!(outcome.dispatch.failed(), 1);
    assert_eq!(controller.communicator.calls().len(), 4);

    // Crossing state is unaffected by delivery trouble
    assert_eq!(controller.train_state(), TrainState::Arriving);
    assert_eq!(controller.vehicle_count(), 2);
    assert_eq!(controller.metrics.report().notifications_failed, 1);
}

#[tokio::test]
async fn test_reset_clears_crossing() {
    let controller = create_test_controller();

    register_vehicle(&controller, "ABC-123");
    controller.report_train(SensorSource::Proximity, TrainEventKind::Arriving).await;

    controller.reset();

    assert_eq!(controller.train_state(), TrainState::Idle);
    assert_eq!(controller.vehicle_count(), 0);

    // Next announcement starts a fresh cycle
    let outcome =
        controller.report_train(SensorSource::Timetable, TrainEventKind::Register).await;
    assert!(outcome.transition.first_registration);
}

#[tokio::test]
async fn test_gauges_follow_crossing_state() {
    let controller = create_test_controller();

    register_vehicle(&controller, "ABC-123");
    register_vehicle(&controller, "DEF-456");
    controller.report_train(SensorSource::Proximity, TrainEventKind::Arriving).await;

    let summary = controller.metrics.report();
    assert_eq!(summary.train_state, TrainState::Arriving.code());
    assert_eq!(summary.vehicles_present, 2);
}
