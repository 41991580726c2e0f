//! Shared types for the crossing controller

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Independent feed reporting train presence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSource {
    Proximity,
    Timetable,
}

impl SensorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorSource::Proximity => "proximity",
            SensorSource::Timetable => "timetable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainEventKind {
    /// Train announced for the crossing
    Register,
    /// Train is approaching the crossing
    Arriving,
    /// Train has cleared the crossing
    Left,
}

impl TrainEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainEventKind::Register => "register",
            TrainEventKind::Arriving => "arriving",
            TrainEventKind::Left => "left",
        }
    }
}

/// A single train report from one sensor feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainEvent {
    pub source: SensorSource,
    pub kind: TrainEventKind,
}

impl TrainEvent {
    pub fn new(source: SensorSource, kind: TrainEventKind) -> Self {
        Self { source, kind }
    }
}

/// Fused train state for the intersection. Source-agnostic: both sensor
/// feeds advance the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainState {
    #[default]
    Idle,
    Registered,
    Arriving,
}

impl TrainState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainState::Idle => "idle",
            TrainState::Registered => "registered",
            TrainState::Arriving => "arriving",
        }
    }

    /// Numeric encoding for the state gauge
    pub fn code(&self) -> u64 {
        match self {
            TrainState::Idle => 0,
            TrainState::Registered => 1,
            TrainState::Arriving => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleEventKind {
    /// Vehicle pulled up to the crossing
    Arriving,
    /// Vehicle drove off
    Left,
}

/// Urgency level carried by a notification, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationLevel {
    PassSlowly,
    Stop,
    LookAround,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::PassSlowly => "pass_slowly",
            NotificationLevel::Stop => "stop",
            NotificationLevel::LookAround => "look_around",
        }
    }
}

/// Outbound notification. A missing target means broadcast to every
/// vehicle near the crossing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub target: Option<String>,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn broadcast(level: NotificationLevel) -> Self {
        Self {
            target: None,
            level,
        }
    }

    pub fn targeted(plate: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            target: Some(plate.into()),
            level,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.target.is_none()
    }
}

/// Wire body for the vehicle communicator. Broadcasts serialize the
/// plate as an explicit null, matching what the communicator expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendNotificationRequest {
    #[serde(rename = "licensePlate")]
    pub license_plate: Option<String>,
    pub level: NotificationLevel,
}

impl From<&Notification> for SendNotificationRequest {
    fn from(notification: &Notification) -> Self {
        Self {
            license_plate: notification.target.clone(),
            level: notification.level,
        }
    }
}

/// One line of the report listener protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportRequest {
    Train {
        sensor: SensorSource,
        event: TrainEventKind,
    },
    Vehicle {
        plate: String,
        event: VehicleEventKind,
    },
}

/// Single-line JSON answer to a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub ok: bool,
    /// Vehicle reports only: whether the plate was newly registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered: Option<bool>,
    /// Train reports only: fused state after the event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_state: Option<String>,
    /// Train reports only: notifications delivered / failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportResponse {
    pub fn vehicle(registered: bool) -> Self {
        Self {
            ok: true,
            registered: Some(registered),
            train_state: None,
            sent: None,
            failed: None,
            error: None,
        }
    }

    pub fn train(state: TrainState, sent: usize, failed: usize) -> Self {
        Self {
            ok: true,
            registered: None,
            train_state: Some(state.as_str().to_string()),
            sent: Some(sent),
            failed: Some(failed),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            registered: None,
            train_state: None,
            sent: None,
            failed: None,
            error: Some(error.into()),
        }
    }
}

/// Report rejected before touching intersection state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("license plate must not be empty")]
    EmptyPlate,
}
