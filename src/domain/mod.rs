//! Domain models - core types of the crossing controller
//!
//! This module contains the canonical data types used throughout the system:
//! - `TrainEvent` / `TrainState` - sensor reports and the fused train state
//! - `Notification` - targeted or broadcast vehicle notification
//! - `ReportRequest` / `ReportResponse` - report listener wire envelope
//! - `SendNotificationRequest` - vehicle communicator wire body

pub mod types;

// Re-export commonly used types at module level
pub use types::{
    Notification, NotificationLevel, ReportError, ReportRequest, ReportResponse,
    SendNotificationRequest, SensorSource, TrainEvent, TrainEventKind, TrainState,
    VehicleEventKind,
};
