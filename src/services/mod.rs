//! Services - decision logic and intersection state
//!
//! This module contains the core decision services:
//! - `controller` - Central orchestrator owning the intersection state
//! - `train_state` - Two-sensor train state machine
//! - `registry` - Vehicle presence registry with duplicate detection
//! - `policy` - Pure notification derivation
//! - `dispatcher` - Per-notification delivery via the communicator

pub mod controller;
pub mod dispatcher;
pub mod policy;
pub mod registry;
pub mod train_state;

// Re-export commonly used types
pub use controller::IntersectionController;
pub use dispatcher::{DispatchReport, Dispatcher};
pub use registry::VehicleRegistry;
pub use train_state::{TrainStateMachine, TrainTransition};
