//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `listener` - TCP listener for sensor and vehicle reports
//! - `communicator` - HTTP client for the vehicle communicator
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod communicator;
pub mod listener;
pub mod prometheus;

// Re-export commonly used types
pub use communicator::{Communicator, DeliveryError, HttpCommunicator};
pub use listener::{start_report_listener, ReportListenerConfig};
