//! Notification dispatcher
//!
//! Walks a decided notification sequence and makes one communicator call per
//! notification, in order. Failures are collected into the report, never
//! retried here, and never undo the transition that produced them.

use crate::domain::types::Notification;
use crate::infra::metrics::Metrics;
use crate::io::communicator::{Communicator, DeliveryError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Outcome of dispatching one notification sequence
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Notifications the communicator accepted
    pub sent: usize,
    /// Notifications that failed, with the error for each
    pub failures: Vec<(Notification, DeliveryError)>,
}

impl DispatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sends decided notifications through the communicator seam
pub struct Dispatcher {
    communicator: Arc<dyn Communicator>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(communicator: Arc<dyn Communicator>, metrics: Arc<Metrics>) -> Self {
        Self { communicator, metrics }
    }

    /// Deliver every notification in sequence order
    ///
    /// A failed delivery is recorded and the remaining notifications are
    /// still attempted.
    pub async fn dispatch(&self, notifications: &[Notification]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for notification in notifications {
            let start = Instant::now();
            match self.communicator.send_notification(notification).await {
                Ok(()) => {
                    let latency_us = start.elapsed().as_micros() as u64;
                    self.metrics.record_notification_sent(notification.level, latency_us);
                    info!(
                        target_plate = %notification.target.as_deref().unwrap_or("broadcast"),
                        level = %notification.level.as_str(),
                        latency_us = %latency_us,
                        "notification_sent"
                    );
                    report.sent += 1;
                }
                Err(e) => {
                    self.metrics.record_notification_failed();
                    error!(
                        target_plate = %notification.target.as_deref().unwrap_or("broadcast"),
                        level = %notification.level.as_str(),
                        error = %e,
                        "notification_send_failed"
                    );
                    report.failures.push((notification.clone(), e));
                }
            }
        }

        report
    }
}
