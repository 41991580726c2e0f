//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are
//! statistical counters only. Do NOT use them for coordination or logic
//! decisions.

use crate::domain::types::NotificationLevel;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Number of notification levels tracked per-level
const NUM_LEVELS: usize = 3;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Index into the per-level counters
#[inline]
fn level_index(level: NotificationLevel) -> usize {
    match level {
        NotificationLevel::PassSlowly => 0,
        NotificationLevel::Stop => 1,
        NotificationLevel::LookAround => 2,
    }
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps counters to get a consistent snapshot.
pub struct Metrics {
    /// Total reports ever handled (monotonic)
    reports_total: AtomicU64,
    /// Reports since last report cycle (reset on report)
    reports_since_report: AtomicU64,
    /// Sum of report handling latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max report handling latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Report handling latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Train reports handled (monotonic)
    train_events_total: AtomicU64,
    /// Vehicle reports handled (monotonic)
    vehicle_reports_total: AtomicU64,
    /// Vehicle reports that were duplicates (monotonic)
    duplicate_registrations_total: AtomicU64,
    /// Reports rejected as invalid before touching state (monotonic)
    reports_rejected_total: AtomicU64,
    /// Notifications accepted by the communicator (monotonic)
    notifications_sent_total: AtomicU64,
    /// Notifications that failed delivery (monotonic)
    notifications_failed_total: AtomicU64,
    /// Sent notifications per level (monotonic)
    level_sent: [AtomicU64; NUM_LEVELS],
    /// Notification delivery latency histogram buckets (reset on report)
    delivery_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of delivery latencies (reset on report)
    delivery_sum_us: AtomicU64,
    /// Max delivery latency (reset on report)
    delivery_max_us: AtomicU64,
    /// Current fused train state (0=idle, 1=registered, 2=arriving)
    train_state: AtomicU64,
    /// Vehicles currently registered at the crossing
    vehicles_present: AtomicU64,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            reports_total: AtomicU64::new(0),
            reports_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            train_events_total: AtomicU64::new(0),
            vehicle_reports_total: AtomicU64::new(0),
            duplicate_registrations_total: AtomicU64::new(0),
            reports_rejected_total: AtomicU64::new(0),
            notifications_sent_total: AtomicU64::new(0),
            notifications_failed_total: AtomicU64::new(0),
            level_sent: std::array::from_fn(|_| AtomicU64::new(0)),
            delivery_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            delivery_sum_us: AtomicU64::new(0),
            delivery_max_us: AtomicU64::new(0),
            train_state: AtomicU64::new(0),
            vehicles_present: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a handled report with its end-to-end latency (lock-free)
    #[inline]
    pub fn record_report(&self, latency_us: u64) {
        self.reports_total.fetch_add(1, Ordering::Relaxed);
        self.reports_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        // Update histogram bucket
        let bucket = bucket_index(latency_us);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        // Update max
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    /// Record a train report reaching the state machine (lock-free)
    #[inline]
    pub fn record_train_event(&self) {
        self.train_events_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a vehicle report reaching the registry (lock-free)
    #[inline]
    pub fn record_vehicle_report(&self) {
        self.vehicle_reports_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a duplicate vehicle registration (lock-free)
    #[inline]
    pub fn record_duplicate_registration(&self) {
        self.duplicate_registrations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a report rejected as invalid (lock-free)
    #[inline]
    pub fn record_report_rejected(&self) {
        self.reports_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivered notification with its delivery latency (lock-free)
    #[inline]
    pub fn record_notification_sent(&self, level: NotificationLevel, latency_us: u64) {
        self.notifications_sent_total.fetch_add(1, Ordering::Relaxed);
        self.level_sent[level_index(level)].fetch_add(1, Ordering::Relaxed);
        self.delivery_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        let bucket = bucket_index(latency_us);
        self.delivery_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.delivery_max_us, latency_us);
    }

    /// Record a failed notification delivery (lock-free)
    #[inline]
    pub fn record_notification_failed(&self) {
        self.notifications_failed_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the fused train state gauge (0=idle, 1=registered, 2=arriving)
    #[inline]
    pub fn set_train_state(&self, state: u64) {
        self.train_state.store(state, Ordering::Relaxed);
    }

    /// Set the registered-vehicle gauge
    #[inline]
    pub fn set_vehicles_present(&self, count: u64) {
        self.vehicles_present.store(count, Ordering::Relaxed);
    }

    /// Get total reports handled
    #[inline]
    #[allow(dead_code)]
    pub fn reports_total(&self) -> u64 {
        self.reports_total.load(Ordering::Relaxed)
    }

    /// Get total notifications sent
    #[inline]
    #[allow(dead_code)]
    pub fn notifications_sent_total(&self) -> u64 {
        self.notifications_sent_total.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self) -> MetricsSummary {
        // Swap periodic counters to zero and get their values
        let reports_count = self.reports_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        // Swap delivery latency counters
        let delivery_buckets = swap_buckets(&self.delivery_buckets);
        let delivery_sum = self.delivery_sum_us.swap(0, Ordering::Relaxed);
        let delivery_max = self.delivery_max_us.swap(0, Ordering::Relaxed);

        // Get monotonic counters (don't reset)
        let reports_total = self.reports_total.load(Ordering::Relaxed);
        let train_events_total = self.train_events_total.load(Ordering::Relaxed);
        let vehicle_reports_total = self.vehicle_reports_total.load(Ordering::Relaxed);
        let duplicate_registrations_total =
            self.duplicate_registrations_total.load(Ordering::Relaxed);
        let reports_rejected_total = self.reports_rejected_total.load(Ordering::Relaxed);
        let notifications_sent_total = self.notifications_sent_total.load(Ordering::Relaxed);
        let notifications_failed_total = self.notifications_failed_total.load(Ordering::Relaxed);
        let pass_slowly_sent_total = self.level_sent[0].load(Ordering::Relaxed);
        let stop_sent_total = self.level_sent[1].load(Ordering::Relaxed);
        let look_around_sent_total = self.level_sent[2].load(Ordering::Relaxed);

        // Calculate elapsed time and reset
        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        // Calculate derived metrics
        let reports_per_sec = if elapsed.as_secs_f64() > 0.0 {
            reports_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let avg_latency = if reports_count > 0 { latency_sum / reports_count } else { 0 };

        // Compute percentiles from histogram
        let lat_p50 = percentile_from_buckets(&lat_buckets, 0.50);
        let lat_p95 = percentile_from_buckets(&lat_buckets, 0.95);
        let lat_p99 = percentile_from_buckets(&lat_buckets, 0.99);

        // Delivery latency metrics
        let delivery_count: u64 = delivery_buckets.iter().sum();
        let delivery_avg_us = if delivery_count > 0 { delivery_sum / delivery_count } else { 0 };
        let delivery_p99_us = percentile_from_buckets(&delivery_buckets, 0.99);

        // Gauges (point-in-time, don't reset)
        let train_state = self.train_state.load(Ordering::Relaxed);
        let vehicles_present = self.vehicles_present.load(Ordering::Relaxed);

        MetricsSummary {
            reports_total,
            reports_per_sec,
            avg_report_latency_us: avg_latency,
            max_report_latency_us: max_latency,
            lat_buckets,
            lat_p50_us: lat_p50,
            lat_p95_us: lat_p95,
            lat_p99_us: lat_p99,
            train_events_total,
            vehicle_reports_total,
            duplicate_registrations_total,
            reports_rejected_total,
            notifications_sent_total,
            notifications_failed: notifications_failed_total,
            pass_slowly_sent_total,
            stop_sent_total,
            look_around_sent_total,
            delivery_buckets,
            delivery_avg_us,
            delivery_max_us: delivery_max,
            delivery_p99_us,
            train_state,
            vehicles_present,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for the Prometheus endpoint)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
#[allow(dead_code)]
pub struct MetricsSummary {
    pub reports_total: u64,
    pub reports_per_sec: f64,
    pub avg_report_latency_us: u64,
    pub max_report_latency_us: u64,
    /// Report handling latency histogram buckets
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    /// 50th percentile report latency (µs)
    pub lat_p50_us: u64,
    /// 95th percentile report latency (µs)
    pub lat_p95_us: u64,
    /// 99th percentile report latency (µs)
    pub lat_p99_us: u64,
    pub train_events_total: u64,
    pub vehicle_reports_total: u64,
    pub duplicate_registrations_total: u64,
    pub reports_rejected_total: u64,
    pub notifications_sent_total: u64,
    pub notifications_failed: u64,
    pub pass_slowly_sent_total: u64,
    pub stop_sent_total: u64,
    pub look_around_sent_total: u64,
    /// Notification delivery latency histogram buckets (same bounds)
    pub delivery_buckets: [u64; NUM_BUCKETS],
    /// Average delivery latency (µs)
    pub delivery_avg_us: u64,
    /// Max delivery latency (µs)
    pub delivery_max_us: u64,
    /// 99th percentile delivery latency (µs)
    pub delivery_p99_us: u64,
    /// Current fused train state (0=idle, 1=registered, 2=arriving)
    pub train_state: u64,
    /// Vehicles currently registered
    pub vehicles_present: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            reports_total = %self.reports_total,
            reports_per_sec = format!("{:.1}", self.reports_per_sec),
            avg_latency_us = %self.avg_report_latency_us,
            max_latency_us = %self.max_report_latency_us,
            p50_us = %self.lat_p50_us,
            p95_us = %self.lat_p95_us,
            p99_us = %self.lat_p99_us,
            train_state = %self.train_state,
            vehicles_present = %self.vehicles_present,
            notifications_sent = %self.notifications_sent_total,
            notifications_failed = %self.notifications_failed,
            delivery_p99_us = %self.delivery_p99_us,
            "metrics"
        );
    }
}
