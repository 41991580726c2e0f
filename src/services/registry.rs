//! Vehicle presence registry for the intersection
//!
//! Single source of truth for which vehicles are currently waiting at the
//! crossing. The notification policy reads its snapshot to address targeted
//! notifications.
//!
//! Key behaviors:
//! - register() is idempotent: a plate that is already present returns false
//!   and leaves the existing entry untouched
//! - remove() reports whether the plate was actually present
//! - snapshot() lists every plate exactly once, sorted, so the notification
//!   sequence for a given population is reproducible

use rustc_hash::FxHashMap;
use std::time::Instant;

/// State for a single registered vehicle
#[derive(Debug, Clone)]
pub struct VehicleEntry {
    /// When the plate was first reported at the crossing
    pub registered_at: Instant,
    /// Arrival reports received while the plate was already present
    pub duplicate_reports: u64,
}

impl VehicleEntry {
    fn new(registered_at: Instant) -> Self {
        Self { registered_at, duplicate_reports: 0 }
    }
}

/// Registry of vehicles currently at the crossing, keyed by license plate
#[derive(Default)]
pub struct VehicleRegistry {
    vehicles: FxHashMap<String, VehicleEntry>,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self { vehicles: FxHashMap::default() }
    }

    /// Record a vehicle arriving at the crossing
    ///
    /// Returns true if the plate was newly registered, false if it was
    /// already present (the original entry is kept as-is).
    pub fn register(&mut self, plate: &str, now: Instant) -> bool {
        if let Some(entry) = self.vehicles.get_mut(plate) {
            entry.duplicate_reports += 1;
            return false;
        }
        self.vehicles.insert(plate.to_string(), VehicleEntry::new(now));
        true
    }

    /// Record a vehicle leaving the crossing
    ///
    /// Returns true if the plate was present, false if the leave report
    /// had no matching registration.
    pub fn remove(&mut self, plate: &str) -> bool {
        self.vehicles.remove(plate).is_some()
    }

    /// Every registered plate exactly once, in sorted order
    pub fn snapshot(&self) -> Vec<String> {
        let mut plates: Vec<String> = self.vehicles.keys().cloned().collect();
        plates.sort_unstable();
        plates
    }

    pub fn contains(&self, plate: &str) -> bool {
        self.vehicles.contains_key(plate)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Drop every registration (controller reset)
    pub fn clear(&mut self) {
        self.vehicles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_registry() -> VehicleRegistry {
        VehicleRegistry::new()
    }

    #[test]
    fn test_first_registration_returns_true() {
        let mut registry = create_registry();
        let now = Instant::now();

        assert!(registry.register("ABC-123", now));
        assert!(registry.contains("ABC-123"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_returns_false() {
        let mut registry = create_registry();
        let now = Instant::now();
        let later = now + std::time::Duration::from_millis(3000);

        assert!(registry.register("ABC-123", now));
        assert!(!registry.register("ABC-123", later));

        // Still a single entry, original registration time kept
        assert_eq!(registry.len(), 1);
        let entry = registry.vehicles.get("ABC-123").unwrap();
        assert_eq!(entry.registered_at, now);
        assert_eq!(entry.duplicate_reports, 1);
    }

    #[test]
    fn test_remove_present_plate() {
        let mut registry = create_registry();
        let now = Instant::now();

        registry.register("ABC-123", now);
        assert!(registry.remove("ABC-123"));
        assert!(!registry.contains("ABC-123"));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_remove_unknown_plate_is_noop() {
        let mut registry = create_registry();

        assert!(!registry.remove("ABC-123"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_after_leave() {
        let mut registry = create_registry();
        let now = Instant::now();
        let later = now + std::time::Duration::from_millis(1000);

        assert!(registry.register("ABC-123", now));
        assert!(registry.remove("ABC-123"));
        assert!(registry.register("ABC-123", later));

        let entry = registry.vehicles.get("ABC-123").unwrap();
        assert_eq!(entry.registered_at, later);
        assert_eq!(entry.duplicate_reports, 0);
    }

    #[test]
    fn test_snapshot_sorted_and_unique() {
        let mut registry = create_registry();
        let now = Instant::now();

        registry.register("DEF-456", now);
        registry.register("ABC-123", now);
        registry.register("GHI-567", now);
        registry.register("ABC-123", now); // duplicate

        assert_eq!(registry.snapshot(), vec!["ABC-123", "DEF-456", "GHI-567"]);
    }

    #[test]
    fn test_snapshot_empty() {
        let registry = create_registry();
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut registry = create_registry();
        let now = Instant::now();

        registry.register("ABC-123", now);
        registry.register("DEF-456", now);
        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }
}
