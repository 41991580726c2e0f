//! Notification policy
//!
//! Pure derivation of outbound notifications from a train transition and the
//! vehicle snapshot taken in the same critical section. No I/O and no state:
//! identical inputs produce the identical notification sequence.
//!
//! Rules:
//! - First registration at an idle crossing: one broadcast PassSlowly
//! - Crossing enters Arriving: one targeted Stop per registered plate in
//!   snapshot order, then one broadcast Stop appended last
//! - Second train registers while one is arriving: one broadcast LookAround,
//!   Stop is not repeated
//! - Everything else (re-registration, arrival confirmation, clearance):
//!   nothing

use crate::domain::types::{Notification, NotificationLevel};
use crate::services::train_state::TrainTransition;
use smallvec::SmallVec;

/// Notification sequence for one applied transition, in dispatch order
pub fn decide(transition: &TrainTransition, snapshot: &[String]) -> SmallVec<[Notification; 4]> {
    let mut notifications = SmallVec::new();

    if transition.first_registration {
        notifications.push(Notification::broadcast(NotificationLevel::PassSlowly));
    }

    if transition.entered_arriving() {
        for plate in snapshot {
            notifications.push(Notification::targeted(plate.clone(), NotificationLevel::Stop));
        }
        // Broadcast catches vehicles that never reported in
        notifications.push(Notification::broadcast(NotificationLevel::Stop));
    }

    if transition.second_train_during_arrival {
        notifications.push(Notification::broadcast(NotificationLevel::LookAround));
    }

    notifications
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::TrainState;

    fn transition(before: TrainState, after: TrainState) -> TrainTransition {
        TrainTransition {
            before,
            after,
            first_registration: false,
            second_train_during_arrival: false,
        }
    }

    fn plates(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_first_registration_single_pass_slowly_broadcast() {
        let mut t = transition(TrainState::Idle, TrainState::Registered);
        t.first_registration = true;

        let notifications = decide(&t, &plates(&["ABC-123", "DEF-456"]));

        // Vehicles present do not change the announcement
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0],
            Notification::broadcast(NotificationLevel::PassSlowly)
        );
    }

    #[test]
    fn test_arriving_targets_each_plate_then_broadcast_last() {
        let t = transition(TrainState::Registered, TrainState::Arriving);

        let notifications = decide(&t, &plates(&["ABC-123", "DEF-456"]));

        assert_eq!(notifications.len(), 3);
        assert_eq!(
            notifications[0],
            Notification::targeted("ABC-123", NotificationLevel::Stop)
        );
        assert_eq!(
            notifications[1],
            Notification::targeted("DEF-456", NotificationLevel::Stop)
        );
        assert_eq!(
            notifications[2],
            Notification::broadcast(NotificationLevel::Stop)
        );
    }

    #[test]
    fn test_arriving_with_empty_intersection_still_broadcasts_stop() {
        let t = transition(TrainState::Registered, TrainState::Arriving);

        let notifications = decide(&t, &[]);

        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0],
            Notification::broadcast(NotificationLevel::Stop)
        );
    }

    #[test]
    fn test_arriving_from_idle_treated_like_registered() {
        let from_idle = decide(
            &transition(TrainState::Idle, TrainState::Arriving),
            &plates(&["ABC-123"]),
        );
        let from_registered = decide(
            &transition(TrainState::Registered, TrainState::Arriving),
            &plates(&["ABC-123"]),
        );

        assert_eq!(from_idle, from_registered);
    }

    #[test]
    fn test_second_train_single_look_around() {
        let mut t = transition(TrainState::Arriving, TrainState::Arriving);
        t.second_train_during_arrival = true;

        let notifications = decide(&t, &plates(&["ABC-123", "DEF-456"]));

        // LookAround only, the earlier Stop is not repeated
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0],
            Notification::broadcast(NotificationLevel::LookAround)
        );
    }

    #[test]
    fn test_reregistration_is_silent() {
        let t = transition(TrainState::Registered, TrainState::Registered);

        assert!(decide(&t, &plates(&["ABC-123"])).is_empty());
    }

    #[test]
    fn test_arrival_confirmation_is_silent() {
        let t = transition(TrainState::Arriving, TrainState::Arriving);

        assert!(decide(&t, &plates(&["ABC-123"])).is_empty());
    }

    #[test]
    fn test_clearance_is_silent() {
        for before in [TrainState::Idle, TrainState::Registered, TrainState::Arriving] {
            let t = transition(before, TrainState::Idle);
            assert!(decide(&t, &plates(&["ABC-123"])).is_empty());
        }
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let t = transition(TrainState::Registered, TrainState::Arriving);
        let snapshot = plates(&["ABC-123", "DEF-456", "GHI-567"]);

        assert_eq!(decide(&t, &snapshot), decide(&t, &snapshot));
    }
}
