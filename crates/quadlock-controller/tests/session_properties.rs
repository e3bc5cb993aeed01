//! Property-based tests for the authentication state machine.
//!
//! Random verdict sequences are fed into [`AuthSession`] and the step,
//! counters and epoch are checked against a direct model of the rules.

use proptest::prelude::*;
use quadlock_controller::session::{AuthSession, AuthStep, Reading, SessionPolicy, TimerKind};

/// Strategy for any verdict a polling worker can deliver.
fn reading() -> impl Strategy<Value = Reading> {
    prop_oneof![
        3 => Just(Reading::Accepted),
        2 => Just(Reading::Rejected),
        2 => Just(Reading::NoSignal),
        1 => Just(Reading::SensorError("bus timeout".to_string())),
    ]
}

/// Strategy for verdicts that never pass a factor.
fn failure() -> impl Strategy<Value = Reading> {
    prop_oneof![
        Just(Reading::Rejected),
        Just(Reading::NoSignal),
        Just(Reading::SensorError("checksum".to_string())),
    ]
}

fn policy(max_attempts: u32, required_face_matches: u32) -> SessionPolicy {
    SessionPolicy {
        max_attempts,
        required_face_matches,
        ..SessionPolicy::default()
    }
}

fn session_at_card(policy: SessionPolicy) -> AuthSession {
    let mut session = AuthSession::new(policy);
    session.start();
    let epoch = session.epoch();
    for _ in 0..session.policy().required_face_matches {
        session.on_face(epoch, Reading::Accepted);
    }
    session.on_fingerprint(epoch, Reading::Accepted);
    assert_eq!(session.step(), AuthStep::Card);
    session
}

proptest! {
    /// Property: the face step is left exactly when `required` matches
    /// arrive back to back, and never earlier.
    #[test]
    fn prop_face_streak_advances_only_on_consecutive_matches(
        required in 1u32..=8,
        readings in prop::collection::vec(reading(), 0..60),
    ) {
        let mut session = AuthSession::new(policy(5, required));
        session.start();
        let epoch = session.epoch();

        let mut streak = 0;
        let mut expected_exit = None;
        for (index, reading) in readings.iter().enumerate() {
            streak = if *reading == Reading::Accepted { streak + 1 } else { 0 };
            if streak == required {
                expected_exit = Some(index);
                break;
            }
        }

        for (index, reading) in readings.into_iter().enumerate() {
            session.on_face(epoch, reading);
            if session.step() != AuthStep::Face {
                prop_assert_eq!(Some(index), expected_exit);
                break;
            }
            prop_assert!(session.consecutive_face_matches() < required);
        }

        match expected_exit {
            Some(_) => prop_assert_eq!(session.step(), AuthStep::Fingerprint),
            None => prop_assert_eq!(session.step(), AuthStep::Face),
        }
        prop_assert_eq!(session.epoch(), epoch);
    }

    /// Property: attempts never exceed the budget, and lockout happens iff
    /// the budget ran out before an accepted card.
    #[test]
    fn prop_card_attempts_bounded(
        max_attempts in 1u32..=6,
        readings in prop::collection::vec(reading(), 1..20),
    ) {
        let mut session = session_at_card(policy(max_attempts, 2));
        let epoch = session.epoch();

        let failures_before_accept = readings
            .iter()
            .take_while(|r| **r != Reading::Accepted)
            .count() as u32;

        for reading in readings {
            session.on_card(epoch, reading);
            prop_assert!(session.attempts().card <= max_attempts);
        }

        if failures_before_accept >= max_attempts {
            prop_assert_eq!(session.step(), AuthStep::Lockout);
            prop_assert_eq!(session.attempts().card, max_attempts);
        } else {
            prop_assert_eq!(session.step(), AuthStep::Passcode);
            prop_assert_eq!(session.attempts().card, failures_before_accept);
        }
    }

    /// Property: after lockout, only the reset timer of the same epoch
    /// brings the session back, with a fresh epoch and zeroed counters.
    #[test]
    fn prop_lockout_reset_starts_fresh_epoch(
        max_attempts in 1u32..=5,
        failures in prop::collection::vec(failure(), 5..10),
    ) {
        let mut session = session_at_card(policy(max_attempts, 1));
        let epoch = session.epoch();

        for reading in failures {
            session.on_card(epoch, reading);
        }
        prop_assert_eq!(session.step(), AuthStep::Lockout);

        session.on_timer(epoch - 1, TimerKind::LockoutReset);
        prop_assert_eq!(session.step(), AuthStep::Lockout);

        session.on_timer(epoch, TimerKind::LockoutReset);
        prop_assert_eq!(session.step(), AuthStep::Face);
        prop_assert_eq!(session.epoch(), epoch + 1);
        prop_assert_eq!(session.attempts().card, 0);
    }

    /// Property: verdicts from an older epoch never change the session.
    #[test]
    fn prop_stale_verdicts_ignored(
        restarts in 1u64..=4,
        readings in prop::collection::vec(reading(), 1..30),
    ) {
        let mut session = AuthSession::new(policy(3, 1));
        session.start();
        let stale = session.epoch();
        for _ in 0..restarts {
            session.start();
        }
        let before = (session.step(), session.epoch(), session.consecutive_face_matches());

        for reading in readings {
            session.on_face(stale, reading.clone());
            session.on_fingerprint(stale, reading.clone());
            session.on_card(stale, reading);
        }

        prop_assert_eq!(
            (session.step(), session.epoch(), session.consecutive_face_matches()),
            before
        );
    }
}
