//! Core constants for the four-factor door controller.
//!
//! This module centralizes the default policy values used throughout the
//! quadlock workspace: retry budgets, timing windows, credential limits and
//! the fallback credential set written on first start.
//!
//! # Usage
//!
//! Constants are organized by category for easy discovery:
//!
//! ```
//! use quadlock_core::constants::*;
//!
//! assert_eq!(DEFAULT_MAX_ATTEMPTS, 5);
//!
//! fn passcode_length_ok(code: &str) -> bool {
//!     (MIN_PASSCODE_LENGTH..=MAX_PASSCODE_LENGTH).contains(&code.len())
//! }
//! assert!(passcode_length_ok("1234"));
//! ```
//!
//! All durations are expressed in milliseconds so they can be stored in the
//! JSON configuration file without a custom serializer.

// ============================================================================
// Retry Policy
// ============================================================================

/// Attempt budget for the fingerprint, card and passcode factors.
///
/// Reaching this many failures on one factor sends the session into lockout.
/// The face factor deliberately has no budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Consecutive face matches required before the face factor passes.
pub const DEFAULT_REQUIRED_CONSECUTIVE_FACE_MATCHES: u32 = 5;

/// Consecutive sensor faults on one step that raise an operator alert.
pub const DEFAULT_SENSOR_FAULT_ALERT_THRESHOLD: u32 = 3;

// ============================================================================
// Timing (milliseconds)
// ============================================================================

/// Interval between face polls (~33 frames per second).
pub const DEFAULT_FACE_POLL_INTERVAL_MS: u64 = 30;

/// How long one fingerprint poll waits for a finger.
pub const DEFAULT_FINGERPRINT_POLL_TIMEOUT_MS: u64 = 10_000;

/// How long one card poll waits for a card.
pub const DEFAULT_CARD_POLL_TIMEOUT_MS: u64 = 8_000;

/// Pause after a rejected fingerprint or card reading before polling again.
pub const DEFAULT_FACTOR_RETRY_DELAY_MS: u64 = 1_000;

/// How long the door stays passable after a successful authentication.
pub const DEFAULT_LOCK_OPEN_DURATION_MS: u64 = 3_000;

/// Delay between relocking the door and restarting authentication.
pub const DEFAULT_RELOCK_RESTART_DELAY_MS: u64 = 2_000;

/// Delay between entering lockout and restarting authentication.
pub const DEFAULT_LOCKOUT_DELAY_MS: u64 = 3_000;

/// Delay before the passcode prompt is shown again after a wrong code.
pub const DEFAULT_PASSCODE_REPROMPT_DELAY_MS: u64 = 1_500;

/// Delay between process start and the first authentication cycle.
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 3_000;

/// Per-impression capture timeout during fingerprint enrollment.
pub const DEFAULT_ENROLLMENT_CAPTURE_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Face Training
// ============================================================================

/// Successful captures required to enroll a face.
pub const DEFAULT_FACE_TRAINING_SAMPLES: u32 = 20;

/// Upper bound on capture attempts while collecting face training samples.
pub const DEFAULT_FACE_TRAINING_MAX_ATTEMPTS: u32 = 60;

// ============================================================================
// Credential Limits
// ============================================================================

/// Minimum passcode length (digits).
pub const MIN_PASSCODE_LENGTH: usize = 4;

/// Maximum passcode length (digits).
pub const MAX_PASSCODE_LENGTH: usize = 8;

/// Minimum card UID length in bytes (ISO 14443 single size UID).
pub const MIN_CARD_UID_LENGTH: usize = 4;

/// Maximum card UID length in bytes (ISO 14443 triple size UID).
pub const MAX_CARD_UID_LENGTH: usize = 10;

// ============================================================================
// Factory Defaults
// ============================================================================

/// Passcode written to a fresh credential store.
pub const DEFAULT_SYSTEM_PASSCODE: &str = "1234";

/// Card authorized in a fresh credential store.
pub const DEFAULT_CARD_UID: [u8; 4] = [0x1b, 0x93, 0xf2, 0x3c];

/// Fingerprint slots recorded in a fresh credential store.
pub const DEFAULT_FINGERPRINT_SLOTS: [u16; 3] = [1, 2, 3];

/// Card UID that opens the administrative path.
pub const DEFAULT_ADMIN_CARD_UID: [u8; 4] = [0xe5, 0xa8, 0xbd, 0x02];

/// Secondary password required for the administrative path.
pub const DEFAULT_ADMIN_PASSWORD: &str = "0809";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_passcode_within_limits() {
        let len = DEFAULT_SYSTEM_PASSCODE.len();
        assert!((MIN_PASSCODE_LENGTH..=MAX_PASSCODE_LENGTH).contains(&len));
        assert!(DEFAULT_SYSTEM_PASSCODE.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_default_admin_password_within_limits() {
        let len = DEFAULT_ADMIN_PASSWORD.len();
        assert!((MIN_PASSCODE_LENGTH..=MAX_PASSCODE_LENGTH).contains(&len));
    }

    #[test]
    fn test_default_uids_within_limits() {
        for len in [DEFAULT_CARD_UID.len(), DEFAULT_ADMIN_CARD_UID.len()] {
            assert!((MIN_CARD_UID_LENGTH..=MAX_CARD_UID_LENGTH).contains(&len));
        }
        assert_ne!(DEFAULT_CARD_UID, DEFAULT_ADMIN_CARD_UID);
    }

    #[test]
    fn test_face_polls_near_thirty_per_second() {
        assert!(DEFAULT_FACE_POLL_INTERVAL_MS <= 50);
    }
}
