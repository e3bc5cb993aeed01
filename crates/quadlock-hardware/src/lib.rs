//! Hardware abstraction layer for the quadlock door controller.
//!
//! This crate defines the capability interfaces the authentication
//! orchestrator drives: three verifier adapters (face, fingerprint, card),
//! the keypad and the lock relay. Every adapter has a simulated
//! implementation with the same contract, so the controller runs end to end
//! on a desk.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All I/O operations are asynchronous using native `async fn`
//!   in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Verdicts, not algorithms**: a verifier poll returns a [`Verdict`]; how
//!   the match was computed stays inside the adapter.
//! - **Enum dispatch**: the traits are not object-safe, so the
//!   [`devices`] module wraps implementations in `Any*` enums selected at
//!   composition time.
//! - **Error-aware**: All operations return `Result<T>` with a
//!   [`HardwareError`] that knows whether it is transient.
//!
//! # Verifier Adapters
//!
//! ```no_run
//! use quadlock_hardware::traits::CardVerifier;
//! use quadlock_hardware::{Result, Verdict};
//! use std::time::Duration;
//!
//! async fn wait_for_card<C: CardVerifier>(reader: &mut C) -> Result<Option<String>> {
//!     match reader.poll(Duration::from_secs(8)).await? {
//!         Verdict::Match { identity, .. } => Ok(Some(identity.to_string())),
//!         _ => Ok(None),
//!     }
//! }
//! ```
//!
//! # Simulated Devices
//!
//! The [`sim`] module provides devices paired with handles that inject what
//! the sensor sees: a face in front of the camera, a finger on the sensor,
//! a card in the field or a key press.

pub mod devices;
pub mod error;
pub mod sim;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::{
    AnyCardVerifier, AnyFaceVerifier, AnyFingerprintVerifier, AnyKeypadDevice, AnyLockRelay,
};
pub use error::{HardwareError, Result};
pub use traits::{CardVerifier, FaceVerifier, FingerprintVerifier, KeypadDevice, KeypadInput, LockRelay};
pub use types::{
    CaptureBuffer, DeviceInfo, FaceFrame, FaceObservation, FaceSample, RelayPolarity, Verdict,
    VerdictKind,
};
