//! Hardware device trait definitions.
//!
//! This module defines the capability interfaces between the authentication
//! orchestrator and the peripherals around the door: the three verifier
//! adapters (face, fingerprint, card), the keypad and the lock relay. The
//! orchestrator only consumes verdicts; how a sensor reaches one is the
//! adapter's business.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{CaptureBuffer, DeviceInfo, FaceObservation, FaceSample, Verdict};
use quadlock_core::{CardUid, FingerprintSlot};
use std::time::Duration;

/// Input from a keypad device.
///
/// Represents all possible inputs that can be received from the door
/// keypad, including digits and the special keys used as hotkeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeypadInput {
    /// Numeric digit (0-9).
    Digit(u8),

    /// Star key (*), the admin hotkey.
    Star,

    /// Hash/pound key (#), the start hotkey.
    Hash,

    /// Enter/confirm key.
    Enter,

    /// Cancel operation key.
    Cancel,

    /// Clear input key.
    Clear,
}

/// Face verifier abstraction.
///
/// Wraps a camera plus an opaque face matcher. Each [`poll`](Self::poll)
/// grabs one frame and returns the verdict together with the frame, which
/// the orchestrator forwards to the presentation layer.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters, or the enum wrappers from the
/// [`devices`](crate::devices) module for runtime selection.
///
/// # Examples
///
/// ```no_run
/// use quadlock_hardware::traits::FaceVerifier;
/// use quadlock_hardware::error::Result;
///
/// async fn wait_for_match<F: FaceVerifier>(camera: &mut F) -> Result<String> {
///     loop {
///         let observation = camera.poll().await?;
///         if let quadlock_hardware::Verdict::Match { identity, .. } = observation.verdict {
///             return Ok(identity);
///         }
///     }
/// }
/// ```
pub trait FaceVerifier: Send {
    /// Grab one frame and judge it.
    ///
    /// Returns immediately; the caller paces the polling interval.
    async fn poll(&mut self) -> Result<FaceObservation>;

    /// Capture one cropped face for enrollment.
    ///
    /// Returns `Ok(None)` when no single face was found in the frame.
    async fn capture_sample(&mut self) -> Result<Option<FaceSample>>;

    /// Teach the matcher a new person from collected samples.
    async fn enroll(&mut self, name: &str, samples: Vec<FaceSample>) -> Result<()>;

    /// Get device information.
    async fn get_device_info(&self) -> Result<DeviceInfo>;
}

/// Fingerprint verifier abstraction.
///
/// Besides matching, the sensor stores templates in numbered slots, so this
/// trait also carries the two-impression enrollment protocol: capture into
/// the first buffer, wait for the finger to lift, capture into the second
/// buffer, merge both into a template and store it at a caller-chosen slot.
pub trait FingerprintVerifier: Send {
    /// Wait up to `timeout` for a finger and search the template library.
    ///
    /// Returns [`Verdict::NoSignal`] when no finger arrived in time.
    async fn poll(&mut self, timeout: Duration) -> Result<Verdict<FingerprintSlot>>;

    /// Wait up to `timeout` for a finger and image it into `buffer`.
    ///
    /// Returns `Ok(false)` when no finger arrived in time.
    async fn capture_impression(&mut self, buffer: CaptureBuffer, timeout: Duration)
    -> Result<bool>;

    /// Wait up to `timeout` for the finger to leave the sensor.
    async fn wait_finger_lifted(&mut self, timeout: Duration) -> Result<bool>;

    /// Merge both capture buffers into one template.
    ///
    /// Fails with `BiometricCaptureError` when the impressions do not match.
    async fn create_template(&mut self) -> Result<()>;

    /// Store the merged template at `slot`.
    async fn store_template(&mut self, slot: FingerprintSlot) -> Result<()>;

    /// Delete the template stored at `slot`.
    async fn delete_template(&mut self, slot: FingerprintSlot) -> Result<()>;

    /// Lowest slot not holding a template, or `None` when storage is full.
    async fn first_free_slot(&mut self) -> Result<Option<FingerprintSlot>>;

    /// Get device information.
    async fn get_device_info(&self) -> Result<DeviceInfo>;
}

/// Proximity card reader abstraction.
///
/// The reader only reports which UID it saw. Whether that card is authorized
/// is judged by the orchestrator against the credential store, so this
/// adapter never returns [`Verdict::Mismatch`].
pub trait CardVerifier: Send {
    /// Wait up to `timeout` for a card in the field.
    async fn poll(&mut self, timeout: Duration) -> Result<Verdict<CardUid>>;

    /// Get reader information.
    async fn get_device_info(&self) -> Result<DeviceInfo>;
}

/// Keypad device abstraction.
///
/// # Examples
///
/// ```no_run
/// use quadlock_hardware::traits::{KeypadDevice, KeypadInput};
/// use quadlock_hardware::error::Result;
///
/// async fn read_pin_code<K: KeypadDevice>(keypad: &mut K) -> Result<String> {
///     let mut code = String::new();
///
///     loop {
///         match keypad.read_input().await? {
///             KeypadInput::Digit(d) => code.push(char::from(b'0' + d)),
///             KeypadInput::Enter => return Ok(code),
///             KeypadInput::Clear => code.clear(),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait KeypadDevice: Send {
    /// Wait for the next key press.
    async fn read_input(&mut self) -> Result<KeypadInput>;

    /// Emit a short audible click.
    async fn beep(&mut self, duration_ms: u16) -> Result<()>;

    /// Get device information.
    async fn get_device_info(&self) -> Result<DeviceInfo>;
}

/// Lock relay abstraction.
///
/// The relay knows nothing about door semantics: the actuator decides which
/// coil state means "locked" from the configured polarity.
pub trait LockRelay: Send {
    /// Energize or release the coil.
    async fn set_energized(&mut self, energized: bool) -> Result<()>;

    /// Current coil state.
    async fn is_energized(&self) -> Result<bool>;

    /// Get device information.
    async fn get_device_info(&self) -> Result<DeviceInfo>;
}
