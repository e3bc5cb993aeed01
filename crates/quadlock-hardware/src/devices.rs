//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits (RPITIT, Rust Edition 2024) are not
//! object-safe, so the controller cannot hold a `Box<dyn FaceVerifier>`.
//! These enums give it one concrete type per device role instead, chosen at
//! process composition. Only simulated variants exist today; a physical
//! driver becomes one more variant.
//!
//! # Examples
//!
//! ```
//! use quadlock_hardware::devices::AnyCardVerifier;
//! use quadlock_hardware::sim::SimCard;
//!
//! let (reader, _handle) = SimCard::new();
//! let any_reader = AnyCardVerifier::Simulated(reader);
//! ```

use crate::sim::{SimCard, SimFace, SimFingerprint, SimKeypad, SimRelay};
use crate::traits::{CardVerifier, FaceVerifier, FingerprintVerifier, KeypadDevice, LockRelay};
use crate::types::{CaptureBuffer, DeviceInfo, FaceObservation, FaceSample, Verdict};
use crate::{KeypadInput, Result};
use quadlock_core::{CardUid, FingerprintSlot};
use std::time::Duration;

/// Enum wrapper for face verifier dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyFaceVerifier {
    /// Simulated camera for development and testing.
    Simulated(SimFace),
}

impl FaceVerifier for AnyFaceVerifier {
    async fn poll(&mut self) -> Result<FaceObservation> {
        match self {
            Self::Simulated(device) => device.poll().await,
        }
    }

    async fn capture_sample(&mut self) -> Result<Option<FaceSample>> {
        match self {
            Self::Simulated(device) => device.capture_sample().await,
        }
    }

    async fn enroll(&mut self, name: &str, samples: Vec<FaceSample>) -> Result<()> {
        match self {
            Self::Simulated(device) => device.enroll(name, samples).await,
        }
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Simulated(device) => device.get_device_info().await,
        }
    }
}

/// Enum wrapper for fingerprint verifier dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyFingerprintVerifier {
    /// Simulated sensor for development and testing.
    Simulated(SimFingerprint),
}

impl FingerprintVerifier for AnyFingerprintVerifier {
    async fn poll(&mut self, timeout: Duration) -> Result<Verdict<FingerprintSlot>> {
        match self {
            Self::Simulated(device) => device.poll(timeout).await,
        }
    }

    async fn capture_impression(
        &mut self,
        buffer: CaptureBuffer,
        timeout: Duration,
    ) -> Result<bool> {
        match self {
            Self::Simulated(device) => device.capture_impression(buffer, timeout).await,
        }
    }

    async fn wait_finger_lifted(&mut self, timeout: Duration) -> Result<bool> {
        match self {
            Self::Simulated(device) => device.wait_finger_lifted(timeout).await,
        }
    }

    async fn create_template(&mut self) -> Result<()> {
        match self {
            Self::Simulated(device) => device.create_template().await,
        }
    }

    async fn store_template(&mut self, slot: FingerprintSlot) -> Result<()> {
        match self {
            Self::Simulated(device) => device.store_template(slot).await,
        }
    }

    async fn delete_template(&mut self, slot: FingerprintSlot) -> Result<()> {
        match self {
            Self::Simulated(device) => device.delete_template(slot).await,
        }
    }

    async fn first_free_slot(&mut self) -> Result<Option<FingerprintSlot>> {
        match self {
            Self::Simulated(device) => device.first_free_slot().await,
        }
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Simulated(device) => device.get_device_info().await,
        }
    }
}

/// Enum wrapper for card reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCardVerifier {
    /// Simulated reader for development and testing.
    Simulated(SimCard),
}

impl CardVerifier for AnyCardVerifier {
    async fn poll(&mut self, timeout: Duration) -> Result<Verdict<CardUid>> {
        match self {
            Self::Simulated(device) => device.poll(timeout).await,
        }
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Simulated(device) => device.get_device_info().await,
        }
    }
}

/// Enum wrapper for keypad dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyKeypadDevice {
    /// Simulated keypad for development and testing.
    Simulated(SimKeypad),
}

impl KeypadDevice for AnyKeypadDevice {
    async fn read_input(&mut self) -> Result<KeypadInput> {
        match self {
            Self::Simulated(device) => device.read_input().await,
        }
    }

    async fn beep(&mut self, duration_ms: u16) -> Result<()> {
        match self {
            Self::Simulated(device) => device.beep(duration_ms).await,
        }
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Simulated(device) => device.get_device_info().await,
        }
    }
}

/// Enum wrapper for lock relay dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLockRelay {
    /// Simulated relay for development and testing.
    Simulated(SimRelay),
}

impl LockRelay for AnyLockRelay {
    async fn set_energized(&mut self, energized: bool) -> Result<()> {
        match self {
            Self::Simulated(device) => device.set_energized(energized).await,
        }
    }

    async fn is_energized(&self) -> Result<bool> {
        match self {
            Self::Simulated(device) => device.is_energized().await,
        }
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Simulated(device) => device.get_device_info().await,
        }
    }
}
