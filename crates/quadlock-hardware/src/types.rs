//! Common types shared across adapter implementations.
//!
//! This module defines the verdict returned by every verifier poll, the
//! face frame forwarded to the presentation layer, and small hardware
//! descriptors such as device information and relay polarity.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generic device information.
///
/// Contains metadata about a hardware device such as name, model,
/// serial number, and firmware version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "PN532", "Simulated Camera").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Optional device serial number.
    pub serial_number: Option<String>,

    /// Optional firmware version string.
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            serial_number: None,
            firmware_version: None,
        }
    }

    /// Set the serial number.
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

/// Outcome of one verifier poll.
///
/// The identity type depends on the adapter: a person name for the face
/// verifier, a template slot for the fingerprint verifier and a card UID
/// for the card reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<I> {
    /// Nothing was presented to the sensor.
    NoSignal,

    /// Something was presented but is not authorized.
    Mismatch {
        /// Optional matcher confidence (0.0-100.0).
        confidence: Option<f32>,
    },

    /// Something authorized was presented.
    Match {
        /// Who or what matched.
        identity: I,

        /// Optional matcher confidence (0.0-100.0).
        confidence: Option<f32>,
    },

    /// The sensor could not be read this time.
    SensorError {
        /// Fault description for logs and the operator.
        message: String,
    },
}

impl<I> Verdict<I> {
    /// Create a match without a confidence score.
    pub fn matched(identity: I) -> Self {
        Self::Match {
            identity,
            confidence: None,
        }
    }

    /// Create a mismatch without a confidence score.
    pub fn mismatch() -> Self {
        Self::Mismatch { confidence: None }
    }

    /// Short lowercase label used in logs and status events.
    pub fn kind(&self) -> VerdictKind {
        match self {
            Self::NoSignal => VerdictKind::NoSignal,
            Self::Mismatch { .. } => VerdictKind::Mismatch,
            Self::Match { .. } => VerdictKind::Match,
            Self::SensorError { .. } => VerdictKind::SensorError,
        }
    }

    /// Whether this verdict is a match.
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }
}

/// Identity-free discriminant of a [`Verdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    NoSignal,
    Mismatch,
    Match,
    SensorError,
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VerdictKind::NoSignal => "no signal",
            VerdictKind::Mismatch => "mismatch",
            VerdictKind::Match => "match",
            VerdictKind::SensorError => "sensor error",
        };
        write!(f, "{}", label)
    }
}

/// One camera frame, forwarded untouched to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceFrame {
    /// Monotonic frame counter of the capturing device.
    pub sequence: u64,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Raw pixel data in the device's native format.
    pub pixels: Bytes,

    /// Capture time.
    pub captured_at: DateTime<Utc>,
}

/// Result of one face poll: the verdict plus the frame it was made on.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    /// Verification verdict for this frame.
    pub verdict: Verdict<String>,

    /// Frame the verdict was made on, when the camera produced one.
    pub frame: Option<FaceFrame>,
}

impl FaceObservation {
    pub fn new(verdict: Verdict<String>, frame: Option<FaceFrame>) -> Self {
        Self { verdict, frame }
    }
}

/// A cropped face image collected while enrolling a person.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSample {
    /// Encoded face crop.
    pub pixels: Bytes,
}

/// Sensor-side image buffer used by the two-impression enrollment protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureBuffer {
    /// Buffer holding the first impression.
    First,

    /// Buffer holding the second impression.
    Second,
}

/// Electrical polarity of the lock relay.
///
/// Solenoid strikes differ: some are locked while the coil is energized,
/// others while it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayPolarity {
    /// Coil energized means locked (the default wiring).
    #[default]
    EnergizeToLock,

    /// Coil energized means unlocked.
    EnergizeToUnlock,
}

impl RelayPolarity {
    /// Coil state that puts the door in the requested state.
    pub fn energized_for(&self, locked: bool) -> bool {
        match self {
            RelayPolarity::EnergizeToLock => locked,
            RelayPolarity::EnergizeToUnlock => !locked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_builder() {
        let info = DeviceInfo::new("AS608", "Optical Fingerprint Sensor")
            .with_serial_number("123456789")
            .with_firmware_version("v2.0.1");

        assert_eq!(info.name, "AS608");
        assert_eq!(info.model, "Optical Fingerprint Sensor");
        assert_eq!(info.serial_number, Some("123456789".to_string()));
        assert_eq!(info.firmware_version, Some("v2.0.1".to_string()));
    }

    #[test]
    fn test_verdict_kind() {
        assert_eq!(Verdict::<u16>::NoSignal.kind(), VerdictKind::NoSignal);
        assert_eq!(Verdict::<u16>::mismatch().kind(), VerdictKind::Mismatch);
        assert_eq!(Verdict::matched(4u16).kind(), VerdictKind::Match);
        assert!(Verdict::matched(4u16).is_match());
        assert!(!Verdict::<u16>::mismatch().is_match());
    }

    #[test]
    fn test_relay_polarity() {
        assert!(RelayPolarity::EnergizeToLock.energized_for(true));
        assert!(!RelayPolarity::EnergizeToLock.energized_for(false));
        assert!(!RelayPolarity::EnergizeToUnlock.energized_for(true));
        assert!(RelayPolarity::EnergizeToUnlock.energized_for(false));
    }

    #[test]
    fn test_relay_polarity_serialization() {
        let json = serde_json::to_string(&RelayPolarity::EnergizeToUnlock).unwrap();
        assert_eq!(json, "\"energize_to_unlock\"");
        let parsed: RelayPolarity = serde_json::from_str("\"energize_to_lock\"").unwrap();
        assert_eq!(parsed, RelayPolarity::EnergizeToLock);
    }
}
