//! Error types for hardware operations.
//!
//! This module defines error types specific to sensor and actuator
//! operations. Errors are split into transient faults, which the polling
//! boundary reports as a `SensorError` verdict and moves on from, and fatal
//! faults, which must be surfaced to the operator.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Biometric capture error.
    #[error("Biometric capture error: {message}")]
    BiometricCaptureError { message: String },

    /// Relay did not switch.
    #[error("Relay error: {message}")]
    RelayError { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new biometric capture error.
    pub fn biometric_capture(message: impl Into<String>) -> Self {
        Self::BiometricCaptureError {
            message: message.into(),
        }
    }

    /// Create a new relay error.
    pub fn relay(message: impl Into<String>) -> Self {
        Self::RelayError {
            message: message.into(),
        }
    }

    /// Whether the fault is momentary and the operation may simply be retried.
    ///
    /// Timeouts, bus noise, bad frames and failed captures are transient.
    /// Disconnection, failed initialization and relay faults are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::CommunicationError { .. }
                | Self::InvalidData { .. }
                | Self::BiometricCaptureError { .. }
                | Self::Io(_)
        )
    }
}

impl From<HardwareError> for quadlock_core::Error {
    fn from(error: HardwareError) -> Self {
        match error {
            e if e.is_transient() => quadlock_core::Error::SensorFault(e.to_string()),
            e => quadlock_core::Error::Hardware(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadlock_core::ErrorCategory;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("PN532");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: PN532");
        assert!(!error.is_transient());
    }

    #[test]
    fn test_timeout_error() {
        let error = HardwareError::timeout(3000);
        assert_eq!(error.to_string(), "Operation timeout after 3000ms");
        assert!(error.is_transient());
    }

    #[test]
    fn test_conversion_preserves_category() {
        let transient: quadlock_core::Error = HardwareError::communication("UART noise").into();
        assert_eq!(transient.category(), ErrorCategory::Transient);

        let fatal: quadlock_core::Error =
            HardwareError::initialization_failed("no camera").into();
        assert_eq!(fatal.category(), ErrorCategory::Fatal);
    }
}
