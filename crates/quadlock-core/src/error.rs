use std::fmt;

use thiserror::Error;

/// User-visible error type for the controller.
///
/// Every rejected operation surfaces as one of these variants. Each variant
/// belongs to exactly one [`ErrorCategory`], which tells the operator what to
/// do about it.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("Invalid passcode: {0}")]
    InvalidPasscode(String),

    #[error("Invalid card UID: {0}")]
    InvalidCardUid(String),

    #[error("Card {0} is already authorized")]
    DuplicateCard(String),

    #[error("Card {0} is not authorized")]
    UnknownCard(String),

    #[error("Fingerprint slot {0} is already enrolled")]
    DuplicateFingerprint(u16),

    #[error("Fingerprint slot {0} is not enrolled")]
    UnknownFingerprint(u16),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Admin session is not active")]
    SessionClosed,

    // Transient sensor errors
    #[error("Sensor fault: {0}")]
    SensorFault(String),

    #[error("No {0} detected before timeout")]
    NothingPresented(String),

    #[error("Insufficient samples: captured {captured} of {required}")]
    InsufficientSamples { captured: u32, required: u32 },

    // Fatal hardware errors
    #[error("Hardware fault: {0}")]
    Hardware(String),

    #[error("Fingerprint sensor storage exhausted")]
    StorageExhausted,

    #[error("Controller stopped")]
    ControllerStopped,

    // Persistence errors
    #[error("Persistence failed: {0}")]
    Persistence(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Operator-facing classification of an [`Error`].
///
/// The remediation differs per category: transient faults are retried,
/// fatal faults need a technician, persistence faults need storage to be
/// checked and validation faults need corrected input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// No signal, read timeout or a momentary I/O error.
    Transient,

    /// Hardware that failed to initialize or stopped responding.
    Fatal,

    /// The credential store could not be written.
    Persistence,

    /// Malformed input or a duplicate/absent credential.
    Validation,
}

impl ErrorCategory {
    /// Short remediation hint shown next to the error message.
    pub fn remediation(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "retry",
            ErrorCategory::Fatal => "call a technician",
            ErrorCategory::Persistence => "check storage, then retry",
            ErrorCategory::Validation => "fix input",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Fatal => "fatal",
            ErrorCategory::Persistence => "persistence",
            ErrorCategory::Validation => "validation",
        };
        write!(f, "{}", name)
    }
}

impl Error {
    /// Classify this error for the operator.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidPasscode(_)
            | Error::InvalidCardUid(_)
            | Error::DuplicateCard(_)
            | Error::UnknownCard(_)
            | Error::DuplicateFingerprint(_)
            | Error::UnknownFingerprint(_)
            | Error::InvalidName(_)
            | Error::SessionClosed
            | Error::Config(_) => ErrorCategory::Validation,
            Error::SensorFault(_)
            | Error::NothingPresented(_)
            | Error::InsufficientSamples { .. } => ErrorCategory::Transient,
            Error::Hardware(_) | Error::StorageExhausted | Error::ControllerStopped => {
                ErrorCategory::Fatal
            }
            Error::Persistence(_) | Error::Io(_) => ErrorCategory::Persistence,
        }
    }

    /// Message suitable for an operator display: category, cause and hint.
    pub fn operator_message(&self) -> String {
        let category = self.category();
        format!("[{}] {} ({})", category, self, category.remediation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::InvalidPasscode("too short".into()), ErrorCategory::Validation)]
    #[case(Error::DuplicateCard("E5:A8:BD:02".into()), ErrorCategory::Validation)]
    #[case(Error::UnknownFingerprint(7), ErrorCategory::Validation)]
    #[case(Error::SensorFault("i2c nak".into()), ErrorCategory::Transient)]
    #[case(Error::NothingPresented("card".into()), ErrorCategory::Transient)]
    #[case(Error::StorageExhausted, ErrorCategory::Fatal)]
    #[case(Error::Hardware("relay stuck".into()), ErrorCategory::Fatal)]
    #[case(Error::Persistence("disk full".into()), ErrorCategory::Persistence)]
    fn test_error_category(#[case] error: Error, #[case] expected: ErrorCategory) {
        assert_eq!(error.category(), expected);
    }

    #[test]
    fn test_categories_have_distinct_remediation() {
        let hints = [
            ErrorCategory::Transient.remediation(),
            ErrorCategory::Fatal.remediation(),
            ErrorCategory::Persistence.remediation(),
            ErrorCategory::Validation.remediation(),
        ];
        for (i, a) in hints.iter().enumerate() {
            for b in &hints[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_operator_message() {
        let error = Error::UnknownCard("1B:93:F2:3C".into());
        assert_eq!(
            error.operator_message(),
            "[validation] Card 1B:93:F2:3C is not authorized (fix input)"
        );
    }
}
