//! Events published to the presentation layer.
//!
//! The orchestrator broadcasts a [`StatusEvent`] for everything a screen or
//! a buzzer might want to show. Subscribers that fall behind lose the oldest
//! events; the authoritative state is always the session snapshot.

use crate::actuator::DoorState;
use crate::session::AuthStep;
use quadlock_hardware::FaceFrame;
use std::fmt;

/// Named feedback cue rendered as a sound or a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feedback {
    Success,
    Error,
    Click,
    Warning,
    Startup,
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feedback::Success => "success",
            Feedback::Error => "error",
            Feedback::Click => "click",
            Feedback::Warning => "warning",
            Feedback::Startup => "startup",
        };
        write!(f, "{}", name)
    }
}

/// Input prompt the presentation layer should display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Ask for the unlock passcode.
    Passcode { attempts_left: u32 },

    /// Ask for the admin password.
    AdminPassword,
}

/// Status update from the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// Hardware is up; authentication starts after the startup delay.
    Ready { cards: usize, fingerprints: usize },

    /// The active step changed.
    StepChanged {
        from: AuthStep,
        to: AuthStep,
        epoch: u64,
    },

    /// One more consecutive face match was counted, or the streak broke.
    FaceProgress { consecutive: u32, required: u32 },

    /// Camera frame for display, forwarded untouched.
    FaceFrame(FaceFrame),

    /// A factor step passed.
    FactorPassed(AuthStep),

    /// A factor attempt failed.
    AttemptFailed {
        step: AuthStep,
        attempts: u32,
        remaining: u32,
    },

    /// Show an input prompt.
    PromptOpened(Prompt),

    /// Number of digits typed into the active prompt. Digits are never sent.
    EntryChanged { digits: usize },

    /// A sensor read failed on the given step.
    SensorFault {
        step: AuthStep,
        message: String,
        consecutive: u32,
    },

    /// Repeated sensor faults; the operator should check the hardware.
    SensorAlert { step: AuthStep, consecutive: u32 },

    /// Door unlocked; seconds until it relocks.
    CountdownTick { remaining_secs: u32 },

    DoorChanged(DoorState),

    /// Feedback cue.
    Feedback(Feedback),

    AdminSessionOpened,
    AdminSessionClosed,

    /// An operation was refused. The message carries category and remediation.
    Rejected { message: String },

    /// The orchestrator has shut down.
    Stopped,
}

impl From<Feedback> for StatusEvent {
    fn from(feedback: Feedback) -> Self {
        StatusEvent::Feedback(feedback)
    }
}

impl From<&quadlock_core::Error> for StatusEvent {
    fn from(error: &quadlock_core::Error) -> Self {
        StatusEvent::Rejected {
            message: error.operator_message(),
        }
    }
}
