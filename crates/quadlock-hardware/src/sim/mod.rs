//! Simulated device implementations.
//!
//! Each simulated device comes paired with a handle that injects what the
//! sensor would see, so the controller can run end to end without hardware.

pub mod card;
pub mod face;
pub mod fingerprint;
pub mod keypad;
pub mod relay;

// Re-export commonly used types
pub use card::{SimCard, SimCardHandle};
pub use face::{FaceScene, SimFace, SimFaceHandle};
pub use fingerprint::{DEFAULT_TEMPLATE_CAPACITY, SimFingerprint, SimFingerprintHandle};
pub use keypad::{SimKeypad, SimKeypadHandle};
pub use relay::{SimRelay, SimRelayHandle};
