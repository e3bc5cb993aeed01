//! Simulated keypad.

use crate::{
    HardwareError, Result,
    traits::{KeypadDevice, KeypadInput},
    types::DeviceInfo,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;

/// Simulated keypad fed through an internal channel.
///
/// # Examples
///
/// ```
/// use quadlock_hardware::sim::SimKeypad;
/// use quadlock_hardware::traits::{KeypadDevice, KeypadInput};
///
/// #[tokio::main]
/// async fn main() -> quadlock_hardware::Result<()> {
///     let (mut keypad, handle) = SimKeypad::new();
///
///     handle.type_digits("12").await?;
///     handle.send_input(KeypadInput::Enter).await?;
///
///     assert_eq!(keypad.read_input().await?, KeypadInput::Digit(1));
///     assert_eq!(keypad.read_input().await?, KeypadInput::Digit(2));
///     assert_eq!(keypad.read_input().await?, KeypadInput::Enter);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SimKeypad {
    /// Channel receiver for simulated input
    input_rx: mpsc::Receiver<KeypadInput>,

    /// Number of beeps emitted, shared with the handle
    beeps: Arc<AtomicU32>,

    /// Device name
    name: String,
}

impl SimKeypad {
    /// Create a new simulated keypad with the default name.
    pub fn new() -> (Self, SimKeypadHandle) {
        Self::with_name("Simulated Keypad".to_string())
    }

    /// Create a new simulated keypad with a custom name.
    pub fn with_name(name: String) -> (Self, SimKeypadHandle) {
        let (input_tx, input_rx) = mpsc::channel(32);
        let beeps = Arc::new(AtomicU32::new(0));

        let keypad = Self {
            input_rx,
            beeps: Arc::clone(&beeps),
            name: name.clone(),
        };

        let handle = SimKeypadHandle {
            input_tx,
            beeps,
            name,
        };

        (keypad, handle)
    }
}

impl Default for SimKeypad {
    fn default() -> Self {
        Self::new().0
    }
}

impl KeypadDevice for SimKeypad {
    async fn read_input(&mut self) -> Result<KeypadInput> {
        self.input_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("Keypad input channel closed"))
    }

    async fn beep(&mut self, _duration_ms: u16) -> Result<()> {
        self.beeps.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Simulated Keypad v1.0").with_firmware_version("1.0.0"))
    }
}

/// Handle for controlling a simulated keypad. It can be cloned and shared
/// across tasks.
#[derive(Debug, Clone)]
pub struct SimKeypadHandle {
    /// Channel sender for simulated input
    input_tx: mpsc::Sender<KeypadInput>,

    beeps: Arc<AtomicU32>,

    /// Device name
    name: String,
}

impl SimKeypadHandle {
    /// Send an input event to the keypad.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped and the channel is closed.
    pub async fn send_input(&self, input: KeypadInput) -> Result<()> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| HardwareError::disconnected("Keypad input channel closed"))
    }

    /// Press one digit key per character of `digits`.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-digit character or a closed channel.
    pub async fn type_digits(&self, digits: &str) -> Result<()> {
        for c in digits.chars() {
            let d = c
                .to_digit(10)
                .ok_or_else(|| HardwareError::invalid_data(format!("Not a digit: {c}")))?;
            self.send_input(KeypadInput::Digit(d as u8)).await?;
        }
        Ok(())
    }

    /// Number of beeps the keypad has emitted.
    pub fn beep_count(&self) -> u32 {
        self.beeps.load(Ordering::Relaxed)
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sim_keypad_type_digits() {
        let (mut keypad, handle) = SimKeypad::new();

        handle.type_digits("907").await.unwrap();

        assert_eq!(keypad.read_input().await.unwrap(), KeypadInput::Digit(9));
        assert_eq!(keypad.read_input().await.unwrap(), KeypadInput::Digit(0));
        assert_eq!(keypad.read_input().await.unwrap(), KeypadInput::Digit(7));
    }

    #[tokio::test]
    async fn test_sim_keypad_rejects_non_digits() {
        let (_keypad, handle) = SimKeypad::new();
        assert!(handle.type_digits("1a").await.is_err());
    }

    #[tokio::test]
    async fn test_sim_keypad_beep_count() {
        let (mut keypad, handle) = SimKeypad::new();

        keypad.beep(50).await.unwrap();
        keypad.beep(50).await.unwrap();
        assert_eq!(handle.beep_count(), 2);
    }

    #[tokio::test]
    async fn test_sim_keypad_channel_closed() {
        let (mut keypad, handle) = SimKeypad::new();
        drop(handle);

        assert!(keypad.read_input().await.is_err());
    }
}
