//! Simulated proximity card reader.
//!
//! This module provides a reader whose card presentations are driven
//! programmatically through a handle, for testing without hardware.

use crate::{
    HardwareError, Result,
    traits::CardVerifier,
    types::{DeviceInfo, Verdict},
};
use quadlock_core::CardUid;
use std::time::Duration;
use tokio::sync::mpsc;

/// Simulated card reader.
///
/// The reader reports every presented UID as a match; judging authorization
/// is left to the caller.
///
/// # Examples
///
/// ```
/// use quadlock_core::CardUid;
/// use quadlock_hardware::sim::SimCard;
/// use quadlock_hardware::traits::CardVerifier;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> quadlock_hardware::Result<()> {
///     let (mut reader, handle) = SimCard::new();
///     let uid = CardUid::new(vec![0x1b, 0x93, 0xf2, 0x3c]).unwrap();
///
///     handle.present_card(uid.clone()).await?;
///
///     let verdict = reader.poll(Duration::from_secs(1)).await?;
///     assert_eq!(verdict, quadlock_hardware::Verdict::matched(uid));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SimCard {
    /// Channel receiver for card events
    event_rx: mpsc::Receiver<CardEvent>,

    /// Device name
    name: String,
}

impl SimCard {
    /// Create a new simulated reader with the default name.
    pub fn new() -> (Self, SimCardHandle) {
        Self::with_name("Simulated Card Reader".to_string())
    }

    /// Create a new simulated reader with a custom name.
    pub fn with_name(name: String) -> (Self, SimCardHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);

        let reader = Self {
            event_rx,
            name: name.clone(),
        };

        let handle = SimCardHandle { event_tx, name };

        (reader, handle)
    }
}

impl Default for SimCard {
    fn default() -> Self {
        Self::new().0
    }
}

impl CardVerifier for SimCard {
    async fn poll(&mut self, timeout: Duration) -> Result<Verdict<CardUid>> {
        let event = match tokio::time::timeout(timeout, self.event_rx.recv()).await {
            Err(_) => return Ok(Verdict::NoSignal),
            Ok(event) => {
                event.ok_or_else(|| HardwareError::disconnected("Card event channel closed"))?
            }
        };

        match event {
            CardEvent::Presented(uid) => Ok(Verdict::matched(uid)),
            CardEvent::Fault(message) => Err(HardwareError::communication(message)),
        }
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Simulated ISO14443A Reader")
            .with_firmware_version("1.6"))
    }
}

/// Internal event type for the simulated reader.
#[derive(Debug, Clone)]
enum CardEvent {
    Presented(CardUid),
    Fault(String),
}

/// Handle for controlling a simulated card reader.
#[derive(Debug, Clone)]
pub struct SimCardHandle {
    /// Channel sender for card events
    event_tx: mpsc::Sender<CardEvent>,

    /// Device name
    name: String,
}

impl SimCardHandle {
    /// Hold a card in the reader's field.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped and the channel is closed.
    pub async fn present_card(&self, uid: CardUid) -> Result<()> {
        self.send(CardEvent::Presented(uid)).await
    }

    /// Make the next read fail with a bus error.
    pub async fn inject_fault(&self, message: impl Into<String>) -> Result<()> {
        self.send(CardEvent::Fault(message.into())).await
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: CardEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("Card event channel closed"))
    }
}
