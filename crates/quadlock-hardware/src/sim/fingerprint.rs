//! Simulated fingerprint sensor.
//!
//! Fingers are identified by name. Placing a finger sends an event to the
//! sensor; the template library maps slots to finger names and is shared
//! with the handle so tests can preload and inspect it. The simulated sensor
//! uses a touch model: a finger is gone as soon as its event is consumed.

use crate::{
    HardwareError, Result,
    traits::FingerprintVerifier,
    types::{CaptureBuffer, DeviceInfo, Verdict},
};
use quadlock_core::FingerprintSlot;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// Template capacity of the common optical sensor modules.
pub const DEFAULT_TEMPLATE_CAPACITY: u16 = 200;

type Library = Arc<Mutex<BTreeMap<FingerprintSlot, String>>>;

#[derive(Debug, Clone)]
enum FingerEvent {
    Placed(String),
    Fault(String),
}

/// Simulated fingerprint sensor with an on-chip template library.
///
/// # Examples
///
/// ```
/// use quadlock_core::FingerprintSlot;
/// use quadlock_hardware::sim::SimFingerprint;
/// use quadlock_hardware::traits::FingerprintVerifier;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> quadlock_hardware::Result<()> {
///     let (mut sensor, handle) = SimFingerprint::new();
///     handle.preload(FingerprintSlot::new(1), "alice-thumb");
///     handle.place_finger("alice-thumb").await?;
///
///     let verdict = sensor.poll(Duration::from_secs(1)).await?;
///     assert!(verdict.is_match());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SimFingerprint {
    event_rx: mpsc::Receiver<FingerEvent>,
    library: Library,
    capacity: u16,
    buffers: [Option<String>; 2],
    template: Option<String>,
    name: String,
}

impl SimFingerprint {
    /// Create a new simulated sensor with the default name and capacity.
    pub fn new() -> (Self, SimFingerprintHandle) {
        Self::with_capacity("Simulated Fingerprint Sensor".to_string(), DEFAULT_TEMPLATE_CAPACITY)
    }

    /// Create a new simulated sensor with a custom name and template capacity.
    pub fn with_capacity(name: String, capacity: u16) -> (Self, SimFingerprintHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let library: Library = Arc::new(Mutex::new(BTreeMap::new()));

        let sensor = Self {
            event_rx,
            library: Arc::clone(&library),
            capacity,
            buffers: [None, None],
            template: None,
            name: name.clone(),
        };

        let handle = SimFingerprintHandle {
            event_tx,
            library,
            name,
        };

        (sensor, handle)
    }

    /// Wait for the next finger event, `None` on timeout.
    async fn next_event(&mut self, timeout: Duration) -> Result<Option<FingerEvent>> {
        match tokio::time::timeout(timeout, self.event_rx.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => Err(HardwareError::disconnected("Fingerprint event channel closed")),
        }
    }

    fn search(&self, finger: &str) -> Option<FingerprintSlot> {
        self.library
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(_, name)| name.as_str() == finger)
            .map(|(slot, _)| *slot)
    }

    fn buffer_index(buffer: CaptureBuffer) -> usize {
        match buffer {
            CaptureBuffer::First => 0,
            CaptureBuffer::Second => 1,
        }
    }
}

impl Default for SimFingerprint {
    fn default() -> Self {
        Self::new().0
    }
}

impl FingerprintVerifier for SimFingerprint {
    async fn poll(&mut self, timeout: Duration) -> Result<Verdict<FingerprintSlot>> {
        match self.next_event(timeout).await? {
            None => Ok(Verdict::NoSignal),
            Some(FingerEvent::Fault(message)) => Err(HardwareError::communication(message)),
            Some(FingerEvent::Placed(finger)) => Ok(match self.search(&finger) {
                Some(slot) => Verdict::Match {
                    identity: slot,
                    confidence: Some(92.0),
                },
                None => Verdict::mismatch(),
            }),
        }
    }

    async fn capture_impression(
        &mut self,
        buffer: CaptureBuffer,
        timeout: Duration,
    ) -> Result<bool> {
        match self.next_event(timeout).await? {
            None => Ok(false),
            Some(FingerEvent::Fault(message)) => Err(HardwareError::biometric_capture(message)),
            Some(FingerEvent::Placed(finger)) => {
                self.buffers[Self::buffer_index(buffer)] = Some(finger);
                Ok(true)
            }
        }
    }

    async fn wait_finger_lifted(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }

    async fn create_template(&mut self) -> Result<()> {
        let [first, second] = std::mem::take(&mut self.buffers);
        match (first, second) {
            (Some(a), Some(b)) if a == b => {
                self.template = Some(a);
                Ok(())
            }
            (Some(_), Some(_)) => Err(HardwareError::biometric_capture(
                "Impressions do not match",
            )),
            _ => Err(HardwareError::biometric_capture(
                "Both impressions are required",
            )),
        }
    }

    async fn store_template(&mut self, slot: FingerprintSlot) -> Result<()> {
        if slot.as_u16() == 0 || slot.as_u16() > self.capacity {
            return Err(HardwareError::invalid_data(format!(
                "Slot {} outside 1-{}",
                slot, self.capacity
            )));
        }

        let finger = self
            .template
            .take()
            .ok_or_else(|| HardwareError::invalid_data("No template created"))?;

        self.library
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, finger);
        tracing::debug!(sensor = %self.name, %slot, "Template stored");
        Ok(())
    }

    async fn delete_template(&mut self, slot: FingerprintSlot) -> Result<()> {
        self.library
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&slot);
        Ok(())
    }

    async fn first_free_slot(&mut self) -> Result<Option<FingerprintSlot>> {
        let library = self.library.lock().unwrap_or_else(PoisonError::into_inner);
        Ok((1..=self.capacity)
            .map(FingerprintSlot::new)
            .find(|slot| !library.contains_key(slot)))
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        Ok(
            DeviceInfo::new(self.name.clone(), "Simulated Optical Sensor v1.0")
                .with_firmware_version("1.0.0"),
        )
    }
}

/// Handle for controlling a simulated fingerprint sensor.
#[derive(Debug, Clone)]
pub struct SimFingerprintHandle {
    event_tx: mpsc::Sender<FingerEvent>,
    library: Library,
    name: String,
}

impl SimFingerprintHandle {
    /// Touch the sensor with the named finger.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor has been dropped.
    pub async fn place_finger(&self, finger: impl Into<String>) -> Result<()> {
        self.send(FingerEvent::Placed(finger.into())).await
    }

    /// Make the next sensor read fail.
    pub async fn inject_fault(&self, message: impl Into<String>) -> Result<()> {
        self.send(FingerEvent::Fault(message.into())).await
    }

    /// Store a template directly, bypassing the enrollment protocol.
    pub fn preload(&self, slot: FingerprintSlot, finger: impl Into<String>) {
        self.library
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, finger.into());
    }

    /// Whether `slot` holds a template.
    pub fn has_template(&self, slot: FingerprintSlot) -> bool {
        self.library
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&slot)
    }

    /// Number of stored templates.
    pub fn template_count(&self) -> usize {
        self.library
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: FingerEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("Fingerprint event channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_sim_fingerprint_no_finger() {
        let (mut sensor, _handle) = SimFingerprint::new();
        assert_eq!(sensor.poll(SHORT).await.unwrap(), Verdict::NoSignal);
    }

    #[tokio::test]
    async fn test_sim_fingerprint_unknown_finger() {
        let (mut sensor, handle) = SimFingerprint::new();
        handle.place_finger("stranger").await.unwrap();

        assert_eq!(sensor.poll(SHORT).await.unwrap(), Verdict::mismatch());
    }

    #[tokio::test]
    async fn test_sim_fingerprint_fault_is_transient() {
        let (mut sensor, handle) = SimFingerprint::new();
        handle.inject_fault("UART checksum").await.unwrap();

        assert!(sensor.poll(SHORT).await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_sim_fingerprint_enrollment_protocol() {
        let (mut sensor, handle) = SimFingerprint::new();
        handle.preload(FingerprintSlot::new(1), "existing");

        let slot = sensor.first_free_slot().await.unwrap().unwrap();
        assert_eq!(slot, FingerprintSlot::new(2));

        handle.place_finger("carol").await.unwrap();
        assert!(sensor.capture_impression(CaptureBuffer::First, SHORT).await.unwrap());
        assert!(sensor.wait_finger_lifted(SHORT).await.unwrap());
        handle.place_finger("carol").await.unwrap();
        assert!(sensor.capture_impression(CaptureBuffer::Second, SHORT).await.unwrap());

        sensor.create_template().await.unwrap();
        sensor.store_template(slot).await.unwrap();
        assert!(handle.has_template(slot));

        handle.place_finger("carol").await.unwrap();
        assert!(matches!(
            sensor.poll(SHORT).await.unwrap(),
            Verdict::Match { identity, .. } if identity == slot
        ));
    }

    #[tokio::test]
    async fn test_sim_fingerprint_mismatched_impressions() {
        let (mut sensor, handle) = SimFingerprint::new();

        handle.place_finger("left").await.unwrap();
        handle.place_finger("right").await.unwrap();
        sensor.capture_impression(CaptureBuffer::First, SHORT).await.unwrap();
        sensor.capture_impression(CaptureBuffer::Second, SHORT).await.unwrap();

        assert!(sensor.create_template().await.is_err());
        assert!(sensor.store_template(FingerprintSlot::new(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_sim_fingerprint_full_library() {
        let (mut sensor, handle) = SimFingerprint::with_capacity("tiny".to_string(), 2);
        handle.preload(FingerprintSlot::new(1), "a");
        handle.preload(FingerprintSlot::new(2), "b");

        assert_eq!(sensor.first_free_slot().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sim_fingerprint_delete_template() {
        let (mut sensor, handle) = SimFingerprint::new();
        handle.preload(FingerprintSlot::new(3), "dave");

        sensor.delete_template(FingerprintSlot::new(3)).await.unwrap();
        assert_eq!(handle.template_count(), 0);
    }
}
