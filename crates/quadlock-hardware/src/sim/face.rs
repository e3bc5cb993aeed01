//! Simulated face verifier.
//!
//! The camera looks at a [`FaceScene`] set through the handle. A person in
//! the scene matches only when their name is in the enrolled gallery, which
//! is shared between the device and its handle.

use crate::{
    HardwareError, Result,
    traits::FaceVerifier,
    types::{DeviceInfo, FaceFrame, FaceObservation, FaceSample, Verdict},
};
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;
static BLANK_FRAME: [u8; (FRAME_WIDTH * FRAME_HEIGHT) as usize] =
    [0; (FRAME_WIDTH * FRAME_HEIGHT) as usize];

/// What the simulated camera currently sees.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceScene {
    /// Nobody in front of the camera.
    Empty,

    /// A named person with the matcher confidence they would score.
    Person { name: String, confidence: f32 },

    /// A face the matcher will never recognize.
    Stranger,

    /// The camera fails every read.
    Fault(String),
}

impl FaceScene {
    /// A person scoring a typical confidence.
    pub fn person(name: impl Into<String>) -> Self {
        Self::Person {
            name: name.into(),
            confidence: 87.5,
        }
    }
}

/// Simulated camera plus face matcher.
///
/// # Examples
///
/// ```
/// use quadlock_hardware::sim::{FaceScene, SimFace};
/// use quadlock_hardware::traits::FaceVerifier;
///
/// #[tokio::main]
/// async fn main() -> quadlock_hardware::Result<()> {
///     let (mut camera, handle) = SimFace::new();
///     handle.enroll_person("alice");
///     handle.show(FaceScene::person("alice"));
///
///     let observation = camera.poll().await?;
///     assert!(observation.verdict.is_match());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SimFace {
    scene_rx: watch::Receiver<FaceScene>,
    gallery: Arc<RwLock<HashSet<String>>>,
    dropouts: Arc<AtomicU32>,
    sequence: u64,
    name: String,
}

impl SimFace {
    /// Create a new simulated camera with the default name.
    pub fn new() -> (Self, SimFaceHandle) {
        Self::with_name("Simulated Camera".to_string())
    }

    /// Create a new simulated camera with a custom name.
    pub fn with_name(name: String) -> (Self, SimFaceHandle) {
        let (scene_tx, scene_rx) = watch::channel(FaceScene::Empty);
        let gallery = Arc::new(RwLock::new(HashSet::new()));
        let dropouts = Arc::new(AtomicU32::new(0));

        let camera = Self {
            scene_rx,
            gallery: Arc::clone(&gallery),
            dropouts: Arc::clone(&dropouts),
            sequence: 0,
            name: name.clone(),
        };

        let handle = SimFaceHandle {
            scene_tx: Arc::new(scene_tx),
            gallery,
            dropouts,
            name,
        };

        (camera, handle)
    }

    fn next_frame(&mut self) -> FaceFrame {
        self.sequence += 1;
        FaceFrame {
            sequence: self.sequence,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            pixels: Bytes::from_static(&BLANK_FRAME),
            captured_at: chrono::Utc::now(),
        }
    }

    fn is_enrolled(&self, name: &str) -> bool {
        self.gallery
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    /// Consume one pending dropout, if any.
    fn take_dropout(&self) -> bool {
        self.dropouts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for SimFace {
    fn default() -> Self {
        Self::new().0
    }
}

impl FaceVerifier for SimFace {
    async fn poll(&mut self) -> Result<FaceObservation> {
        let scene = self.scene_rx.borrow().clone();

        let verdict = match scene {
            FaceScene::Fault(message) => return Err(HardwareError::communication(message)),
            FaceScene::Empty => Verdict::NoSignal,
            FaceScene::Stranger => Verdict::Mismatch {
                confidence: Some(12.0),
            },
            FaceScene::Person { name, confidence } => {
                if self.is_enrolled(&name) {
                    Verdict::Match {
                        identity: name,
                        confidence: Some(confidence),
                    }
                } else {
                    Verdict::Mismatch {
                        confidence: Some(confidence),
                    }
                }
            }
        };

        let frame = self.next_frame();
        Ok(FaceObservation::new(verdict, Some(frame)))
    }

    async fn capture_sample(&mut self) -> Result<Option<FaceSample>> {
        let scene = self.scene_rx.borrow().clone();

        match scene {
            FaceScene::Fault(message) => Err(HardwareError::biometric_capture(message)),
            FaceScene::Empty => Ok(None),
            FaceScene::Stranger | FaceScene::Person { .. } => {
                if self.take_dropout() {
                    return Ok(None);
                }
                Ok(Some(FaceSample {
                    pixels: Bytes::from_static(&BLANK_FRAME),
                }))
            }
        }
    }

    async fn enroll(&mut self, name: &str, samples: Vec<FaceSample>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(HardwareError::invalid_data("Person name must not be empty"));
        }
        if samples.is_empty() {
            return Err(HardwareError::biometric_capture("No samples to train on"));
        }

        self.gallery
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
        tracing::debug!(camera = %self.name, person = name, "Face gallery updated");
        Ok(())
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Simulated Face Verifier v1.0")
            .with_firmware_version("1.0.0"))
    }
}

/// Handle for steering a simulated camera.
///
/// Cloning the handle shares the scene and the gallery.
#[derive(Debug, Clone)]
pub struct SimFaceHandle {
    scene_tx: Arc<watch::Sender<FaceScene>>,
    gallery: Arc<RwLock<HashSet<String>>>,
    dropouts: Arc<AtomicU32>,
    name: String,
}

impl SimFaceHandle {
    /// Change what the camera sees.
    pub fn show(&self, scene: FaceScene) {
        self.scene_tx.send_replace(scene);
    }

    /// Add a person to the gallery without going through enrollment.
    pub fn enroll_person(&self, name: impl Into<String>) {
        self.gallery
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into());
    }

    /// Whether a person is in the gallery.
    pub fn is_enrolled(&self, name: &str) -> bool {
        self.gallery
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    /// Make the next `count` sample captures find no face.
    pub fn drop_next_samples(&self, count: u32) {
        self.dropouts.store(count, Ordering::SeqCst);
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
    async fn test_sim_face_empty_scene() {
        let (mut camera, _handle) = SimFace::new();

        let observation = camera.poll().await.unwrap();
        assert_eq!(observation.verdict, Verdict::NoSignal);
        assert_eq!(observation.frame.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_sim_face_unenrolled_person_mismatches() {
        let (mut camera, handle) = SimFace::new();
        handle.show(FaceScene::person("mallory"));

        let observation = camera.poll().await.unwrap();
        assert!(matches!(observation.verdict, Verdict::Mismatch { .. }));
    }

    #[tokio::test]
    async fn test_sim_face_fault() {
        let (mut camera, handle) = SimFace::new();
        handle.show(FaceScene::Fault("USB reset".into()));

        let error = camera.poll().await.unwrap_err();
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_sim_face_enroll_then_match() {
        let (mut camera, handle) = SimFace::new();
        handle.show(FaceScene::person("bob"));

        let sample = camera.capture_sample().await.unwrap().unwrap();
        camera.enroll("bob", vec![sample]).await.unwrap();
        assert!(handle.is_enrolled("bob"));

        let observation = camera.poll().await.unwrap();
        assert_eq!(
            observation.verdict,
            Verdict::Match {
                identity: "bob".to_string(),
                confidence: Some(87.5)
            }
        );
    }

    #[tokio::test]
    async fn test_sim_face_dropouts() {
        let (mut camera, handle) = SimFace::new();
        handle.show(FaceScene::Stranger);
        handle.drop_next_samples(2);

        assert!(camera.capture_sample().await.unwrap().is_none());
        assert!(camera.capture_sample().await.unwrap().is_none());
        assert!(camera.capture_sample().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sim_face_enroll_rejects_empty_name() {
        let (mut camera, _handle) = SimFace::new();
        let sample = FaceSample {
            pixels: Bytes::from_static(b"x"),
        };
        assert!(camera.enroll("  ", vec![sample]).await.is_err());
    }
}
