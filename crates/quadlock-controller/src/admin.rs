//! Admin session.
//!
//! An [`AdminSession`] is only handed out while the orchestrator sits in the
//! `Admin` step, and it stays bound to the epoch it was opened in: once the
//! session is left (exit, `#` restart, shutdown) every operation fails with
//! [`Error::SessionClosed`], even if a later admin session is open.
//!
//! Credential changes go through the [`CredentialStore`](quadlock_storage::CredentialStore),
//! so each one is persisted before it is reported as done.

use crate::orchestrator::{AdminContext, Input, OrchestratorHandle};
use crate::session::AuthStep;
use quadlock_core::{CardUid, Error, FingerprintSlot, Passcode, Result};
use quadlock_hardware::{CaptureBuffer, CardVerifier, FaceVerifier, FingerprintVerifier, Verdict};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Read-only view of the stored credentials. The passcode itself is never
/// exposed, only its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialSummary {
    pub cards: Vec<CardUid>,
    pub fingerprints: Vec<FingerprintSlot>,
    pub passcode_length: usize,
}

/// Privileged operations, valid while the admin step of one epoch lasts.
#[derive(Debug, Clone)]
pub struct AdminSession {
    handle: OrchestratorHandle,
    epoch: u64,
}

impl AdminSession {
    pub(crate) fn new(handle: OrchestratorHandle, epoch: u64) -> Self {
        Self { handle, epoch }
    }

    /// Epoch the session was opened in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the controller is still in this admin session.
    pub fn is_active(&self) -> bool {
        let snapshot = self.handle.snapshot();
        snapshot.step == AuthStep::Admin && snapshot.epoch == self.epoch
    }

    /// Replace the unlock passcode.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPasscode`] unless the code is 4 to 8 digits, or a
    /// persistence error, in which case the old passcode stays valid.
    pub async fn change_passcode(&self, code: &str) -> Result<()> {
        self.ensure_active()?;
        let passcode = Passcode::new(code)?;

        self.context().store.set_passcode(passcode).await?;
        info!(length = code.len(), "System passcode changed");
        Ok(())
    }

    /// Authorize a card.
    pub async fn add_card(&self, uid: CardUid) -> Result<()> {
        self.ensure_active()?;
        if uid == self.context().config.admin.card_uid {
            return Err(Error::InvalidCardUid(
                "the admin card cannot be authorized for entry".to_string(),
            ));
        }

        self.context().store.add_card(uid.clone()).await?;
        info!(card = %uid, "Card authorized");
        Ok(())
    }

    /// Read one card from the reader and authorize it.
    ///
    /// # Errors
    ///
    /// [`Error::NothingPresented`] when no card arrived within `timeout`, and
    /// everything [`add_card`](Self::add_card) rejects.
    pub async fn scan_and_add_card(&self, timeout: Duration) -> Result<CardUid> {
        self.ensure_active()?;
        info!(timeout_ms = timeout.as_millis() as u64, "Waiting for a card to add");

        let verdict = self
            .context()
            .verifiers
            .card
            .lock()
            .await
            .poll(timeout)
            .await?;

        match verdict {
            Verdict::Match { identity, .. } => {
                self.add_card(identity.clone()).await?;
                Ok(identity)
            }
            Verdict::NoSignal => Err(Error::NothingPresented("card".to_string())),
            Verdict::SensorError { message } => Err(Error::SensorFault(message)),
            Verdict::Mismatch { .. } => Err(Error::SensorFault("card could not be read".to_string())),
        }
    }

    /// Revoke a card.
    pub async fn remove_card(&self, uid: &CardUid) -> Result<()> {
        self.ensure_active()?;
        self.context().store.remove_card(uid).await?;
        info!(card = %uid, "Card revoked");
        Ok(())
    }

    /// Enroll a finger into the lowest free sensor slot.
    ///
    /// The finger is imaged twice, with a lift in between. The slot is
    /// recorded in the store only after the sensor stored the template; if
    /// recording fails, the template is deleted again.
    ///
    /// # Errors
    ///
    /// [`Error::StorageExhausted`] when the sensor has no free slot,
    /// [`Error::NothingPresented`] when no finger arrived in time, and
    /// sensor or persistence errors.
    pub async fn enroll_fingerprint(&self) -> Result<FingerprintSlot> {
        self.ensure_active()?;
        let context = self.context();
        let timeout = context.config.enrollment_capture_timeout();
        let mut sensor = context.verifiers.fingerprint.lock().await;

        let slot = sensor
            .first_free_slot()
            .await?
            .ok_or(Error::StorageExhausted)?;
        info!(%slot, "Place finger on the sensor");

        if !sensor.capture_impression(CaptureBuffer::First, timeout).await? {
            return Err(Error::NothingPresented("finger".to_string()));
        }
        if !sensor.wait_finger_lifted(timeout).await? {
            return Err(Error::SensorFault("finger was not lifted".to_string()));
        }
        info!(%slot, "Place the same finger again");
        if !sensor.capture_impression(CaptureBuffer::Second, timeout).await? {
            return Err(Error::NothingPresented("finger".to_string()));
        }

        sensor.create_template().await?;
        sensor.store_template(slot).await?;

        // The sensor is authoritative for free slots; a stored id without a
        // template is stale and now points at the new template.
        if context.store.has_fingerprint(slot).await {
            warn!(%slot, "Slot was recorded without a template, reusing it");
        } else if let Err(e) = context.store.add_fingerprint(slot).await {
            error!(%slot, error = %e, "Fingerprint not recorded, deleting template");
            if let Err(rollback) = sensor.delete_template(slot).await {
                error!(%slot, error = %rollback, "Template rollback failed");
            }
            return Err(e.into());
        }

        info!(%slot, "Fingerprint enrolled");
        Ok(slot)
    }

    /// Delete a fingerprint from the sensor, then from the store.
    ///
    /// When the store write fails after the template is gone, the id stays
    /// recorded without a template. It can no longer match, and the next
    /// enrollment landing on that slot takes the id over.
    pub async fn remove_fingerprint(&self, slot: FingerprintSlot) -> Result<()> {
        self.ensure_active()?;
        let context = self.context();

        if !context.store.has_fingerprint(slot).await {
            return Err(Error::UnknownFingerprint(slot.as_u16()));
        }

        context
            .verifiers
            .fingerprint
            .lock()
            .await
            .delete_template(slot)
            .await?;
        if let Err(e) = context.store.remove_fingerprint(slot).await {
            warn!(%slot, error = %e, "Template deleted but id still recorded");
            return Err(e.into());
        }

        info!(%slot, "Fingerprint removed");
        Ok(())
    }

    /// Teach the face verifier a new person.
    ///
    /// Collects the configured number of successful captures, giving up
    /// after the configured number of attempts.
    pub async fn enroll_face(&self, name: &str) -> Result<()> {
        self.ensure_active()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidName("name must not be empty".to_string()));
        }

        let config = &self.context().config;
        let required = config.face_training_samples as usize;
        let max_attempts = config.face_training_max_attempts;
        let interval = config.face_poll_interval();

        let mut camera = self.context().verifiers.face.lock().await;
        let mut samples = Vec::with_capacity(required);
        let mut attempts = 0;

        info!(person = name, required, "Collecting face samples");
        while samples.len() < required && attempts < max_attempts {
            attempts += 1;
            match camera.capture_sample().await {
                Ok(Some(sample)) => samples.push(sample),
                Ok(None) => {}
                Err(e) => warn!(error = %e, attempt = attempts, "Face capture failed"),
            }
            if samples.len() < required {
                tokio::time::sleep(interval).await;
            }
        }

        if samples.len() < required {
            warn!(person = name, captured = samples.len(), required, "Face enrollment incomplete");
            return Err(Error::InsufficientSamples {
                captured: samples.len() as u32,
                required: required as u32,
            });
        }

        camera.enroll(name, samples).await?;
        info!(person = name, attempts, "Face enrolled");
        Ok(())
    }

    /// A copy of the stored credentials.
    pub async fn credentials(&self) -> Result<CredentialSummary> {
        self.ensure_active()?;
        let credentials = self.context().store.snapshot().await;

        Ok(CredentialSummary {
            cards: credentials.valid_card_uids,
            fingerprints: credentials.fingerprint_ids,
            passcode_length: credentials.system_passcode.len(),
        })
    }

    /// Leave the admin session and restart authentication.
    pub async fn exit(self) -> Result<()> {
        self.ensure_active()?;
        self.handle.send(Input::AdminExit { epoch: self.epoch }).await
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::SessionClosed)
        }
    }

    fn context(&self) -> &AdminContext {
        &self.handle.admin
    }
}
