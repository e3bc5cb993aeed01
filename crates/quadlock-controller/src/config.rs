//! Controller configuration
//!
//! Every field has a default, so a partial JSON file is valid. The admin
//! identity lives only here: the credential store has no API to change it.

use quadlock_core::constants::*;
use quadlock_core::{CardUid, Error, Passcode, Result};
use quadlock_hardware::RelayPolarity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which device implementations the process composes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareMode {
    /// Simulated devices driven from the console.
    #[default]
    Simulated,

    /// Physical sensors and relay.
    Physical,
}

/// The privileged identity that opens the admin session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    /// Card that routes to the admin password prompt.
    pub card_uid: CardUid,

    /// Secondary password for both admin paths.
    pub password: Passcode,
}

impl Default for AdminIdentity {
    fn default() -> Self {
        Self {
            card_uid: CardUid::from(DEFAULT_ADMIN_CARD_UID),
            password: Passcode::default_admin(),
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Attempt budget for fingerprint, card and passcode
    pub max_attempts: u32,

    /// Consecutive face matches needed to pass the face step
    pub required_consecutive_face_matches: u32,

    pub face_poll_interval_ms: u64,
    pub fingerprint_poll_timeout_ms: u64,
    pub card_poll_timeout_ms: u64,

    /// Pause after a rejected fingerprint or card reading
    pub factor_retry_delay_ms: u64,

    /// How long the door stays passable
    pub lock_open_duration_ms: u64,

    pub relock_restart_delay_ms: u64,
    pub lockout_delay_ms: u64,
    pub passcode_reprompt_delay_ms: u64,
    pub startup_delay_ms: u64,

    /// Consecutive sensor errors on one step that raise an alert
    pub sensor_fault_alert_threshold: u32,

    pub face_training_samples: u32,
    pub face_training_max_attempts: u32,
    pub enrollment_capture_timeout_ms: u64,

    /// Path of the credential JSON document
    pub credential_path: PathBuf,

    pub hardware_mode: HardwareMode,
    pub relay_polarity: RelayPolarity,
    pub admin: AdminIdentity,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            required_consecutive_face_matches: DEFAULT_REQUIRED_CONSECUTIVE_FACE_MATCHES,
            face_poll_interval_ms: DEFAULT_FACE_POLL_INTERVAL_MS,
            fingerprint_poll_timeout_ms: DEFAULT_FINGERPRINT_POLL_TIMEOUT_MS,
            card_poll_timeout_ms: DEFAULT_CARD_POLL_TIMEOUT_MS,
            factor_retry_delay_ms: DEFAULT_FACTOR_RETRY_DELAY_MS,
            lock_open_duration_ms: DEFAULT_LOCK_OPEN_DURATION_MS,
            relock_restart_delay_ms: DEFAULT_RELOCK_RESTART_DELAY_MS,
            lockout_delay_ms: DEFAULT_LOCKOUT_DELAY_MS,
            passcode_reprompt_delay_ms: DEFAULT_PASSCODE_REPROMPT_DELAY_MS,
            startup_delay_ms: DEFAULT_STARTUP_DELAY_MS,
            sensor_fault_alert_threshold: DEFAULT_SENSOR_FAULT_ALERT_THRESHOLD,
            face_training_samples: DEFAULT_FACE_TRAINING_SAMPLES,
            face_training_max_attempts: DEFAULT_FACE_TRAINING_MAX_ATTEMPTS,
            enrollment_capture_timeout_ms: DEFAULT_ENROLLMENT_CAPTURE_TIMEOUT_MS,
            credential_path: PathBuf::from("admin_data.json"),
            hardware_mode: HardwareMode::default(),
            relay_polarity: RelayPolarity::default(),
            admin: AdminIdentity::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        let budgets = [
            ("max_attempts", self.max_attempts),
            (
                "required_consecutive_face_matches",
                self.required_consecutive_face_matches,
            ),
            ("sensor_fault_alert_threshold", self.sensor_fault_alert_threshold),
            ("face_training_samples", self.face_training_samples),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be at least 1")));
            }
        }

        if self.face_training_max_attempts < self.face_training_samples {
            return Err(Error::Config(
                "face_training_max_attempts must not be below face_training_samples".to_string(),
            ));
        }

        let windows = [
            ("face_poll_interval_ms", self.face_poll_interval_ms),
            ("fingerprint_poll_timeout_ms", self.fingerprint_poll_timeout_ms),
            ("card_poll_timeout_ms", self.card_poll_timeout_ms),
            ("lock_open_duration_ms", self.lock_open_duration_ms),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be positive")));
            }
        }

        Ok(())
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_required_face_matches(mut self, required: u32) -> Self {
        self.required_consecutive_face_matches = required;
        self
    }

    pub fn with_lock_open_duration(mut self, duration: Duration) -> Self {
        self.lock_open_duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_face_poll_interval(mut self, interval: Duration) -> Self {
        self.face_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_poll_timeouts(mut self, fingerprint: Duration, card: Duration) -> Self {
        self.fingerprint_poll_timeout_ms = fingerprint.as_millis() as u64;
        self.card_poll_timeout_ms = card.as_millis() as u64;
        self
    }

    pub fn with_factor_retry_delay(mut self, delay: Duration) -> Self {
        self.factor_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_face_training(mut self, samples: u32, max_attempts: u32) -> Self {
        self.face_training_samples = samples;
        self.face_training_max_attempts = max_attempts;
        self
    }

    pub fn with_credential_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential_path = path.into();
        self
    }

    pub fn with_hardware_mode(mut self, mode: HardwareMode) -> Self {
        self.hardware_mode = mode;
        self
    }

    pub fn with_relay_polarity(mut self, polarity: RelayPolarity) -> Self {
        self.relay_polarity = polarity;
        self
    }

    pub fn with_admin(mut self, card_uid: CardUid, password: Passcode) -> Self {
        self.admin = AdminIdentity { card_uid, password };
        self
    }

    pub fn face_poll_interval(&self) -> Duration {
        Duration::from_millis(self.face_poll_interval_ms)
    }

    pub fn fingerprint_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.fingerprint_poll_timeout_ms)
    }

    pub fn card_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.card_poll_timeout_ms)
    }

    pub fn factor_retry_delay(&self) -> Duration {
        Duration::from_millis(self.factor_retry_delay_ms)
    }

    pub fn lock_open_duration(&self) -> Duration {
        Duration::from_millis(self.lock_open_duration_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn enrollment_capture_timeout(&self) -> Duration {
        Duration::from_millis(self.enrollment_capture_timeout_ms)
    }
}
