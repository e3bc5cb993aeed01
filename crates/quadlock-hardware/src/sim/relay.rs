//! Simulated lock relay.
//!
//! The coil state and every switch are recorded in state shared with the
//! handle, so tests can observe the physical effect of lock/unlock calls.

use crate::{HardwareError, Result, traits::LockRelay, types::DeviceInfo};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct RelayState {
    energized: bool,
    switches: Vec<bool>,
    failures_pending: u32,
}

/// Simulated relay driving a door strike.
#[derive(Debug)]
pub struct SimRelay {
    state: Arc<Mutex<RelayState>>,
    name: String,
}

impl SimRelay {
    /// Create a new simulated relay with the coil released.
    pub fn new() -> (Self, SimRelayHandle) {
        Self::with_name("Simulated Relay".to_string())
    }

    /// Create a new simulated relay with a custom name.
    pub fn with_name(name: String) -> (Self, SimRelayHandle) {
        let state = Arc::new(Mutex::new(RelayState::default()));

        let relay = Self {
            state: Arc::clone(&state),
            name: name.clone(),
        };

        (relay, SimRelayHandle { state, name })
    }
}

impl Default for SimRelay {
    fn default() -> Self {
        Self::new().0
    }
}

impl LockRelay for SimRelay {
    async fn set_energized(&mut self, energized: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(HardwareError::relay("Coil driver did not respond"));
        }

        state.energized = energized;
        state.switches.push(energized);
        tracing::debug!(relay = %self.name, energized, "Relay switched");
        Ok(())
    }

    async fn is_energized(&self) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .energized)
    }

    async fn get_device_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.name.clone(), "Simulated 5V Relay"))
    }
}

/// Handle for observing and faulting a simulated relay.
#[derive(Debug, Clone)]
pub struct SimRelayHandle {
    state: Arc<Mutex<RelayState>>,
    name: String,
}

impl SimRelayHandle {
    /// Current coil state.
    pub fn is_energized(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .energized
    }

    /// Every coil state set so far, oldest first.
    pub fn switch_history(&self) -> Vec<bool> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .switches
            .clone()
    }

    /// Make the next `count` switch attempts fail.
    pub fn fail_next_switches(&self, count: u32) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failures_pending = count;
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
