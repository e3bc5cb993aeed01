//! Door actuator with auto-relock.
//!
//! [`DoorActuator`] turns the relay's coil state into door semantics using the
//! configured [`RelayPolarity`], and owns the single pending relock. Calling
//! [`unlock_then`](DoorActuator::unlock_then) while the door is already open
//! reschedules the relock instead of stacking a second one, so the door
//! always locks exactly `open_duration` after the most recent unlock.

use quadlock_core::{Error, Result};
use quadlock_hardware::{AnyLockRelay, LockRelay, RelayPolarity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Pause between relock attempts when the relay refuses to switch.
const RELOCK_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Physical state of the door strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    Locked,
    Unlocked,
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorState::Locked => write!(f, "locked"),
            DoorState::Unlocked => write!(f, "unlocked"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    relay: tokio::sync::Mutex<AnyLockRelay>,
    polarity: RelayPolarity,
    open_duration: Duration,
    pending_relock: Mutex<Option<JoinHandle<()>>>,
    state_tx: watch::Sender<DoorState>,
}

/// Drives the lock relay.
///
/// Cloning shares the relay and the pending relock.
///
/// # Examples
///
/// ```
/// use quadlock_controller::{DoorActuator, DoorState};
/// use quadlock_hardware::{AnyLockRelay, RelayPolarity, sim::SimRelay};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> quadlock_core::Result<()> {
///     let (relay, handle) = SimRelay::new();
///     let door = DoorActuator::new(
///         AnyLockRelay::Simulated(relay),
///         RelayPolarity::EnergizeToLock,
///         Duration::from_millis(10),
///     )
///     .await?;
///     assert!(handle.is_energized());
///
///     let (tx, rx) = tokio::sync::oneshot::channel();
///     door.unlock_then(async move {
///         let _ = tx.send(());
///     })
///     .await?;
///     assert_eq!(door.state(), DoorState::Unlocked);
///
///     rx.await.ok();
///     assert_eq!(door.state(), DoorState::Locked);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DoorActuator {
    inner: Arc<Inner>,
}

impl DoorActuator {
    /// Take ownership of the relay and lock the door.
    ///
    /// # Errors
    ///
    /// Fails when the relay cannot be switched. The controller must not run
    /// with a door in an unknown state.
    pub async fn new(
        relay: AnyLockRelay,
        polarity: RelayPolarity,
        open_duration: Duration,
    ) -> Result<Self> {
        let (state_tx, _) = watch::channel(DoorState::Locked);
        let actuator = Self {
            inner: Arc::new(Inner {
                relay: tokio::sync::Mutex::new(relay),
                polarity,
                open_duration,
                pending_relock: Mutex::new(None),
                state_tx,
            }),
        };

        actuator.lock().await.map_err(|e| {
            error!(error = %e, "Door could not be locked at startup");
            e
        })?;
        Ok(actuator)
    }

    /// Lock the door. Idempotent.
    pub async fn lock(&self) -> Result<()> {
        Self::switch(&self.inner, DoorState::Locked).await
    }

    /// Unlock the door and relock it after the open duration.
    ///
    /// `on_relock` runs once the relock succeeded. An unlock while a relock is
    /// pending cancels that relock along with its `on_relock`.
    pub async fn unlock_then<F>(&self, on_relock: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel_pending_relock();
        Self::switch(&self.inner, DoorState::Unlocked).await?;

        let inner = Arc::clone(&self.inner);
        let relock = tokio::spawn(async move {
            tokio::time::sleep(inner.open_duration).await;
            while let Err(e) = Self::switch(&inner, DoorState::Locked).await {
                error!(error = %e, "Relock failed, retrying");
                tokio::time::sleep(RELOCK_RETRY_INTERVAL).await;
            }
            on_relock.await;
        });

        *self
            .inner
            .pending_relock
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(relock);
        Ok(())
    }

    /// Cancel any pending relock and lock now.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel_pending_relock();
        self.lock().await
    }

    pub fn state(&self) -> DoorState {
        *self.inner.state_tx.borrow()
    }

    /// Watch door state changes.
    pub fn subscribe(&self) -> watch::Receiver<DoorState> {
        self.inner.state_tx.subscribe()
    }

    /// Number of relocks still pending, 0 or 1.
    pub fn pending_relocks(&self) -> usize {
        self.inner
            .pending_relock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |task| usize::from(!task.is_finished()))
    }

    pub fn open_duration(&self) -> Duration {
        self.inner.open_duration
    }

    fn cancel_pending_relock(&self) {
        let pending = self
            .inner
            .pending_relock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = pending {
            task.abort();
        }
    }

    async fn switch(inner: &Inner, target: DoorState) -> Result<()> {
        let energized = inner.polarity.energized_for(target == DoorState::Locked);

        let mut relay = inner.relay.lock().await;
        relay.set_energized(energized).await.map_err(Error::from)?;
        drop(relay);

        let changed = inner.state_tx.send_if_modified(|state| {
            let changed = *state != target;
            *state = target;
            changed
        });
        if changed {
            info!(door = %target, "Door state changed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadlock_hardware::sim::{SimRelay, SimRelayHandle};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::sleep;

    const OPEN: Duration = Duration::from_secs(3);

    async fn actuator(polarity: RelayPolarity) -> (DoorActuator, SimRelayHandle) {
        let (relay, handle) = SimRelay::new();
        let door = DoorActuator::new(AnyLockRelay::Simulated(relay), polarity, OPEN)
            .await
            .unwrap();
        (door, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_locks_door() {
        let (door, handle) = actuator(RelayPolarity::EnergizeToLock).await;
        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(handle.switch_history(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_fails_when_relay_fails() {
        let (relay, handle) = SimRelay::new();
        handle.fail_next_switches(1);

        let result = DoorActuator::new(
            AnyLockRelay::Simulated(relay),
            RelayPolarity::EnergizeToLock,
            OPEN,
        )
        .await;
        assert!(matches!(result, Err(Error::Hardware(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_relocks_after_open_duration() {
        let (door, handle) = actuator(RelayPolarity::EnergizeToLock).await;
        let relocks = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&relocks);
        door.unlock_then(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
        assert_eq!(door.state(), DoorState::Unlocked);
        assert!(!handle.is_energized());
        assert_eq!(door.pending_relocks(), 1);

        sleep(OPEN - Duration::from_millis(100)).await;
        assert_eq!(door.state(), DoorState::Unlocked);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(relocks.load(Ordering::SeqCst), 1);
        assert_eq!(door.pending_relocks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_unlock_reschedules_relock() {
        let (door, handle) = actuator(RelayPolarity::EnergizeToLock).await;
        let relocks = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let counter = Arc::clone(&relocks);
            door.unlock_then(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
            assert_eq!(door.pending_relocks(), 1);
            sleep(Duration::from_secs(2)).await;
        }

        // Four seconds after the first unlock, two after the second.
        assert_eq!(door.state(), DoorState::Unlocked);

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(relocks.load(Ordering::SeqCst), 1);
        assert_eq!(handle.switch_history(), vec![true, false, false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_energize_to_unlock_polarity() {
        let (door, handle) = actuator(RelayPolarity::EnergizeToUnlock).await;
        assert!(!handle.is_energized());

        door.unlock_then(async {}).await.unwrap();
        assert!(handle.is_energized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_unlock_keeps_door_locked() {
        let (door, handle) = actuator(RelayPolarity::EnergizeToLock).await;
        handle.fail_next_switches(1);

        assert!(door.unlock_then(async {}).await.is_err());
        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(door.pending_relocks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relock_retries_until_relay_responds() {
        let (door, handle) = actuator(RelayPolarity::EnergizeToLock).await;
        door.unlock_then(async {}).await.unwrap();
        handle.fail_next_switches(2);

        sleep(OPEN + Duration::from_millis(100)).await;
        assert_eq!(door.state(), DoorState::Unlocked);

        sleep(RELOCK_RETRY_INTERVAL * 2).await;
        assert_eq!(door.state(), DoorState::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_relock() {
        let (door, _handle) = actuator(RelayPolarity::EnergizeToLock).await;
        let relocks = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&relocks);
        door.unlock_then(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
        door.shutdown().await.unwrap();

        sleep(OPEN * 2).await;
        assert_eq!(door.state(), DoorState::Locked);
        assert_eq!(relocks.load(Ordering::SeqCst), 0);
    }
}
