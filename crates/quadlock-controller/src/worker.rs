//! Sensor polling workers.
//!
//! One worker polls one verifier while the session sits on that verifier's
//! step. A worker is bound to the `(step, epoch)` it was started for and
//! stops as soon as the published snapshot shows anything else. It never
//! touches the session: every verdict goes to the orchestrator as an input
//! tagged with the worker's epoch.
//!
//! ```text
//! ┌──────────┐  FaceVerdict{epoch}
//! │ Face     │──────────────────┐
//! └──────────┘                  │     ┌──────────────┐
//! ┌──────────┐                  ├────►│              │
//! │ Finger   │──────────────────┤     │ Orchestrator │──► snapshot (watch)
//! └──────────┘                  │     │              │
//! ┌──────────┐                  │     └──────────────┘
//! │ Card     │──────────────────┤
//! └──────────┘                  │
//! ┌──────────┐  Key             │
//! │ Keypad   │──────────────────┘
//! └──────────┘
//! ```
//!
//! The keypad worker is the exception: it runs for the lifetime of the
//! process, since hotkeys work in every step.

use crate::events::StatusEvent;
use crate::orchestrator::Input;
use crate::session::{AuthStep, SessionSnapshot};
use quadlock_hardware::{
    AnyCardVerifier, AnyFaceVerifier, AnyFingerprintVerifier, AnyKeypadDevice, CardVerifier,
    FaceVerifier, FingerprintVerifier, KeypadDevice, Verdict,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Length of the click the keypad makes on every key.
const KEY_CLICK_MS: u16 = 40;

/// Pause before reading the keypad again after a transient fault.
const KEYPAD_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Verifiers shared between polling workers and the admin session.
///
/// Only one party polls a verifier at a time: workers run on factor steps,
/// admin operations only while the session is in `Admin`.
#[derive(Debug, Clone)]
pub(crate) struct SharedVerifiers {
    pub(crate) face: Arc<Mutex<AnyFaceVerifier>>,
    pub(crate) fingerprint: Arc<Mutex<AnyFingerprintVerifier>>,
    pub(crate) card: Arc<Mutex<AnyCardVerifier>>,
}

impl SharedVerifiers {
    pub(crate) fn new(
        face: AnyFaceVerifier,
        fingerprint: AnyFingerprintVerifier,
        card: AnyCardVerifier,
    ) -> Self {
        Self {
            face: Arc::new(Mutex::new(face)),
            fingerprint: Arc::new(Mutex::new(fingerprint)),
            card: Arc::new(Mutex::new(card)),
        }
    }
}

/// Everything a polling worker needs.
#[derive(Debug, Clone)]
pub(crate) struct WorkerContext {
    pub(crate) verifiers: SharedVerifiers,
    pub(crate) input_tx: mpsc::Sender<Input>,
    pub(crate) snapshot_rx: watch::Receiver<SessionSnapshot>,
    pub(crate) events: broadcast::Sender<StatusEvent>,
    pub(crate) face_poll_interval: Duration,
    pub(crate) fingerprint_poll_timeout: Duration,
    pub(crate) card_poll_timeout: Duration,
    pub(crate) factor_retry_delay: Duration,
}

/// Start the worker for `step` bound to `epoch`.
///
/// Returns `None` for steps nobody polls.
pub(crate) fn spawn_worker(ctx: WorkerContext, step: AuthStep, epoch: u64) -> Option<JoinHandle<()>> {
    let task = match step {
        AuthStep::Face => {
            let face = Arc::clone(&ctx.verifiers.face);
            let events = ctx.events.clone();
            let interval = ctx.face_poll_interval;
            tokio::spawn(poll_loop(
                ctx,
                step,
                epoch,
                interval,
                Duration::ZERO,
                move || {
                    let face = Arc::clone(&face);
                    let events = events.clone();
                    async move {
                        match face.lock().await.poll().await {
                            Ok(observation) => {
                                if let Some(frame) = observation.frame {
                                    // No subscribers is fine.
                                    let _ = events.send(StatusEvent::FaceFrame(frame));
                                }
                                observation.verdict
                            }
                            Err(e) => Verdict::SensorError {
                                message: e.to_string(),
                            },
                        }
                    }
                },
                |epoch, verdict| Input::FaceVerdict { epoch, verdict },
            ))
        }
        AuthStep::Fingerprint => {
            let fingerprint = Arc::clone(&ctx.verifiers.fingerprint);
            let timeout = ctx.fingerprint_poll_timeout;
            let retry_delay = ctx.factor_retry_delay;
            tokio::spawn(poll_loop(
                ctx,
                step,
                epoch,
                Duration::ZERO,
                retry_delay,
                move || {
                    let fingerprint = Arc::clone(&fingerprint);
                    async move {
                        fingerprint
                            .lock()
                            .await
                            .poll(timeout)
                            .await
                            .unwrap_or_else(|e| Verdict::SensorError {
                                message: e.to_string(),
                            })
                    }
                },
                |epoch, verdict| Input::FingerprintVerdict { epoch, verdict },
            ))
        }
        AuthStep::Card => {
            let card = Arc::clone(&ctx.verifiers.card);
            let timeout = ctx.card_poll_timeout;
            let retry_delay = ctx.factor_retry_delay;
            tokio::spawn(poll_loop(
                ctx,
                step,
                epoch,
                Duration::ZERO,
                retry_delay,
                move || {
                    let card = Arc::clone(&card);
                    async move {
                        card.lock()
                            .await
                            .poll(timeout)
                            .await
                            .unwrap_or_else(|e| Verdict::SensorError {
                                message: e.to_string(),
                            })
                    }
                },
                |epoch, verdict| Input::CardVerdict { epoch, verdict },
            ))
        }
        _ => return None,
    };
    Some(task)
}

/// Poll until the session leaves `(step, epoch)`.
///
/// `interval` separates consecutive polls. Any verdict other than a match
/// waits at least `retry_delay` before the next poll. A poll or pause in
/// flight is dropped as soon as the step changes, which releases the
/// verifier lock for whoever needs the sensor next.
async fn poll_loop<I, P, Fut>(
    ctx: WorkerContext,
    step: AuthStep,
    epoch: u64,
    interval: Duration,
    retry_delay: Duration,
    mut poll: P,
    wrap: fn(u64, Verdict<I>) -> Input,
) where
    P: FnMut() -> Fut,
    Fut: Future<Output = Verdict<I>>,
{
    let mut snapshot_rx = ctx.snapshot_rx;
    debug!(%step, epoch, "Worker started");

    loop {
        let verdict = tokio::select! {
            _ = left(&mut snapshot_rx, step, epoch) => break,
            verdict = poll() => verdict,
        };

        if !matches!(verdict, Verdict::NoSignal) {
            debug!(%step, epoch, verdict = %verdict.kind(), "Verdict");
        }
        let pause = if verdict.is_match() {
            interval
        } else {
            interval.max(retry_delay)
        };
        if ctx.input_tx.send(wrap(epoch, verdict)).await.is_err() {
            break;
        }

        if !pause.is_zero() {
            tokio::select! {
                _ = left(&mut snapshot_rx, step, epoch) => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    debug!(%step, epoch, "Worker stopped");
}

/// Resolves once the snapshot no longer shows `(step, epoch)`.
async fn left(snapshot_rx: &mut watch::Receiver<SessionSnapshot>, step: AuthStep, epoch: u64) {
    // A dropped sender means the orchestrator is gone, which also ends the step.
    let _ = snapshot_rx
        .wait_for(|snapshot| snapshot.step != step || snapshot.epoch != epoch)
        .await;
}

/// Read keys for the lifetime of the process.
pub(crate) fn spawn_keypad_worker(
    mut keypad: AnyKeypadDevice,
    input_tx: mpsc::Sender<Input>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Keypad worker started");
        loop {
            match keypad.read_input().await {
                Ok(key) => {
                    if let Err(e) = keypad.beep(KEY_CLICK_MS).await {
                        debug!(error = %e, "Keypad click failed");
                    }
                    if input_tx.send(Input::Key(key)).await.is_err() {
                        break;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Keypad read failed");
                    tokio::time::sleep(KEYPAD_RETRY_INTERVAL).await;
                }
                Err(e) => {
                    warn!(error = %e, "Keypad unavailable, hotkeys disabled");
                    break;
                }
            }
        }
        debug!("Keypad worker stopped");
    })
}

#[derive(Debug)]
struct RunningWorker {
    step: AuthStep,
    epoch: u64,
    task: JoinHandle<()>,
}

/// At most one live polling worker, bound to the current step.
#[derive(Debug, Default)]
pub(crate) struct WorkerRegistry {
    current: Option<RunningWorker>,
}

impl WorkerRegistry {
    /// Make sure a worker for `(step, epoch)` is running.
    ///
    /// Does nothing while a live worker for the same step and epoch exists.
    /// Any other worker, whether from an older epoch or another step, is
    /// aborted first. Returns whether `spawn` started a worker.
    pub(crate) fn ensure<F>(&mut self, step: AuthStep, epoch: u64, spawn: F) -> bool
    where
        F: FnOnce() -> Option<JoinHandle<()>>,
    {
        if let Some(worker) = &self.current {
            if worker.step == step && worker.epoch == epoch && !worker.task.is_finished() {
                return false;
            }
        }
        self.abort_all();

        match spawn() {
            Some(task) => {
                self.current = Some(RunningWorker { step, epoch, task });
                true
            }
            None => false,
        }
    }

    /// Number of workers still running.
    #[cfg(test)]
    pub(crate) fn live(&mut self) -> usize {
        if self.current.as_ref().is_some_and(|w| w.task.is_finished()) {
            self.current = None;
        }
        usize::from(self.current.is_some())
    }

    pub(crate) fn abort_all(&mut self) {
        if let Some(worker) = self.current.take() {
            worker.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadlock_core::CardUid;
    use quadlock_hardware::sim::{FaceScene, SimCard, SimFace, SimFingerprint, SimKeypad};
    use quadlock_hardware::KeypadInput;

    struct Fixture {
        ctx: WorkerContext,
        input_rx: mpsc::Receiver<Input>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        face: quadlock_hardware::sim::SimFaceHandle,
        card: quadlock_hardware::sim::SimCardHandle,
    }

    fn fixture(step: AuthStep, epoch: u64) -> Fixture {
        let (face, face_handle) = SimFace::new();
        let (fingerprint, _) = SimFingerprint::new();
        let (card, card_handle) = SimCard::new();
        let (input_tx, input_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot {
            step,
            epoch,
            ..SessionSnapshot::default()
        });
        let (events, _) = broadcast::channel(16);

        let ctx = WorkerContext {
            verifiers: SharedVerifiers::new(
                AnyFaceVerifier::Simulated(face),
                AnyFingerprintVerifier::Simulated(fingerprint),
                AnyCardVerifier::Simulated(card),
            ),
            input_tx,
            snapshot_rx,
            events,
            face_poll_interval: Duration::from_millis(30),
            fingerprint_poll_timeout: Duration::from_secs(10),
            card_poll_timeout: Duration::from_secs(8),
            factor_retry_delay: Duration::from_secs(1),
        };

        Fixture {
            ctx,
            input_rx,
            snapshot_tx,
            face: face_handle,
            card: card_handle,
        }
    }

    fn pending_task() -> Option<JoinHandle<()>> {
        Some(tokio::spawn(std::future::pending()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_face_worker_forwards_verdicts_and_frames() {
        let mut fx = fixture(AuthStep::Face, 1);
        let mut events = fx.ctx.events.subscribe();
        fx.face.enroll_person("alice");
        fx.face.show(FaceScene::person("alice"));

        let task = spawn_worker(fx.ctx.clone(), AuthStep::Face, 1).unwrap();

        match fx.input_rx.recv().await {
            Some(Input::FaceVerdict { epoch: 1, verdict }) => assert!(verdict.is_match()),
            other => panic!("unexpected input: {other:?}"),
        }
        assert!(matches!(events.recv().await, Ok(StatusEvent::FaceFrame(_))));

        fx.snapshot_tx.send_modify(|s| s.step = AuthStep::Fingerprint);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_stops_on_new_epoch_mid_poll() {
        let mut fx = fixture(AuthStep::Card, 3);
        let task = spawn_worker(fx.ctx.clone(), AuthStep::Card, 3).unwrap();

        // The card poll is blocked waiting for a card; a restart must end it.
        tokio::time::sleep(Duration::from_secs(1)).await;
        fx.snapshot_tx.send_modify(|s| s.epoch = 4);
        task.await.unwrap();
        assert!(fx.input_rx.try_recv().is_err());

        // The reader lock was released with the dropped poll.
        let uid = CardUid::new(vec![1, 2, 3, 4]).unwrap();
        fx.card.present_card(uid.clone()).await.unwrap();
        let verdict = fx
            .ctx
            .verifiers
            .card
            .lock()
            .await
            .poll(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::matched(uid));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_error_becomes_verdict() {
        let mut fx = fixture(AuthStep::Card, 1);
        fx.card.inject_fault("antenna").await.unwrap();

        let _task = spawn_worker(fx.ctx.clone(), AuthStep::Card, 1).unwrap();
        match fx.input_rx.recv().await {
            Some(Input::CardVerdict {
                verdict: Verdict::SensorError { message },
                ..
            }) => assert!(message.contains("antenna")),
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_faults_are_retried_after_delay() {
        let mut fx = fixture(AuthStep::Card, 1);
        fx.card.inject_fault("antenna").await.unwrap();
        fx.card.inject_fault("antenna").await.unwrap();

        let _task = spawn_worker(fx.ctx.clone(), AuthStep::Card, 1).unwrap();
        assert!(matches!(fx.input_rx.recv().await, Some(Input::CardVerdict { .. })));
        let first = tokio::time::Instant::now();
        assert!(matches!(fx.input_rx.recv().await, Some(Input::CardVerdict { .. })));

        assert!(first.elapsed() >= fx.ctx.factor_retry_delay);
    }

    #[test]
    fn test_unpolled_steps_have_no_worker() {
        let fx = fixture(AuthStep::Passcode, 1);
        for step in [AuthStep::Passcode, AuthStep::Admin, AuthStep::Lockout] {
            assert!(spawn_worker(fx.ctx.clone(), step, 1).is_none());
        }
    }

    #[tokio::test]
    async fn test_registry_start_is_idempotent() {
        let mut registry = WorkerRegistry::default();

        assert!(registry.ensure(AuthStep::Face, 1, pending_task));
        assert!(!registry.ensure(AuthStep::Face, 1, pending_task));
        assert_eq!(registry.live(), 1);

        assert!(registry.ensure(AuthStep::Face, 2, pending_task));
        tokio::task::yield_now().await;
        assert_eq!(registry.live(), 1);

        registry.abort_all();
        tokio::task::yield_now().await;
        assert_eq!(registry.live(), 0);
    }

    #[tokio::test]
    async fn test_registry_respawns_finished_worker() {
        let mut registry = WorkerRegistry::default();

        assert!(registry.ensure(AuthStep::Card, 1, || Some(tokio::spawn(async {}))));
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert!(registry.ensure(AuthStep::Card, 1, pending_task));
    }

    #[tokio::test]
    async fn test_registry_retires_worker_of_other_step() {
        let mut registry = WorkerRegistry::default();

        assert!(registry.ensure(AuthStep::Fingerprint, 1, pending_task));
        assert!(!registry.ensure(AuthStep::AdminAuth, 1, || None));
        assert_eq!(registry.live(), 0);

        // Back on the same step and epoch, a fresh worker is started.
        assert!(registry.ensure(AuthStep::Fingerprint, 1, pending_task));
        assert_eq!(registry.live(), 1);
    }

    #[tokio::test]
    async fn test_keypad_worker_forwards_keys() {
        let (keypad, handle) = SimKeypad::new();
        let (input_tx, mut input_rx) = mpsc::channel(8);
        let task = spawn_keypad_worker(AnyKeypadDevice::Simulated(keypad), input_tx);

        handle.send_input(KeypadInput::Star).await.unwrap();
        assert!(matches!(input_rx.recv().await, Some(Input::Key(KeypadInput::Star))));
        assert_eq!(handle.beep_count(), 1);

        drop(handle);
        task.await.unwrap();
    }
}
