//! Authentication orchestrator.
//!
//! The orchestrator is a single task that owns the [`AuthSession`]. Every
//! request from the outside world (handle calls, key presses, verifier
//! verdicts, timers, relock notifications) arrives as an input on one
//! channel and is processed to completion before the next one, so session
//! mutation is serialized without locks.
//!
//! After each input the orchestrator:
//!
//! 1. carries out the session's effects (events, timers, unlock)
//! 2. publishes a fresh [`SessionSnapshot`]
//! 3. makes sure the polling worker for the current step is running
//!
//! # Examples
//!
//! ```no_run
//! use quadlock_controller::{ControllerConfig, Devices, Orchestrator};
//! use quadlock_storage::{CredentialStore, MemoryBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (devices, _handles) = Devices::simulated();
//!     let store = CredentialStore::open(MemoryBackend::new()).await?;
//!
//!     let controller = Orchestrator::spawn(ControllerConfig::default(), devices, store).await?;
//!     controller.start_authentication().await?;
//!
//!     controller.request_exit().await?;
//!     controller.join().await?;
//!     Ok(())
//! }
//! ```

use crate::actuator::{DoorActuator, DoorState};
use crate::admin::AdminSession;
use crate::config::ControllerConfig;
use crate::events::{Feedback, StatusEvent};
use crate::session::{
    AuthSession, AuthStep, Effect, Reading, SessionPolicy, SessionSnapshot, TimerKind,
};
use crate::timer::Timers;
use crate::worker::{
    SharedVerifiers, WorkerContext, WorkerRegistry, spawn_keypad_worker, spawn_worker,
};
use quadlock_core::constants::MAX_PASSCODE_LENGTH;
use quadlock_core::{CardUid, Error, FingerprintSlot, Result};
use quadlock_hardware::sim::{
    SimCard, SimCardHandle, SimFace, SimFaceHandle, SimFingerprint, SimFingerprintHandle,
    SimKeypad, SimKeypadHandle, SimRelay, SimRelayHandle,
};
use quadlock_hardware::{
    AnyCardVerifier, AnyFaceVerifier, AnyFingerprintVerifier, AnyKeypadDevice, AnyLockRelay,
    CardVerifier, DeviceInfo, FaceVerifier, FingerprintVerifier, KeypadDevice, KeypadInput,
    LockRelay, Verdict,
};
use quadlock_storage::CredentialStore;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Capacity of the input channel.
const INPUT_CHANNEL_SIZE: usize = 64;

/// Capacity of the status event channel. Face frames arrive at about 30 per
/// second, so slow subscribers drop frames before anything else matters.
const EVENT_CHANNEL_SIZE: usize = 256;

/// Text that must not show up in logs.
pub(crate) struct Secret(String);

impl Secret {
    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({} chars)", self.0.len())
    }
}

/// Everything the orchestrator reacts to.
#[derive(Debug)]
pub(crate) enum Input {
    Start,
    ForceAdmin,
    SubmitPasscode(Secret),
    SubmitAdminPassword(Secret),
    CancelPrompt,
    Key(KeypadInput),
    FaceVerdict {
        epoch: u64,
        verdict: Verdict<String>,
    },
    FingerprintVerdict {
        epoch: u64,
        verdict: Verdict<FingerprintSlot>,
    },
    CardVerdict {
        epoch: u64,
        verdict: Verdict<CardUid>,
    },
    Timer {
        epoch: u64,
        kind: TimerKind,
    },
    Relocked {
        epoch: u64,
    },
    AdminExit {
        epoch: u64,
    },
    Exit,
}

/// The peripherals one controller drives.
#[derive(Debug)]
pub struct Devices {
    pub face: AnyFaceVerifier,
    pub fingerprint: AnyFingerprintVerifier,
    pub card: AnyCardVerifier,
    pub keypad: AnyKeypadDevice,
    pub relay: AnyLockRelay,
}

/// Handles steering a fully simulated device set.
#[derive(Debug, Clone)]
pub struct SimulatedHandles {
    pub face: SimFaceHandle,
    pub fingerprint: SimFingerprintHandle,
    pub card: SimCardHandle,
    pub keypad: SimKeypadHandle,
    pub relay: SimRelayHandle,
}

impl Devices {
    /// A complete set of simulated devices plus their handles.
    pub fn simulated() -> (Self, SimulatedHandles) {
        let (face, face_handle) = SimFace::new();
        let (fingerprint, fingerprint_handle) = SimFingerprint::new();
        let (card, card_handle) = SimCard::new();
        let (keypad, keypad_handle) = SimKeypad::new();
        let (relay, relay_handle) = SimRelay::new();

        let devices = Self {
            face: AnyFaceVerifier::Simulated(face),
            fingerprint: AnyFingerprintVerifier::Simulated(fingerprint),
            card: AnyCardVerifier::Simulated(card),
            keypad: AnyKeypadDevice::Simulated(keypad),
            relay: AnyLockRelay::Simulated(relay),
        };
        let handles = SimulatedHandles {
            face: face_handle,
            fingerprint: fingerprint_handle,
            card: card_handle,
            keypad: keypad_handle,
            relay: relay_handle,
        };
        (devices, handles)
    }

    /// Ask every device to describe itself, keyed by its role.
    pub async fn inventory(&self) -> Vec<(&'static str, quadlock_hardware::Result<DeviceInfo>)> {
        vec![
            ("face", self.face.get_device_info().await),
            ("fingerprint", self.fingerprint.get_device_info().await),
            ("card", self.card.get_device_info().await),
            ("keypad", self.keypad.get_device_info().await),
            ("relay", self.relay.get_device_info().await),
        ]
    }

    async fn log_inventory(&self) {
        for (role, info) in self.inventory().await {
            match info {
                Ok(info) => info!(
                    role,
                    name = %info.name,
                    model = %info.model,
                    serial = info.serial_number.as_deref().unwrap_or("-"),
                    firmware = info.firmware_version.as_deref().unwrap_or("-"),
                    "Device ready"
                ),
                Err(e) => warn!(role, error = %e, "Device did not report its identity"),
            }
        }
    }
}

/// Digits typed on the keypad for the active prompt.
#[derive(Default)]
struct PasscodeEntry {
    digits: String,
}

impl PasscodeEntry {
    /// Append a digit. Returns `false` when the entry is full.
    fn push(&mut self, digit: u8) -> bool {
        if self.digits.len() >= MAX_PASSCODE_LENGTH {
            return false;
        }
        self.digits.push(char::from(b'0' + digit));
        true
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.digits)
    }

    fn clear(&mut self) {
        self.digits.clear();
    }

    fn len(&self) -> usize {
        self.digits.len()
    }

    fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }
}

/// State the admin session borrows from the controller.
#[derive(Debug)]
pub(crate) struct AdminContext {
    pub(crate) store: Arc<CredentialStore>,
    pub(crate) verifiers: SharedVerifiers,
    pub(crate) config: Arc<ControllerConfig>,
}

/// The orchestrator task.
pub struct Orchestrator {
    config: Arc<ControllerConfig>,
    session: AuthSession,
    store: Arc<CredentialStore>,
    actuator: DoorActuator,
    entry: PasscodeEntry,
    timers: Timers,
    workers: WorkerRegistry,
    worker_ctx: WorkerContext,
    background: Vec<JoinHandle<()>>,
    input_tx: mpsc::Sender<Input>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<StatusEvent>,
}

impl Orchestrator {
    /// Lock the door, start the keypad and spawn the orchestrator task.
    ///
    /// Authentication starts by itself after the configured startup delay.
    /// The controller runs until [`OrchestratorHandle::request_exit`].
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, or when the door cannot be locked.
    pub async fn spawn(
        config: ControllerConfig,
        devices: Devices,
        store: CredentialStore,
    ) -> Result<OrchestratorHandle> {
        config.validate()?;
        devices.log_inventory().await;

        let actuator = DoorActuator::new(
            devices.relay,
            config.relay_polarity,
            config.lock_open_duration(),
        )
        .await?;

        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
        let (events, first_subscriber) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let session = AuthSession::new(SessionPolicy::from(&config));
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot(actuator.state(), 0));

        let config = Arc::new(config);
        let store = Arc::new(store);
        let verifiers = SharedVerifiers::new(devices.face, devices.fingerprint, devices.card);

        let worker_ctx = WorkerContext {
            verifiers: verifiers.clone(),
            input_tx: input_tx.clone(),
            snapshot_rx: snapshot_rx.clone(),
            events: events.clone(),
            face_poll_interval: config.face_poll_interval(),
            fingerprint_poll_timeout: config.fingerprint_poll_timeout(),
            card_poll_timeout: config.card_poll_timeout(),
            factor_retry_delay: config.factor_retry_delay(),
        };

        let background = vec![
            spawn_keypad_worker(devices.keypad, input_tx.clone()),
            spawn_door_forwarder(actuator.subscribe(), events.clone()),
        ];

        let mut timers = Timers::new(input_tx.clone());
        timers.schedule(session.epoch(), TimerKind::Startup, config.startup_delay());

        let orchestrator = Orchestrator {
            config: Arc::clone(&config),
            session,
            store: Arc::clone(&store),
            actuator,
            entry: PasscodeEntry::default(),
            timers,
            workers: WorkerRegistry::default(),
            worker_ctx,
            background,
            input_tx: input_tx.clone(),
            snapshot_tx,
            events: events.clone(),
        };
        let task = tokio::spawn(orchestrator.run(input_rx));

        info!(
            mode = ?config.hardware_mode,
            startup_delay_ms = config.startup_delay_ms,
            "Controller started"
        );

        Ok(OrchestratorHandle {
            input_tx,
            snapshot_rx,
            events,
            first_subscriber: Arc::new(Mutex::new(Some(first_subscriber))),
            admin: Arc::new(AdminContext {
                store,
                verifiers,
                config,
            }),
            task: Arc::new(Mutex::new(Some(task))),
        })
    }

    async fn run(mut self, mut input_rx: mpsc::Receiver<Input>) {
        self.emit(Feedback::Startup.into());
        let credentials = self.store.snapshot().await;
        self.emit(StatusEvent::Ready {
            cards: credentials.valid_card_uids.len(),
            fingerprints: credentials.fingerprint_ids.len(),
        });

        while let Some(input) = input_rx.recv().await {
            if matches!(input, Input::Exit) {
                info!("Exit requested");
                break;
            }

            let effects = self.handle(input).await;
            self.apply(effects).await;
            self.publish();
            self.ensure_worker();
        }

        self.shutdown().await;
    }

    async fn handle(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Start => self.session.start(),
            Input::ForceAdmin => self.session.force_admin(),
            Input::SubmitPasscode(code) => self.submit_passcode(code.expose()).await,
            Input::SubmitAdminPassword(password) => self.submit_admin_password(password.expose()),
            Input::CancelPrompt => self.session.cancel_prompt(),
            Input::Key(key) => self.handle_key(key).await,
            Input::FaceVerdict { epoch, verdict } => {
                self.session.on_face(epoch, Reading::from(verdict))
            }
            Input::FingerprintVerdict { epoch, verdict } => {
                self.on_fingerprint(epoch, verdict).await
            }
            Input::CardVerdict { epoch, verdict } => self.on_card(epoch, verdict).await,
            Input::Timer { epoch, kind } => self.session.on_timer(epoch, kind),
            Input::Relocked { epoch } => self.session.on_relocked(epoch),
            Input::AdminExit { epoch } if epoch == self.session.epoch() => {
                self.session.exit_admin()
            }
            Input::AdminExit { .. } | Input::Exit => Vec::new(),
        }
    }

    async fn handle_key(&mut self, key: KeypadInput) -> Vec<Effect> {
        let mut effects = vec![Effect::Emit(Feedback::Click.into())];
        let step = self.session.step();

        match key {
            KeypadInput::Star => effects.extend(self.session.force_admin()),
            KeypadInput::Hash => effects.extend(self.session.start()),
            KeypadInput::Digit(digit) => {
                let prompt_open = matches!(step, AuthStep::Passcode | AuthStep::AdminAuth);
                if prompt_open && self.entry.push(digit) {
                    effects.push(Effect::Emit(StatusEvent::EntryChanged {
                        digits: self.entry.len(),
                    }));
                }
            }
            KeypadInput::Enter if !self.entry.is_empty() => {
                let entered = self.entry.take();
                effects.push(Effect::Emit(StatusEvent::EntryChanged { digits: 0 }));
                match step {
                    AuthStep::Passcode => effects.extend(self.submit_passcode(&entered).await),
                    AuthStep::AdminAuth => effects.extend(self.submit_admin_password(&entered)),
                    _ => {}
                }
            }
            KeypadInput::Clear => {
                self.entry.clear();
                effects.push(Effect::Emit(StatusEvent::EntryChanged { digits: 0 }));
            }
            KeypadInput::Cancel => effects.extend(self.session.cancel_prompt()),
            _ => {}
        }

        effects
    }

    async fn submit_passcode(&mut self, entered: &str) -> Vec<Effect> {
        if self.session.step() != AuthStep::Passcode {
            return Vec::new();
        }
        let correct = self.store.passcode_matches(entered).await;
        self.session.on_passcode(correct)
    }

    fn submit_admin_password(&mut self, entered: &str) -> Vec<Effect> {
        let correct = self.config.admin.password.matches(entered);
        self.session.on_admin_password(correct)
    }

    async fn on_fingerprint(
        &mut self,
        epoch: u64,
        verdict: Verdict<FingerprintSlot>,
    ) -> Vec<Effect> {
        let reading = match verdict {
            Verdict::Match { identity: slot, .. } => {
                if self.store.has_fingerprint(slot).await {
                    Reading::Accepted
                } else {
                    warn!(%slot, "Sensor matched a slot that is not enrolled");
                    Reading::Rejected
                }
            }
            other => Reading::from(other),
        };
        self.session.on_fingerprint(epoch, reading)
    }

    async fn on_card(&mut self, epoch: u64, verdict: Verdict<CardUid>) -> Vec<Effect> {
        match verdict {
            Verdict::Match { identity: uid, .. } => {
                if uid == self.config.admin.card_uid {
                    return self.session.on_admin_card(epoch);
                }
                let authorized = self.store.is_authorized_card(&uid).await;
                if !authorized {
                    warn!(card = %uid, "Card not authorized");
                }
                let reading = if authorized {
                    Reading::Accepted
                } else {
                    Reading::Rejected
                };
                self.session.on_card(epoch, reading)
            }
            other => self.session.on_card(epoch, Reading::from(other)),
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Emit(event) => {
                    if matches!(
                        event,
                        StatusEvent::StepChanged { .. } | StatusEvent::PromptOpened(_)
                    ) {
                        self.entry.clear();
                    }
                    self.emit(event);
                }
                Effect::Schedule { kind, after } => {
                    self.timers.schedule(self.session.epoch(), kind, after);
                }
                Effect::Unlock => {
                    let epoch = self.session.epoch();
                    let input_tx = self.input_tx.clone();
                    let relocked = async move {
                        let _ = input_tx.send(Input::Relocked { epoch }).await;
                    };

                    if let Err(e) = self.actuator.unlock_then(relocked).await {
                        error!(error = %e, "Unlock failed, restarting authentication");
                        self.emit(StatusEvent::from(&e));
                        self.emit(Feedback::Error.into());
                        // The rest of the batch belongs to the unlock that did not happen.
                        queue.clear();
                        queue.extend(self.session.start());
                    }
                }
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.session.snapshot(self.actuator.state(), self.entry.len());
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    /// Keep exactly the worker for the current step and epoch running.
    fn ensure_worker(&mut self) {
        let step = self.session.step();
        if !step.is_polled() {
            self.workers.abort_all();
            return;
        }
        let epoch = self.session.epoch();
        let ctx = self.worker_ctx.clone();
        self.workers
            .ensure(step, epoch, move || spawn_worker(ctx, step, epoch));
    }

    fn emit(&self, event: StatusEvent) {
        // Sending only fails without subscribers.
        let _ = self.events.send(event);
    }

    async fn shutdown(mut self) {
        for effect in self.session.stop() {
            if let Effect::Emit(event) = effect {
                self.emit(event);
            }
        }

        self.timers.cancel_all();
        self.workers.abort_all();
        if let Err(e) = self.actuator.shutdown().await {
            error!(error = %e, "Door could not be locked on exit");
            self.emit(StatusEvent::from(&e));
        }
        for task in self.background.drain(..) {
            task.abort();
        }

        self.publish();
        self.emit(StatusEvent::DoorChanged(self.actuator.state()));
        self.emit(StatusEvent::Stopped);
        info!("Controller stopped");
    }
}

fn spawn_door_forwarder(
    mut door_rx: watch::Receiver<DoorState>,
    events: broadcast::Sender<StatusEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while door_rx.changed().await.is_ok() {
            let state = *door_rx.borrow_and_update();
            let _ = events.send(StatusEvent::DoorChanged(state));
        }
    })
}

/// Cloneable handle to a running orchestrator.
///
/// Requests are queued and processed in order; a request that does not
/// apply to the current step is ignored. Every method fails with
/// [`Error::ControllerStopped`] once the orchestrator has exited.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    input_tx: mpsc::Sender<Input>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<StatusEvent>,
    first_subscriber: Arc<Mutex<Option<broadcast::Receiver<StatusEvent>>>>,
    pub(crate) admin: Arc<AdminContext>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl OrchestratorHandle {
    /// Restart at the face step with a new epoch.
    pub async fn start_authentication(&self) -> Result<()> {
        self.send(Input::Start).await
    }

    /// Interrupt the current step with the admin password prompt.
    pub async fn force_admin_mode(&self) -> Result<()> {
        self.send(Input::ForceAdmin).await
    }

    pub async fn submit_passcode(&self, code: &str) -> Result<()> {
        self.send(Input::SubmitPasscode(Secret(code.to_string())))
            .await
    }

    pub async fn submit_admin_password(&self, password: &str) -> Result<()> {
        self.send(Input::SubmitAdminPassword(Secret(password.to_string())))
            .await
    }

    /// Cancel the passcode or admin password prompt.
    pub async fn cancel_prompt(&self) -> Result<()> {
        self.send(Input::CancelPrompt).await
    }

    /// Open the admin session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] unless the admin password has been
    /// accepted and the session is still in the admin step.
    pub fn admin_session(&self) -> Result<AdminSession> {
        let snapshot = self.snapshot();
        if snapshot.step != AuthStep::Admin {
            return Err(Error::SessionClosed);
        }
        Ok(AdminSession::new(self.clone(), snapshot.epoch))
    }

    /// Stop all workers and timers, lock the door and end the orchestrator.
    pub async fn request_exit(&self) -> Result<()> {
        self.send(Input::Exit).await
    }

    /// Current session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch session state changes.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to status events.
    ///
    /// The first subscription also receives everything emitted since spawn,
    /// including the startup events.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.first_subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.events.subscribe())
    }

    /// Wait for the orchestrator task to finish.
    ///
    /// Only the first call waits; later calls return immediately.
    pub async fn join(&self) -> Result<()> {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            task.await
                .map_err(|e| Error::Hardware(format!("Controller task ended abnormally: {e}")))?;
        }
        Ok(())
    }

    pub(crate) async fn send(&self, input: Input) -> Result<()> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| Error::ControllerStopped)
    }
}
