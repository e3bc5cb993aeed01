//! Authentication session state machine.
//!
//! [`AuthSession`] is the pure core of the controller: it owns the active
//! step, the attempt counters and the epoch, and turns every input into a
//! list of [`Effect`]s for the orchestrator to carry out. It never touches
//! hardware, time or channels itself, so every transition can be tested
//! synchronously.
//!
//! # Steps
//!
//! - `Idle`: before the first start and after shutdown
//! - `Face` → `Fingerprint` → `Card` → `Passcode`: the four factors
//! - `Unlocking` → `Locking`: door open, then relocked
//! - `Lockout`: a factor's attempt budget ran out
//! - `AdminAuth` → `Admin`: the administrative override
//!
//! # Epochs
//!
//! Every [`start`](AuthSession::start) increments the epoch. Verdicts and
//! timers carry the epoch they were produced under and are ignored once it
//! is stale, so a countdown or auto-restart from an older session can never
//! touch a newer one.
//!
//! # Examples
//!
//! ```
//! use quadlock_controller::session::{AuthSession, AuthStep, Reading, SessionPolicy};
//!
//! let mut session = AuthSession::new(SessionPolicy::default());
//! session.start();
//! let epoch = session.epoch();
//!
//! for _ in 0..5 {
//!     session.on_face(epoch, Reading::Accepted);
//! }
//! assert_eq!(session.step(), AuthStep::Fingerprint);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use quadlock_hardware::Verdict;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::actuator::DoorState;
use crate::config::ControllerConfig;
use crate::events::{Feedback, Prompt, StatusEvent};

/// Maximum number of step transitions kept in history.
///
/// A full unlock cycle is about seven transitions, so this covers the last
/// dozen or so cycles.
pub const MAX_HISTORY_SIZE: usize = 100;

/// The active stage of the authentication flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStep {
    /// Not authenticating: waiting for startup, or shut down.
    Idle,

    /// Waiting for consecutive face matches.
    Face,

    /// Waiting for an enrolled fingerprint.
    Fingerprint,

    /// Waiting for an authorized card.
    Card,

    /// Waiting for the passcode.
    Passcode,

    /// Waiting for the admin password.
    AdminAuth,

    /// Admin session open.
    Admin,

    /// Door passable; relock pending.
    Unlocking,

    /// Door relocked; restart pending.
    Locking,

    /// Attempt budget exhausted; restart pending.
    Lockout,
}

impl fmt::Display for AuthStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step_str = match self {
            AuthStep::Idle => "Idle",
            AuthStep::Face => "Face",
            AuthStep::Fingerprint => "Fingerprint",
            AuthStep::Card => "Card",
            AuthStep::Passcode => "Passcode",
            AuthStep::AdminAuth => "AdminAuth",
            AuthStep::Admin => "Admin",
            AuthStep::Unlocking => "Unlocking",
            AuthStep::Locking => "Locking",
            AuthStep::Lockout => "Lockout",
        };
        write!(f, "{}", step_str)
    }
}

impl AuthStep {
    /// Check if transition to target step is valid from this step.
    ///
    /// Any step may restart at `Face` or stop at `Idle`. The admin hotkey may
    /// interrupt any step except the admin steps themselves, and a failed
    /// admin password may resume the interrupted factor.
    ///
    /// # Examples
    ///
    /// ```
    /// use quadlock_controller::AuthStep;
    ///
    /// assert!(AuthStep::Card.can_transition_to(&AuthStep::Passcode));
    /// assert!(!AuthStep::Face.can_transition_to(&AuthStep::Passcode));
    /// ```
    pub fn can_transition_to(&self, target: &AuthStep) -> bool {
        use AuthStep::*;

        match (self, target) {
            (_, Face | Idle) => true,
            (AdminAuth | Admin, AdminAuth) => false,
            (_, AdminAuth) => true,
            (Face, Fingerprint) | (Fingerprint, Card) | (Card, Passcode) => true,
            (Fingerprint | Card | Passcode, Lockout) => true,
            (Passcode, Unlocking) | (Unlocking, Locking) => true,
            (AdminAuth, Admin | Fingerprint | Card | Passcode) => true,
            _ => false,
        }
    }

    /// One of the four sequential authentication factors.
    pub fn is_factor(&self) -> bool {
        matches!(
            self,
            AuthStep::Face | AuthStep::Fingerprint | AuthStep::Card | AuthStep::Passcode
        )
    }

    /// A step served by a sensor polling worker.
    pub fn is_polled(&self) -> bool {
        matches!(self, AuthStep::Face | AuthStep::Fingerprint | AuthStep::Card)
    }
}

/// A single step transition with timestamp.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: AuthStep,
    pub to: AuthStep,

    /// Epoch the transition happened in.
    pub epoch: u64,

    pub timestamp: Instant,
}

impl StateTransition {
    fn new(from: AuthStep, to: AuthStep, epoch: u64) -> Self {
        Self {
            from,
            to,
            epoch,
            timestamp: Instant::now(),
        }
    }

    /// Get the duration since this transition occurred.
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Failed attempts per capped factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempts {
    pub fingerprint: u32,
    pub card: u32,
    pub passcode: u32,
}

impl Attempts {
    /// Counter for `step`, `None` for steps without a budget.
    pub fn get(&self, step: AuthStep) -> Option<u32> {
        match step {
            AuthStep::Fingerprint => Some(self.fingerprint),
            AuthStep::Card => Some(self.card),
            AuthStep::Passcode => Some(self.passcode),
            _ => None,
        }
    }

    fn slot(&mut self, step: AuthStep) -> Option<&mut u32> {
        match step {
            AuthStep::Fingerprint => Some(&mut self.fingerprint),
            AuthStep::Card => Some(&mut self.card),
            AuthStep::Passcode => Some(&mut self.passcode),
            _ => None,
        }
    }
}

/// A verifier verdict reduced to what the state machine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    /// The factor was presented and is authorized.
    Accepted,

    /// Something was presented but is not authorized.
    Rejected,

    /// Nothing was presented before the poll ended.
    NoSignal,

    /// The sensor could not be read.
    SensorError(String),
}

impl<I> From<Verdict<I>> for Reading {
    fn from(verdict: Verdict<I>) -> Self {
        match verdict {
            Verdict::Match { .. } => Reading::Accepted,
            Verdict::Mismatch { .. } => Reading::Rejected,
            Verdict::NoSignal => Reading::NoSignal,
            Verdict::SensorError { message } => Reading::SensorError(message),
        }
    }
}

/// Deferred work, bound to the epoch it was scheduled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// First start after boot.
    Startup,

    /// Leave lockout and restart.
    LockoutReset,

    /// Show the passcode prompt again after a wrong code.
    PasscodeReprompt,

    /// One countdown tick while the door is open, bound to its own value.
    Countdown { remaining_secs: u32 },

    /// Restart after the door relocked.
    RelockRestart,
}

/// Work the orchestrator must carry out after an input.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Publish a status event.
    Emit(StatusEvent),

    /// Deliver `kind` back to the session after `after`, tagged with the
    /// current epoch.
    Schedule { kind: TimerKind, after: Duration },

    /// Unlock the door and schedule its relock.
    Unlock,
}

/// Budgets and delays the state machine applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    pub max_attempts: u32,
    pub required_face_matches: u32,
    pub sensor_alert_threshold: u32,
    pub lock_open_duration: Duration,
    pub relock_restart_delay: Duration,
    pub lockout_delay: Duration,
    pub passcode_reprompt_delay: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&ControllerConfig::default())
    }
}

impl From<&ControllerConfig> for SessionPolicy {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            required_face_matches: config.required_consecutive_face_matches,
            sensor_alert_threshold: config.sensor_fault_alert_threshold,
            lock_open_duration: config.lock_open_duration(),
            relock_restart_delay: Duration::from_millis(config.relock_restart_delay_ms),
            lockout_delay: Duration::from_millis(config.lockout_delay_ms),
            passcode_reprompt_delay: Duration::from_millis(config.passcode_reprompt_delay_ms),
        }
    }
}

/// Consistent read-only view of the session for display and workers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub step: AuthStep,
    pub epoch: u64,
    pub consecutive_face_matches: u32,
    pub attempts: Attempts,
    pub door: DoorState,

    /// Digits typed into the active prompt.
    pub entry_digits: usize,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            step: AuthStep::Idle,
            epoch: 0,
            consecutive_face_matches: 0,
            attempts: Attempts::default(),
            door: DoorState::Locked,
            entry_digits: 0,
        }
    }
}

/// How the current admin password prompt was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdminEntry {
    /// Hotkey, interrupting `interrupted`.
    Hotkey { interrupted: AuthStep },

    /// Admin card on the card step.
    Card,
}

/// The authentication session.
///
/// # Thread Safety
///
/// Not synchronized. The orchestrator task is its only owner; everyone else
/// reads a [`SessionSnapshot`].
#[derive(Debug)]
pub struct AuthSession {
    step: AuthStep,
    consecutive_face_matches: u32,
    attempts: Attempts,
    epoch: u64,
    admin_entry: Option<AdminEntry>,
    consecutive_sensor_errors: u32,
    history: VecDeque<StateTransition>,
    policy: SessionPolicy,
}

impl AuthSession {
    /// Create an idle session at epoch 0.
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            step: AuthStep::Idle,
            consecutive_face_matches: 0,
            attempts: Attempts::default(),
            epoch: 0,
            admin_entry: None,
            consecutive_sensor_errors: 0,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            policy,
        }
    }

    pub fn step(&self) -> AuthStep {
        self.step
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn consecutive_face_matches(&self) -> u32 {
        self.consecutive_face_matches
    }

    pub fn attempts(&self) -> Attempts {
        self.attempts
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    pub fn snapshot(&self, door: DoorState, entry_digits: usize) -> SessionSnapshot {
        SessionSnapshot {
            step: self.step,
            epoch: self.epoch,
            consecutive_face_matches: self.consecutive_face_matches,
            attempts: self.attempts,
            door,
            entry_digits,
        }
    }

    /// Begin a fresh authentication cycle at `Face`.
    ///
    /// Advances the epoch, which invalidates every pending timer and every
    /// in-flight verdict of the previous cycle, and zeroes all counters.
    pub fn start(&mut self) -> Vec<Effect> {
        self.epoch += 1;
        self.consecutive_face_matches = 0;
        self.attempts = Attempts::default();
        self.admin_entry = None;

        info!(epoch = self.epoch, "Authentication started");

        let mut effects = Vec::new();
        self.enter(AuthStep::Face, &mut effects);
        effects
    }

    /// Stop authenticating. Pending timers and verdicts become stale.
    pub fn stop(&mut self) -> Vec<Effect> {
        self.epoch += 1;
        self.admin_entry = None;

        let mut effects = Vec::new();
        self.enter(AuthStep::Idle, &mut effects);
        effects
    }

    pub fn on_face(&mut self, epoch: u64, reading: Reading) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.accepts(epoch, AuthStep::Face) {
            return effects;
        }

        let required = self.policy.required_face_matches;
        match reading {
            Reading::Accepted => {
                self.consecutive_sensor_errors = 0;
                self.consecutive_face_matches += 1;
                effects.push(Effect::Emit(StatusEvent::FaceProgress {
                    consecutive: self.consecutive_face_matches,
                    required,
                }));

                if self.consecutive_face_matches >= required {
                    self.pass_factor(&mut effects);
                    self.attempts.fingerprint = 0;
                    self.enter(AuthStep::Fingerprint, &mut effects);
                }
            }
            Reading::Rejected | Reading::NoSignal => {
                self.consecutive_sensor_errors = 0;
                self.reset_face_streak(&mut effects);
            }
            Reading::SensorError(message) => {
                self.reset_face_streak(&mut effects);
                self.sensor_fault(message, &mut effects);
            }
        }

        effects
    }

    pub fn on_fingerprint(&mut self, epoch: u64, reading: Reading) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.accepts(epoch, AuthStep::Fingerprint) {
            return effects;
        }

        if reading == Reading::Accepted {
            self.consecutive_sensor_errors = 0;
            self.pass_factor(&mut effects);
            self.attempts.card = 0;
            self.enter(AuthStep::Card, &mut effects);
        } else {
            self.fail_reading(reading, &mut effects);
        }

        effects
    }

    pub fn on_card(&mut self, epoch: u64, reading: Reading) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.accepts(epoch, AuthStep::Card) {
            return effects;
        }

        if reading == Reading::Accepted {
            self.consecutive_sensor_errors = 0;
            self.pass_factor(&mut effects);
            self.attempts.passcode = 0;
            self.enter(AuthStep::Passcode, &mut effects);
        } else {
            self.fail_reading(reading, &mut effects);
        }

        effects
    }

    /// The admin card was read on the card step.
    ///
    /// Takes precedence over normal card evaluation and consumes no attempt.
    pub fn on_admin_card(&mut self, epoch: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.accepts(epoch, AuthStep::Card) {
            return effects;
        }

        info!("Admin card presented");
        self.admin_entry = Some(AdminEntry::Card);
        self.enter(AuthStep::AdminAuth, &mut effects);
        effects
    }

    /// A passcode was submitted; `correct` is the store's verdict.
    pub fn on_passcode(&mut self, correct: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.step != AuthStep::Passcode {
            debug!(step = %self.step, "Passcode submitted outside passcode step, ignored");
            return effects;
        }

        if correct {
            self.pass_factor(&mut effects);
            self.enter(AuthStep::Unlocking, &mut effects);
        } else {
            self.fail_attempt(&mut effects);
        }

        effects
    }

    /// The admin hotkey was pressed.
    ///
    /// Interrupts the current step without consuming its attempt budget.
    pub fn force_admin(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.step.can_transition_to(&AuthStep::AdminAuth) {
            debug!(step = %self.step, "Admin hotkey ignored");
            return effects;
        }

        info!(interrupted = %self.step, "Admin mode requested");
        self.admin_entry = Some(AdminEntry::Hotkey {
            interrupted: self.step,
        });
        self.enter(AuthStep::AdminAuth, &mut effects);
        effects
    }

    /// An admin password was submitted; `correct` is the comparison result.
    pub fn on_admin_password(&mut self, correct: bool) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.step != AuthStep::AdminAuth {
            debug!(step = %self.step, "Admin password submitted outside admin prompt, ignored");
            return effects;
        }

        if correct {
            self.admin_entry = None;
            effects.push(Effect::Emit(Feedback::Success.into()));
            self.enter(AuthStep::Admin, &mut effects);
        } else {
            warn!("Wrong admin password");
            effects.push(Effect::Emit(Feedback::Error.into()));
            self.leave_admin_prompt(&mut effects);
        }

        effects
    }

    /// The active prompt was cancelled.
    ///
    /// Cancelling the passcode prompt restarts at `Face`; cancelling the
    /// admin prompt behaves like a wrong admin password.
    pub fn cancel_prompt(&mut self) -> Vec<Effect> {
        match self.step {
            AuthStep::Passcode => {
                info!("Passcode prompt cancelled");
                self.start()
            }
            AuthStep::AdminAuth => {
                info!("Admin prompt cancelled");
                let mut effects = Vec::new();
                self.leave_admin_prompt(&mut effects);
                effects
            }
            _ => Vec::new(),
        }
    }

    /// Close the admin session and restart at `Face`.
    pub fn exit_admin(&mut self) -> Vec<Effect> {
        if self.step != AuthStep::Admin {
            return Vec::new();
        }
        info!("Admin session closed");
        self.start()
    }

    /// A timer scheduled under `epoch` fired.
    pub fn on_timer(&mut self, epoch: u64, kind: TimerKind) -> Vec<Effect> {
        if epoch != self.epoch {
            debug!(?kind, epoch, current = self.epoch, "Stale timer ignored");
            return Vec::new();
        }

        match (kind, self.step) {
            (TimerKind::Startup, AuthStep::Idle)
            | (TimerKind::LockoutReset, AuthStep::Lockout)
            | (TimerKind::RelockRestart, AuthStep::Locking) => self.start(),
            (TimerKind::PasscodeReprompt, AuthStep::Passcode) => {
                vec![Effect::Emit(StatusEvent::PromptOpened(self.passcode_prompt()))]
            }
            (TimerKind::Countdown { remaining_secs }, AuthStep::Unlocking) => vec![
                Effect::Emit(StatusEvent::CountdownTick { remaining_secs }),
                Effect::Emit(Feedback::Click.into()),
            ],
            _ => {
                debug!(?kind, step = %self.step, "Timer no longer applies");
                Vec::new()
            }
        }
    }

    /// The door relocked after an unlock issued in `epoch`.
    pub fn on_relocked(&mut self, epoch: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        if epoch == self.epoch && self.step == AuthStep::Unlocking {
            self.enter(AuthStep::Locking, &mut effects);
        }
        effects
    }

    fn accepts(&self, epoch: u64, step: AuthStep) -> bool {
        if epoch != self.epoch || self.step != step {
            debug!(
                verdict_step = %step,
                verdict_epoch = epoch,
                step = %self.step,
                epoch = self.epoch,
                "Stale verdict ignored"
            );
            return false;
        }
        true
    }

    fn enter(&mut self, to: AuthStep, effects: &mut Vec<Effect>) {
        let from = self.step;
        if !from.can_transition_to(&to) {
            error!(%from, %to, "Refusing invalid step transition");
            return;
        }

        self.step = to;
        self.consecutive_sensor_errors = 0;
        self.record_transition(from, to);
        info!(%from, %to, epoch = self.epoch, "Step changed");

        if from == AuthStep::Admin && to != AuthStep::Admin {
            effects.push(Effect::Emit(StatusEvent::AdminSessionClosed));
        }
        effects.push(Effect::Emit(StatusEvent::StepChanged {
            from,
            to,
            epoch: self.epoch,
        }));

        match to {
            AuthStep::Passcode => {
                effects.push(Effect::Emit(StatusEvent::PromptOpened(self.passcode_prompt())));
            }
            AuthStep::AdminAuth => {
                effects.push(Effect::Emit(StatusEvent::PromptOpened(Prompt::AdminPassword)));
            }
            AuthStep::Admin => {
                effects.push(Effect::Emit(StatusEvent::AdminSessionOpened));
            }
            AuthStep::Unlocking => self.schedule_unlock(effects),
            AuthStep::Locking => effects.push(Effect::Schedule {
                kind: TimerKind::RelockRestart,
                after: self.policy.relock_restart_delay,
            }),
            AuthStep::Lockout => {
                warn!(epoch = self.epoch, "Lockout");
                effects.push(Effect::Emit(Feedback::Error.into()));
                effects.push(Effect::Schedule {
                    kind: TimerKind::LockoutReset,
                    after: self.policy.lockout_delay,
                });
            }
            AuthStep::Face => self.consecutive_face_matches = 0,
            AuthStep::Idle | AuthStep::Fingerprint | AuthStep::Card => {}
        }
    }

    fn schedule_unlock(&self, effects: &mut Vec<Effect>) {
        effects.push(Effect::Unlock);
        effects.push(Effect::Emit(Feedback::Success.into()));

        let total = self.policy.lock_open_duration.as_millis().div_ceil(1000) as u32;
        effects.push(Effect::Emit(StatusEvent::CountdownTick {
            remaining_secs: total,
        }));
        for elapsed in 1..total {
            effects.push(Effect::Schedule {
                kind: TimerKind::Countdown {
                    remaining_secs: total - elapsed,
                },
                after: Duration::from_secs(u64::from(elapsed)),
            });
        }
    }

    fn pass_factor(&self, effects: &mut Vec<Effect>) {
        info!(step = %self.step, "Factor passed");
        effects.push(Effect::Emit(StatusEvent::FactorPassed(self.step)));
        effects.push(Effect::Emit(Feedback::Success.into()));
    }

    fn reset_face_streak(&mut self, effects: &mut Vec<Effect>) {
        if self.consecutive_face_matches > 0 {
            self.consecutive_face_matches = 0;
            effects.push(Effect::Emit(StatusEvent::FaceProgress {
                consecutive: 0,
                required: self.policy.required_face_matches,
            }));
        }
    }

    fn fail_reading(&mut self, reading: Reading, effects: &mut Vec<Effect>) {
        match reading {
            Reading::SensorError(message) => self.sensor_fault(message, effects),
            _ => self.consecutive_sensor_errors = 0,
        }
        self.fail_attempt(effects);
    }

    fn fail_attempt(&mut self, effects: &mut Vec<Effect>) {
        let step = self.step;
        let max = self.policy.max_attempts;
        let Some(slot) = self.attempts.slot(step) else {
            return;
        };
        *slot += 1;
        let attempts = *slot;

        warn!(%step, attempts, max, "Attempt failed");
        effects.push(Effect::Emit(StatusEvent::AttemptFailed {
            step,
            attempts,
            remaining: max.saturating_sub(attempts),
        }));

        if attempts >= max {
            self.enter(AuthStep::Lockout, effects);
            return;
        }

        effects.push(Effect::Emit(Feedback::Error.into()));
        if step == AuthStep::Passcode {
            effects.push(Effect::Schedule {
                kind: TimerKind::PasscodeReprompt,
                after: self.policy.passcode_reprompt_delay,
            });
        }
    }

    fn sensor_fault(&mut self, message: String, effects: &mut Vec<Effect>) {
        self.consecutive_sensor_errors += 1;
        let consecutive = self.consecutive_sensor_errors;

        warn!(step = %self.step, consecutive, %message, "Sensor fault");
        effects.push(Effect::Emit(StatusEvent::SensorFault {
            step: self.step,
            message,
            consecutive,
        }));

        if consecutive == self.policy.sensor_alert_threshold {
            error!(step = %self.step, consecutive, "Repeated sensor faults, check hardware");
            effects.push(Effect::Emit(StatusEvent::SensorAlert {
                step: self.step,
                consecutive,
            }));
            effects.push(Effect::Emit(Feedback::Warning.into()));
        }
    }

    fn leave_admin_prompt(&mut self, effects: &mut Vec<Effect>) {
        match self.admin_entry.take() {
            Some(AdminEntry::Hotkey { interrupted }) if interrupted.is_factor() => {
                info!(step = %interrupted, "Resuming interrupted step");
                self.enter(interrupted, effects);
            }
            _ => effects.append(&mut self.start()),
        }
    }

    fn passcode_prompt(&self) -> Prompt {
        Prompt::Passcode {
            attempts_left: self
                .policy
                .max_attempts
                .saturating_sub(self.attempts.passcode),
        }
    }

    fn record_transition(&mut self, from: AuthStep, to: AuthStep) {
        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history
            .push_back(StateTransition::new(from, to, self.epoch));
    }
}
