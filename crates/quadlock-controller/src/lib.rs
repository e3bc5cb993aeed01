//! Authentication orchestrator for the quadlock door controller.
//!
//! The door opens only after four factors pass in order: face, fingerprint,
//! card and passcode. This crate sequences them, enforces the attempt
//! budgets and lockout, arbitrates the admin override and drives the door
//! relay.
//!
//! # Architecture
//!
//! - [`session`] - the pure [`AuthSession`] state machine
//! - [`orchestrator`] - the single task owning the session, and its
//!   [`OrchestratorHandle`]
//! - [`actuator`] - the [`DoorActuator`] with its auto-relock
//! - [`admin`] - the [`AdminSession`] credential management surface
//! - [`events`] - [`StatusEvent`]s for the presentation layer
//! - [`config`] - [`ControllerConfig`]
//!
//! Polling workers and timers are internal: they only ever send inputs to
//! the orchestrator, tagged with the epoch they belong to.
//!
//! # Example
//!
//! ```no_run
//! use quadlock_controller::{AuthStep, ControllerConfig, Devices, Orchestrator};
//! use quadlock_storage::{CredentialStore, JsonFileBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ControllerConfig::default();
//!     let store = CredentialStore::open(JsonFileBackend::new(&config.credential_path)).await?;
//!     let (devices, sim) = Devices::simulated();
//!
//!     let controller = Orchestrator::spawn(config, devices, store).await?;
//!     controller.start_authentication().await?;
//!
//!     sim.face.enroll_person("alice");
//!     sim.face.show(quadlock_hardware::sim::FaceScene::person("alice"));
//!
//!     let mut state = controller.watch();
//!     state.wait_for(|s| s.step == AuthStep::Fingerprint).await?;
//!     Ok(())
//! }
//! ```

pub mod actuator;
pub mod admin;
pub mod config;
pub mod events;
pub mod orchestrator;
pub mod session;
mod timer;
mod worker;

pub use actuator::{DoorActuator, DoorState};
pub use admin::{AdminSession, CredentialSummary};
pub use config::{AdminIdentity, ControllerConfig, HardwareMode};
pub use events::{Feedback, Prompt, StatusEvent};
pub use orchestrator::{Devices, Orchestrator, OrchestratorHandle, SimulatedHandles};
pub use session::{
    Attempts, AuthSession, AuthStep, MAX_HISTORY_SIZE, SessionPolicy, SessionSnapshot,
    StateTransition,
};
