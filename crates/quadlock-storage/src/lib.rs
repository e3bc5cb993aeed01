//! Credential storage for the quadlock door controller.
//!
//! This crate keeps the unlock passcode, the authorized card UIDs and the
//! enrolled fingerprint slot ids in one small JSON document:
//!
//! ```json
//! {
//!   "system_passcode": "1234",
//!   "valid_card_uids": [[27, 147, 242, 60]],
//!   "fingerprint_ids": [1, 2, 3]
//! }
//! ```
//!
//! # Architecture
//!
//! - [`CredentialStore`] - in-memory record with atomic CRUD operations
//! - [`CredentialBackend`] - raw document storage, implemented by
//!   [`JsonFileBackend`] and [`MemoryBackend`]
//! - [`Credentials`] - the record itself, with uniqueness rules
//!
//! Missing keys are filled with factory defaults on load and written back
//! immediately. The admin card and admin password are not stored here;
//! they are controller configuration and cannot be changed through this API.

pub mod backend;
pub mod credentials;
pub mod error;
pub mod store;

pub use backend::{AnyCredentialBackend, CredentialBackend, JsonFileBackend, MemoryBackend};
pub use credentials::Credentials;
pub use error::{StorageError, StorageResult};
pub use store::CredentialStore;
