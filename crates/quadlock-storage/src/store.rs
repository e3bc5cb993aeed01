use crate::backend::{AnyCredentialBackend, CredentialBackend};
use crate::credentials::{Credentials, StoredDocument};
use crate::error::{StorageError, StorageResult};
use quadlock_core::{CardUid, FingerprintSlot, Passcode};
use tokio::sync::RwLock;
use tracing::{error, info};

/// Durable credential record with atomic, persist-before-apply mutations.
///
/// Every mutating call works on a copy of the record, writes the copy to
/// the backend and only then swaps it in. A failed write leaves both the
/// in-memory record and the stored document as they were. Mutations are
/// serialized by the write lock, which is held across the write.
///
/// # Examples
///
/// ```
/// use quadlock_storage::{CredentialStore, MemoryBackend};
///
/// #[tokio::main]
/// async fn main() -> quadlock_storage::StorageResult<()> {
///     let store = CredentialStore::open(MemoryBackend::new()).await?;
///     assert!(store.passcode_matches("1234").await);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct CredentialStore {
    backend: AnyCredentialBackend,
    current: RwLock<Credentials>,
}

impl CredentialStore {
    /// Load the record, filling and re-persisting any missing keys.
    ///
    /// A backend with no document yet is initialized with factory defaults.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be read or parsed, or when the merged
    /// record cannot be written back.
    pub async fn open(backend: impl Into<AnyCredentialBackend>) -> StorageResult<Self> {
        let backend = backend.into();

        let (credentials, needs_write) = match backend.load().await? {
            None => {
                info!("No credential document found, writing factory defaults");
                (Credentials::default(), true)
            }
            Some(bytes) => {
                let document: StoredDocument = serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::Corrupt(e.to_string()))?;
                let (credentials, changed) = document.merge_defaults();
                if changed {
                    info!("Credential document had missing keys or duplicates, rewriting it");
                }
                (credentials, changed)
            }
        };

        if needs_write {
            write_document(&backend, &credentials).await?;
        }

        info!(
            cards = credentials.valid_card_uids.len(),
            fingerprints = credentials.fingerprint_ids.len(),
            "Credential store loaded"
        );

        Ok(Self {
            backend,
            current: RwLock::new(credentials),
        })
    }

    /// Compare an entered code with the stored passcode in constant time.
    pub async fn passcode_matches(&self, entered: &str) -> bool {
        self.current.read().await.system_passcode.matches(entered)
    }

    pub async fn is_authorized_card(&self, uid: &CardUid) -> bool {
        self.current.read().await.is_authorized_card(uid)
    }

    pub async fn has_fingerprint(&self, slot: FingerprintSlot) -> bool {
        self.current.read().await.has_fingerprint(slot)
    }

    /// A copy of the current record.
    pub async fn snapshot(&self) -> Credentials {
        self.current.read().await.clone()
    }

    pub async fn set_passcode(&self, passcode: Passcode) -> StorageResult<()> {
        self.mutate("set_passcode", |c| {
            c.system_passcode = passcode;
            Ok(())
        })
        .await
    }

    /// Authorize a card. Rejects a UID that is already authorized.
    pub async fn add_card(&self, uid: CardUid) -> StorageResult<()> {
        self.mutate("add_card", |c| c.add_card(uid)).await
    }

    /// Revoke a card. Rejects a UID that is not authorized.
    pub async fn remove_card(&self, uid: &CardUid) -> StorageResult<()> {
        self.mutate("remove_card", |c| c.remove_card(uid)).await
    }

    pub async fn add_fingerprint(&self, slot: FingerprintSlot) -> StorageResult<()> {
        self.mutate("add_fingerprint", |c| c.add_fingerprint(slot))
            .await
    }

    pub async fn remove_fingerprint(&self, slot: FingerprintSlot) -> StorageResult<()> {
        self.mutate("remove_fingerprint", |c| c.remove_fingerprint(slot))
            .await
    }

    async fn mutate<F>(&self, operation: &'static str, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Credentials) -> quadlock_core::Result<()>,
    {
        let mut current = self.current.write().await;

        let mut next = current.clone();
        change(&mut next).map_err(StorageError::Validation)?;

        if let Err(e) = write_document(&self.backend, &next).await {
            error!(operation, error = %e, "Credential write failed, change not applied");
            return Err(e);
        }

        *current = next;
        info!(operation, "Credential store updated");
        Ok(())
    }
}

async fn write_document(
    backend: &AnyCredentialBackend,
    credentials: &Credentials,
) -> StorageResult<()> {
    let document = serde_json::to_vec_pretty(credentials)?;
    backend.save(&document).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn uid(bytes: &[u8]) -> CardUid {
        CardUid::new(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_open_empty_backend_persists_defaults() {
        let backend = MemoryBackend::new();
        let store = CredentialStore::open(backend.clone()).await.unwrap();

        assert_eq!(backend.write_count(), 1);
        assert_eq!(store.snapshot().await, Credentials::default());
    }

    #[tokio::test]
    async fn test_open_complete_document_does_not_rewrite() {
        let document = serde_json::to_vec(&Credentials::default()).unwrap();
        let backend = MemoryBackend::with_document(document);

        CredentialStore::open(backend.clone()).await.unwrap();
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_open_corrupt_document() {
        let backend = MemoryBackend::with_document("{ not json");
        let error = CredentialStore::open(backend).await.unwrap_err();
        assert!(matches!(error, StorageError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_failed_write_does_not_apply() {
        let backend = MemoryBackend::new();
        let store = CredentialStore::open(backend.clone()).await.unwrap();
        let stored_before = backend.document();

        backend.fail_next_writes(1);
        let result = store.add_card(uid(&[0xaa, 0xbb, 0xcc, 0xdd])).await;

        assert!(matches!(result, Err(StorageError::WriteRejected(_))));
        assert!(!store.is_authorized_card(&uid(&[0xaa, 0xbb, 0xcc, 0xdd])).await);
        assert_eq!(backend.document(), stored_before);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_write() {
        let backend = MemoryBackend::new();
        let store = CredentialStore::open(backend.clone()).await.unwrap();

        let result = store.remove_fingerprint(FingerprintSlot::new(42)).await;
        assert!(matches!(result, Err(StorageError::Validation(_))));
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_set_passcode() {
        let store = CredentialStore::open(MemoryBackend::new()).await.unwrap();

        store.set_passcode(Passcode::new("8642").unwrap()).await.unwrap();
        assert!(store.passcode_matches("8642").await);
        assert!(!store.passcode_matches("1234").await);
    }
}
