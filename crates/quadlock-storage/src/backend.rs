#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Raw document storage behind the credential store.
///
/// A backend moves opaque bytes; parsing and defaulting happen in
/// [`CredentialStore`](crate::CredentialStore). `save` must either replace
/// the whole document or leave the previous one intact.
///
/// # Implementation Note
///
/// This trait uses native async trait methods (Edition 2024 feature),
/// so it is wrapped in [`AnyCredentialBackend`] for concrete dispatch.
pub trait CredentialBackend: Send + Sync {
    /// Read the stored document, `None` when nothing has been stored yet.
    async fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Replace the stored document.
    async fn save(&self, document: &[u8]) -> StorageResult<()>;
}

/// JSON file on local disk.
///
/// Writes go to a temporary sibling file which is then renamed over the
/// target, so a failed write never truncates the existing document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialBackend for JsonFileBackend {
    async fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }

    async fn save(&self, document: &[u8]) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, document)
            .await
            .map_err(|e| StorageError::io(&temp, e))?;

        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io(&self.path, e));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    document: Option<Vec<u8>>,
    failures_pending: u32,
    writes: u32,
}

/// In-memory backend with write-failure injection, for tests and dry runs.
///
/// Clones share the same document.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing document.
    pub fn with_document(document: impl Into<Vec<u8>>) -> Self {
        let backend = Self::default();
        backend.lock().document = Some(document.into());
        backend
    }

    /// Make the next `count` saves fail.
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().failures_pending = count;
    }

    /// The stored document, if any.
    pub fn document(&self) -> Option<Vec<u8>> {
        self.lock().document.clone()
    }

    /// Number of successful saves.
    pub fn write_count(&self) -> u32 {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialBackend for MemoryBackend {
    async fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.lock().document.clone())
    }

    async fn save(&self, document: &[u8]) -> StorageResult<()> {
        let mut state = self.lock();
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(StorageError::WriteRejected("injected write failure".to_string()));
        }
        state.document = Some(document.to_vec());
        state.writes += 1;
        Ok(())
    }
}

/// Enum wrapper for backend dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyCredentialBackend {
    JsonFile(JsonFileBackend),
    Memory(MemoryBackend),
}

impl CredentialBackend for AnyCredentialBackend {
    async fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        match self {
            Self::JsonFile(backend) => backend.load().await,
            Self::Memory(backend) => backend.load().await,
        }
    }

    async fn save(&self, document: &[u8]) -> StorageResult<()> {
        match self {
            Self::JsonFile(backend) => backend.save(document).await,
            Self::Memory(backend) => backend.save(document).await,
        }
    }
}

impl From<JsonFileBackend> for AnyCredentialBackend {
    fn from(backend: JsonFileBackend) -> Self {
        Self::JsonFile(backend)
    }
}

impl From<MemoryBackend> for AnyCredentialBackend {
    fn from(backend: MemoryBackend) -> Self {
        Self::Memory(backend)
    }
}
