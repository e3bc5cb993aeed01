use thiserror::Error;

/// Storage-specific error types for the credential store.
///
/// Validation failures carry the user-facing [`quadlock_core::Error`] so
/// the specific reason survives the trip through this crate.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored document could not be parsed
    #[error("Corrupt credential document: {0}")]
    Corrupt(String),

    /// The document could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend refused the write (used by the in-memory backend)
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// The requested mutation is invalid for the current contents
    #[error(transparent)]
    Validation(quadlock_core::Error),
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<StorageError> for quadlock_core::Error {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Validation(inner) => inner,
            other => quadlock_core::Error::Persistence(other.to_string()),
        }
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use quadlock_core::ErrorCategory;

    #[test]
    fn test_validation_keeps_category() {
        let error: quadlock_core::Error =
            StorageError::Validation(quadlock_core::Error::DuplicateCard("01:02:03:04".into()))
                .into();
        assert_eq!(error.category(), ErrorCategory::Validation);
        assert_eq!(error.to_string(), "Card 01:02:03:04 is already authorized");
    }

    #[test]
    fn test_write_failure_is_persistence() {
        let error: quadlock_core::Error = StorageError::WriteRejected("disk full".into()).into();
        assert_eq!(error.category(), ErrorCategory::Persistence);
        assert!(error.to_string().contains("disk full"));
    }
}
