//! Errors specific to the storage backends.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to read rule file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write rule file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize rule definitions: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl From<BackendError> for auditwatch_engine::storage::StorageError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Read { .. } | BackendError::Parse { .. } => {
                auditwatch_engine::storage::StorageError::ReadFailed(err.to_string())
            }
            BackendError::Write { .. } | BackendError::Serialize(_) => {
                auditwatch_engine::storage::StorageError::WriteFailed(err.to_string())
            }
        }
    }
}
