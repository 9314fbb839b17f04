// ABOUTME: Error taxonomy for the relay loops and their startup
// ABOUTME: Ingest errors are logged per cycle; only startup errors are fatal

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to access snapshot {path:?}: {source}")]
    SourceAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode snapshot {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no position store provided")]
    MissingStore,

    #[error("no event sink provided")]
    MissingSink,

    #[error("no relay configuration provided")]
    MissingConfig,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelayError {
    pub(crate) fn source_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RelayError::SourceAccess {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        RelayError::Decode {
            path: path.into(),
            source,
        }
    }
}
