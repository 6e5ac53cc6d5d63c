use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Mailbox error types.
///
/// None of these is fatal to the bridge: each is contained by the caller,
/// logged, and the affected file or event is dropped.
#[derive(Debug, Error)]
pub enum MailboxError {
    /// Filesystem operation failed
    #[error("Filesystem error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Command file is not a JSON object
    #[error("Malformed command {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Command names a product the dispenser does not carry
    #[error("Invalid product type in {}: {value:?}", path.display())]
    InvalidProductType { path: PathBuf, value: Option<String> },

    /// Record could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No free scan id after repeated collisions
    #[error("No free scan id after {attempts} attempts")]
    ScanIdExhausted { attempts: usize },
}

impl MailboxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the file the operation targeted no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// Returns `true` for content errors that reject a command file.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::InvalidProductType { .. })
    }
}

/// Specialized result type for mailbox operations
pub type MailboxResult<T> = Result<T, MailboxError>;
