use thiserror::Error;

/// Errors raised while framing serial bytes.
///
/// Malformed content (invalid UTF-8, over-long lines) is not an error at
/// this level: the codec drops it and logs, so only transport failures
/// surface here.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
