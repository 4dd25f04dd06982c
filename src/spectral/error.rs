use thiserror::Error;

/// Failures reported by the analysis/edit/synthesis core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectralError {
    /// Malformed input supplied by the caller (bad lengths, negative radius, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The spectral model is missing or inconsistent; re-run analysis first.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The request is well-formed but outside what the pipeline can reconstruct.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The pass was abandoned (new file loaded or explicit cancel); nothing was committed.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SpectralError>;

pub(crate) fn invalid_argument(msg: impl Into<String>) -> SpectralError {
    SpectralError::InvalidArgument(msg.into())
}

pub(crate) fn invalid_state(msg: impl Into<String>) -> SpectralError {
    SpectralError::InvalidState(msg.into())
}

pub(crate) fn not_supported(msg: impl Into<String>) -> SpectralError {
    SpectralError::NotSupported(msg.into())
}
