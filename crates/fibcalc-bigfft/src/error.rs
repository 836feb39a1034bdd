//! Error type of the multiplication engine.

/// Failure of an FFT multiplication.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FftError {
    /// An invariant of the transform pipeline was violated.
    #[error("internal fault: {0}")]
    InternalFault(String),

    /// The caller's interrupt fired before the product was complete.
    #[error("multiplication cancelled")]
    Cancelled,

    /// A tuning parameter is outside its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl FftError {
    pub(crate) fn fault(msg: impl Into<String>) -> Self {
        Self::InternalFault(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FftError>;
