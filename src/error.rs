//! Error taxonomy for the MIFE engine.

use crate::index_set::IndexSet;
use thiserror::Error;

/// Every failure the engine surfaces. Level errors carry the index sets
/// involved so a parameter-sizing bug can be diagnosed from the message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MifeError {
    /// Caller error: bad slot index, wrong input length, invalid config.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backend returned no key (e.g. toplevel component overflow).
    #[error("backend key generation failed")]
    BackendKeygenFailed,

    /// A single encode operation failed; fatal to the enclosing setup/encrypt.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// Elementwise index-set subtraction went negative.
    #[error("level underflow: cannot subtract {current} from {target}")]
    LevelUnderflow { target: IndexSet, current: IndexSet },

    /// An encoding did not sit at the toplevel when the zero test required it.
    #[error("level mismatch: found {found}, expected {expected}")]
    LevelMismatch { found: IndexSet, expected: IndexSet },

    /// Two encodings could not be brought to a common level.
    #[error("inconsistent levels: {left} vs {right}")]
    InconsistentLevel { left: IndexSet, right: IndexSet },

    /// Malformed or truncated key/ciphertext bytes; the input is assumed corrupt.
    #[error("serialization error: {0}")]
    Serialization(&'static str),
}

impl MifeError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        MifeError::InvalidInput(msg.into())
    }
}
