use thiserror::Error;

/// Result type alias using [`MapError`]
pub type Result<T> = std::result::Result<T, MapError>;

/// Errors that can occur when using a PathMap or one of the array types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// The requested key was not found
    #[error("The key {0} is unknown")]
    KeyNotFound(String),

    /// Attempted to access a value with a type that doesn't match what was stored
    #[error("Requested a value of type {requested}, but the stored value has type {actual}")]
    TypeMismatch {
        /// Type the caller asked for
        requested: &'static str,
        /// Type actually held
        actual: &'static str,
    },

    /// Malformed shape, strides, slice or index
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The operation is not allowed in the current ownership state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An internal invariant was violated
    #[error("Internal invariant violated: {0}")]
    Internal(String),

    /// The shared store is already borrowed by a `with`/`with_mut` closure
    #[error("The store is already borrowed")]
    StoreBusy,
}

impl MapError {
    pub(crate) fn invalid_value(msg: impl Into<String>) -> Self {
        MapError::InvalidValue(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        MapError::InvalidState(msg.into())
    }
}
