//! Identifier parsing errors.

use thiserror::Error;

/// Errors raised while parsing caller-supplied identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The identifier was empty.
    #[error("{kind} must not be empty")]
    Empty {
        /// Which identifier was being parsed.
        kind: &'static str,
    },

    /// The identifier exceeded the maximum length.
    #[error("{kind} exceeds {max} characters")]
    TooLong {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// The maximum permitted length.
        max: usize,
    },

    /// The identifier contained a character outside the permitted set.
    #[error("{kind} contains invalid character {ch:?}")]
    InvalidChar {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// The offending character.
        ch: char,
    },

    /// The identifier was not a valid UUID.
    #[error("{kind} is not a valid UUID: {reason}")]
    InvalidUuid {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// Parser message.
        reason: String,
    },
}

/// Result type for identifier parsing.
pub type IdResult<T> = Result<T, IdError>;
