use std::fmt;

use thiserror::Error;

/// The file violates the MSB format in some way: a bad signature, an
/// offset that should have been zero (or wasn't), a validator rejecting a
/// padded struct, a dangling reference index, and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    pub field: String,
    pub reason: String,
}

impl FormatError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn with_value(field: impl Into<String>, reason: impl Into<String>, value: impl fmt::Debug) -> Self {
        Self {
            field: field.into(),
            reason: format!("{} (found {:?})", reason.into(), value),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format error in field `{}`: {}", self.field, self.reason)
    }
}

impl std::error::Error for FormatError {}

/// Every fallible operation in this crate returns one of these two kinds.
#[derive(Debug, Error)]
pub enum MsbError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MsbError>;
