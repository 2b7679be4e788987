//! Location name validation.
//!
//! # Responsibility
//! - Normalize user-entered names for every hierarchy level.
//!
//! # Invariants
//! - Accepted names are trimmed and contain at least one non-whitespace
//!   character.
//! - The same rule applies to create and rename, staged and persisted.
//! - Sibling uniqueness is not checked here.

use crate::model::location::Level;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Name rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    /// Input is empty or whitespace-only.
    Blank { level: Level },
}

impl NameValidationError {
    /// Level the rejected name was meant for.
    pub fn level(&self) -> Level {
        match self {
            Self::Blank { level } => *level,
        }
    }
}

impl Display for NameValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank { level } => write!(f, "{level} name must not be blank"),
        }
    }
}

impl Error for NameValidationError {}

/// Validates and normalizes one raw name for `level`.
///
/// Returns the trimmed name on success.
pub fn validate_name(level: Level, raw: &str) -> Result<String, NameValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NameValidationError::Blank { level });
    }
    Ok(trimmed.to_string())
}
