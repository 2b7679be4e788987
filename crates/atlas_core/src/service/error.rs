//! Location service error taxonomy.
//!
//! # Responsibility
//! - Report every failure with a human-readable message and a structured
//!   `LocationErrorKind`.
//!
//! # Invariants
//! - `Validation`, `SingletonViolation`, `IncompleteStructure`,
//!   `HasChildren`, `NotFound`, `InvalidTarget` and `Busy` are raised before
//!   any gateway call and leave state untouched.
//! - `PartialCommit` and `PartialDelete` carry what the gateway already
//!   confirmed; retrying them blindly is unsafe, reconcile with `refresh`.

use crate::gateway::GatewayError;
use crate::model::location::{CreatedLocation, Level, NodeKey, RemovedLocation, StagedId};
use crate::model::name::NameValidationError;
use crate::tree::completeness::Incompleteness;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Structured error kinds exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationErrorKind {
    Validation,
    IncompleteStructure,
    SingletonViolation,
    HasChildren,
    Gateway,
    PartialCommit,
    PartialDelete,
    NotFound,
    InvalidTarget,
    Busy,
}

/// Errors from location service operations.
#[derive(Debug)]
pub enum LocationError {
    /// Name rejected before any gateway call.
    Validation(NameValidationError),
    /// Commit attempted on a subtree that is not committable.
    IncompleteStructure {
        key: NodeKey,
        name: String,
        reason: Incompleteness,
    },
    /// Another staged new country is still incomplete.
    SingletonViolation { blocking: StagedId, name: String },
    /// Direct delete blocked by remaining persisted children.
    HasChildren {
        level: Level,
        name: String,
        child_level: Level,
        count: usize,
    },
    /// Gateway failed before anything was persisted.
    Gateway(GatewayError),
    /// Commit failed after some entities were already created.
    PartialCommit {
        created: Vec<CreatedLocation>,
        failed_level: Level,
        source: GatewayError,
    },
    /// Cascade stopped after some levels were already deleted.
    PartialDelete {
        removed: Vec<RemovedLocation>,
        failed_level: Level,
        source: GatewayError,
    },
    /// Key is unknown to the store and the staging area.
    NotFound(NodeKey),
    /// Key exists but is the wrong level, state or parent for this call.
    InvalidTarget { key: NodeKey, reason: String },
    /// Another mutating call is in flight.
    Busy,
}

impl LocationError {
    /// Structured kind of this error.
    pub fn kind(&self) -> LocationErrorKind {
        match self {
            Self::Validation(_) => LocationErrorKind::Validation,
            Self::IncompleteStructure { .. } => LocationErrorKind::IncompleteStructure,
            Self::SingletonViolation { .. } => LocationErrorKind::SingletonViolation,
            Self::HasChildren { .. } => LocationErrorKind::HasChildren,
            Self::Gateway(_) => LocationErrorKind::Gateway,
            Self::PartialCommit { .. } => LocationErrorKind::PartialCommit,
            Self::PartialDelete { .. } => LocationErrorKind::PartialDelete,
            Self::NotFound(_) => LocationErrorKind::NotFound,
            Self::InvalidTarget { .. } => LocationErrorKind::InvalidTarget,
            Self::Busy => LocationErrorKind::Busy,
        }
    }

    pub(crate) fn invalid_target(key: NodeKey, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            key,
            reason: reason.into(),
        }
    }
}

impl Display for LocationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::IncompleteStructure { name, reason, .. } => {
                write!(f, "'{name}' cannot be committed: {reason}")
            }
            Self::SingletonViolation { name, .. } => write!(
                f,
                "country '{name}' is still incomplete; finish or discard it before staging another"
            ),
            Self::HasChildren {
                level,
                name,
                child_level,
                count,
            } => write!(
                f,
                "{level} '{name}' still has {count} {child_level}(s); delete them first"
            ),
            Self::Gateway(err) => write!(f, "{err}"),
            Self::PartialCommit {
                created,
                failed_level,
                source,
            } => write!(
                f,
                "commit stopped while creating a {failed_level} after {} entities were created: {source}",
                created.len()
            ),
            Self::PartialDelete {
                removed,
                failed_level,
                source,
            } => write!(
                f,
                "cascade stopped while deleting a {failed_level} after {} entities were removed: {source}",
                removed.len()
            ),
            Self::NotFound(key) => write!(f, "location not found: {key}"),
            Self::InvalidTarget { key, reason } => write!(f, "invalid target {key}: {reason}"),
            Self::Busy => write!(f, "another location change is in progress"),
        }
    }
}

impl Error for LocationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Gateway(err) => Some(err),
            Self::PartialCommit { source, .. } => Some(source),
            Self::PartialDelete { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<NameValidationError> for LocationError {
    fn from(value: NameValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<GatewayError> for LocationError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}
