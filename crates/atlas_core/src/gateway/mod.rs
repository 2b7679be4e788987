//! Persistence gateway contract for the location hierarchy.
//!
//! # Responsibility
//! - Define the only collaborator the core calls to create, rename and
//!   delete persisted locations.
//! - Keep storage and transport details behind one trait.
//!
//! # Invariants
//! - Every successful create returns a fresh gateway-issued id.
//! - Implementations report every failure, including timeouts, as
//!   `GatewayError`; the core never retries on its own.
//! - `fetch_hierarchy` returns countries, cities and delegations in stable
//!   sibling order.

use crate::db::DbError;
use crate::model::location::{Country, Level, LocationId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub use sqlite::SqliteLocationGateway;

/// Result type used by gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors reported by a persistence gateway.
#[derive(Debug)]
pub enum GatewayError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target location does not exist on the persistence side.
    NotFound { level: Level, id: LocationId },
    /// Call did not complete in time.
    Timeout { operation: &'static str },
    /// Backend refused or could not be reached.
    Unavailable(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { level, id } => write!(f, "{level} not found: {id}"),
            Self::Timeout { operation } => write!(f, "gateway call timed out: {operation}"),
            Self::Unavailable(message) => write!(f, "gateway unavailable: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "location gateway requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "location gateway requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid location data: {message}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence collaborator for countries, cities and delegations.
pub trait LocationGateway {
    /// Creates one country and returns its id.
    fn create_country(&self, name: &str) -> GatewayResult<LocationId>;
    /// Creates one city under an existing country.
    fn create_city(&self, country_id: LocationId, name: &str) -> GatewayResult<LocationId>;
    /// Creates one delegation under an existing city.
    fn create_delegation(&self, city_id: LocationId, name: &str) -> GatewayResult<LocationId>;
    fn rename_country(&self, id: LocationId, name: &str) -> GatewayResult<()>;
    fn rename_city(&self, id: LocationId, name: &str) -> GatewayResult<()>;
    fn rename_delegation(&self, id: LocationId, name: &str) -> GatewayResult<()>;
    /// Deletes one country; the backend may refuse while cities remain.
    fn delete_country(&self, id: LocationId) -> GatewayResult<()>;
    /// Deletes one city; the backend may refuse while delegations remain.
    fn delete_city(&self, id: LocationId) -> GatewayResult<()>;
    fn delete_delegation(&self, id: LocationId) -> GatewayResult<()>;
    /// Loads the full persisted hierarchy.
    fn fetch_hierarchy(&self) -> GatewayResult<Vec<Country>>;
}
