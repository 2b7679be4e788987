//! Core domain logic for the atlas location hierarchy.
//! This crate is the single source of truth for country/city/delegation
//! invariants.

pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod service;
pub mod tree;

pub use gateway::{GatewayError, GatewayResult, LocationGateway, SqliteLocationGateway};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::location::{
    City, Country, CreatedLocation, Delegation, Level, LocationId, LocationView, NodeKey,
    RemovedLocation, StagedId,
};
pub use model::name::{validate_name, NameValidationError};
pub use service::cascade::{DeleteOutcome, DeleteReport};
pub use service::error::{LocationError, LocationErrorKind};
pub use service::location_service::{LocationService, StagedAddition, StagingSnapshot};
pub use service::staging::UnstageReport;
pub use tree::completeness::{find_incompleteness, is_complete, Incompleteness};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
