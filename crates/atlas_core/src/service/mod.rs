//! Location use-case services.
//!
//! # Responsibility
//! - Orchestrate staging, commit, cascading delete and rename over the
//!   in-memory hierarchy and the persistence gateway.
//! - Keep callers decoupled from gateway details.

pub mod cascade;
pub mod commit;
pub mod error;
pub mod location_service;
pub mod staging;
