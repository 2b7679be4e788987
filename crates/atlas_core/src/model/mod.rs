//! Location hierarchy domain model.
//!
//! # Responsibility
//! - Define identifiers, levels and read models shared by every layer.
//! - Own the per-level name rule.
//!
//! # Invariants
//! - Persisted and staged nodes are distinguished by `NodeKey`, never by
//!   separate collections.

pub mod location;
pub mod name;
