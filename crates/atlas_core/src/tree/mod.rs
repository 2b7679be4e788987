//! In-memory location hierarchy.
//!
//! # Responsibility
//! - Store persisted and staged nodes in one arena.
//! - Provide pure completeness checks over subtrees.

pub mod arena;
pub mod completeness;
