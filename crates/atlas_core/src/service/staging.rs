//! Staging Area operations.
//!
//! # Responsibility
//! - Stage new countries, cities and delegations without touching the
//!   gateway.
//! - Unstage nodes and collapse staged ancestors left empty.
//!
//! # Invariants
//! - Names pass `validate_name` before anything is staged.
//! - At most one staged new country is incomplete at any time; both
//!   `stage_country` and `stage_city` enforce it, and `unstage` collapses
//!   emptied ancestors so it cannot leave a complete country incomplete.
//! - Unstaging never removes a persisted node.

use crate::gateway::LocationGateway;
use crate::model::location::{Level, NodeKey, RemovedLocation, StagedId};
use crate::model::name::validate_name;
use crate::service::error::LocationError;
use crate::service::location_service::LocationService;
use crate::tree::arena::{ArenaError, LocationArena};
use crate::tree::completeness::{incomplete_staged_root, incomplete_staged_root_except};
use log::info;
use serde::{Deserialize, Serialize};

/// Result of one `unstage` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstageReport {
    /// The node that was asked for.
    pub removed: RemovedLocation,
    /// Staged descendants removed with it, leaf-to-root.
    pub discarded_descendants: Vec<RemovedLocation>,
    /// Staged ancestors removed because they became empty, nearest first.
    pub collapsed_ancestors: Vec<RemovedLocation>,
}

impl<G: LocationGateway> LocationService<G> {
    /// Stages a brand-new country.
    ///
    /// # Errors
    /// - `Validation` for blank names.
    /// - `SingletonViolation` while another staged new country is incomplete.
    pub fn stage_country(&self, raw_name: &str) -> Result<StagedId, LocationError> {
        let _guard = self.begin_mutation()?;
        let name = validate_name(Level::Country, raw_name)?;

        let mut arena = self.arena();
        if let Some((blocking, blocking_name)) = incomplete_staged_root(&arena) {
            return Err(LocationError::SingletonViolation {
                blocking,
                name: blocking_name,
            });
        }

        let staged = StagedId::generate();
        insert_staged(&mut arena, staged, Level::Country, name, None)?;
        info!(
            "event=location_stage module=service status=ok level=country key={}",
            staged
        );
        Ok(staged)
    }

    /// Stages a city under a staged or persisted country.
    ///
    /// # Errors
    /// - `SingletonViolation` when `country` is a staged new country and
    ///   another staged new country is still incomplete.
    pub fn stage_city(&self, country: NodeKey, raw_name: &str) -> Result<StagedId, LocationError> {
        let _guard = self.begin_mutation()?;
        let name = validate_name(Level::City, raw_name)?;

        let mut arena = self.arena();
        ensure_level(&arena, country, Level::Country)?;
        // A new empty city makes a staged country incomplete.
        if let Some(root) = country.staged_id() {
            if let Some((blocking, blocking_name)) = incomplete_staged_root_except(&arena, Some(root))
            {
                return Err(LocationError::SingletonViolation {
                    blocking,
                    name: blocking_name,
                });
            }
        }

        let staged = StagedId::generate();
        insert_staged(&mut arena, staged, Level::City, name, Some(country))?;
        info!(
            "event=location_stage module=service status=ok level=city key={} parent={}",
            staged, country
        );
        Ok(staged)
    }

    /// Stages a delegation under `city`, which must belong to `country`.
    pub fn stage_delegation(
        &self,
        country: NodeKey,
        city: NodeKey,
        raw_name: &str,
    ) -> Result<StagedId, LocationError> {
        let _guard = self.begin_mutation()?;
        let name = validate_name(Level::Delegation, raw_name)?;

        let mut arena = self.arena();
        ensure_level(&arena, country, Level::Country)?;
        ensure_level(&arena, city, Level::City)?;
        if arena.get(city).and_then(|node| node.parent) != Some(country) {
            return Err(LocationError::invalid_target(
                city,
                format!("city does not belong to country {country}"),
            ));
        }

        let staged = StagedId::generate();
        insert_staged(&mut arena, staged, Level::Delegation, name, Some(city))?;
        info!(
            "event=location_stage module=service status=ok level=delegation key={} parent={}",
            staged, city
        );
        Ok(staged)
    }

    /// Removes one staged node with its staged descendants.
    ///
    /// Staged ancestors left without children are removed too, walking up
    /// until a non-empty or persisted ancestor is reached.
    pub fn unstage(&self, staged: StagedId) -> Result<UnstageReport, LocationError> {
        let _guard = self.begin_mutation()?;
        let key = NodeKey::Staged(staged);

        let mut arena = self.arena();
        let parent = arena
            .get(key)
            .map(|node| node.parent)
            .ok_or(LocationError::NotFound(key))?;

        let mut discarded_descendants = arena.remove_subtree(key);
        let removed = discarded_descendants
            .pop()
            .ok_or(LocationError::NotFound(key))?;

        let mut collapsed_ancestors = Vec::new();
        let mut cursor = parent;
        while let Some(ancestor) = cursor {
            if ancestor.is_persisted() || !arena.children(ancestor).is_empty() {
                break;
            }
            cursor = arena.get(ancestor).and_then(|node| node.parent);
            collapsed_ancestors.extend(arena.remove_subtree(ancestor));
        }

        info!(
            "event=location_unstage module=service status=ok level={} key={} descendants={} collapsed={}",
            removed.level,
            key,
            discarded_descendants.len(),
            collapsed_ancestors.len()
        );
        Ok(UnstageReport {
            removed,
            discarded_descendants,
            collapsed_ancestors,
        })
    }
}

fn ensure_level(arena: &LocationArena, key: NodeKey, level: Level) -> Result<(), LocationError> {
    let node = arena.get(key).ok_or(LocationError::NotFound(key))?;
    if node.level != level {
        return Err(LocationError::invalid_target(
            key,
            format!("expected a {level}, found a {}", node.level),
        ));
    }
    Ok(())
}

fn insert_staged(
    arena: &mut LocationArena,
    staged: StagedId,
    level: Level,
    name: String,
    parent: Option<NodeKey>,
) -> Result<(), LocationError> {
    arena
        .insert(NodeKey::Staged(staged), level, name, parent)
        .map_err(|err: ArenaError| {
            LocationError::invalid_target(parent.unwrap_or(NodeKey::Staged(staged)), err.to_string())
        })
}
