//! Commit orchestrator.
//!
//! # Responsibility
//! - Persist complete staged subtrees level by level through the gateway.
//! - Merge every gateway-confirmed entity into the Entity Store as it lands.
//!
//! # Invariants
//! - Completeness is checked before the first gateway call; a failed check
//!   mutates nothing.
//! - Gateway calls are strictly sequential: all cities of a commit are
//!   created before any of their delegations, since each level needs the
//!   parent id returned by the previous one.
//! - A failure before anything was created is `Gateway`; after that it is
//!   `PartialCommit` and nothing is rolled back or retried.
//! - Staged nodes leave the Staging Area only when the whole commit succeeds.

use crate::gateway::{GatewayError, LocationGateway};
use crate::model::location::{
    City, Country, CreatedLocation, Delegation, Level, LocationId, LocationView, NodeKey,
    StagedId,
};
use crate::service::error::LocationError;
use crate::service::location_service::LocationService;
use crate::tree::arena::LocationArena;
use crate::tree::completeness::find_incompleteness;
use log::{error, info, warn};
use std::collections::HashSet;
use std::time::Instant;

/// Tracks entities created during one commit.
struct CommitProgress {
    created: Vec<CreatedLocation>,
    started_at: Instant,
    operation: &'static str,
}

impl CommitProgress {
    fn new(operation: &'static str) -> Self {
        Self {
            created: Vec::new(),
            started_at: Instant::now(),
            operation,
        }
    }

    fn record(&mut self, id: LocationId, level: Level, parent: Option<LocationId>) {
        self.created.push(CreatedLocation { id, level, parent });
    }

    fn fail(&mut self, level: Level, source: GatewayError) -> LocationError {
        error!(
            "event=location_commit module=service status=error op={} failed_level={} created={} duration_ms={} error={}",
            self.operation,
            level,
            self.created.len(),
            self.started_at.elapsed().as_millis(),
            source
        );
        let created = std::mem::take(&mut self.created);
        if created.is_empty() {
            LocationError::Gateway(source)
        } else {
            LocationError::PartialCommit {
                created,
                failed_level: level,
                source,
            }
        }
    }

    fn finish(&self) {
        info!(
            "event=location_commit module=service status=ok op={} created={} duration_ms={}",
            self.operation,
            self.created.len(),
            self.started_at.elapsed().as_millis()
        );
    }
}

impl<G: LocationGateway> LocationService<G> {
    /// Commits one staged new country with all its staged cities and
    /// delegations.
    ///
    /// Returns the persisted country as created by the gateway.
    ///
    /// # Errors
    /// - `IncompleteStructure` when the subtree is not complete.
    /// - `Gateway` when the country itself cannot be created.
    /// - `PartialCommit` when a later city or delegation fails.
    pub fn commit(&self, country: StagedId) -> Result<Country, LocationError> {
        let _guard = self.begin_mutation()?;
        let key = NodeKey::Staged(country);

        let view = {
            let arena = self.arena();
            let view = arena.view(key).ok_or(LocationError::NotFound(key))?;
            if view.level != Level::Country {
                return Err(LocationError::invalid_target(key, "not a country"));
            }
            ensure_complete(&view)?;
            view
        };

        let mut progress = CommitProgress::new("commit_country");
        info!(
            "event=location_commit module=service status=start op={} key={} cities={}",
            progress.operation,
            key,
            view.children.len()
        );

        let country_id = match self.gateway.create_country(&view.name) {
            Ok(id) => id,
            Err(err) => return Err(progress.fail(Level::Country, err)),
        };
        progress.record(country_id, Level::Country, None);
        self.merge_created(country_id, Level::Country, &view.name, None);

        let cities = self.persist_cities(country_id, &view.children, &mut progress)?;
        let cities = self.persist_delegations_of(cities, &mut progress)?;

        self.arena().remove_subtree(key);
        progress.finish();
        Ok(Country {
            id: country_id,
            name: view.name,
            cities,
        })
    }

    /// Commits staged cities (with their staged delegations) under an
    /// already persisted country.
    ///
    /// Every listed city must own at least one staged delegation.
    pub fn commit_cities_to_existing_country(
        &self,
        country_id: LocationId,
        staged_cities: &[StagedId],
    ) -> Result<Vec<City>, LocationError> {
        let _guard = self.begin_mutation()?;
        let parent = NodeKey::Persisted(country_id);

        let views = {
            let arena = self.arena();
            ensure_persisted_parent(&arena, parent, Level::Country)?;
            let views = staged_children_of(&arena, parent, Level::City, staged_cities)?;
            for view in &views {
                ensure_complete(view)?;
            }
            views
        };
        if views.is_empty() {
            return Ok(Vec::new());
        }

        let mut progress = CommitProgress::new("commit_cities");
        info!(
            "event=location_commit module=service status=start op={} parent={} cities={}",
            progress.operation,
            country_id,
            views.len()
        );

        let cities = self.persist_cities(country_id, &views, &mut progress)?;
        let cities = self.persist_delegations_of(cities, &mut progress)?;

        {
            let mut arena = self.arena();
            for view in &views {
                arena.remove_subtree(view.key);
            }
        }
        progress.finish();
        Ok(cities)
    }

    /// Commits staged delegations under an already persisted city.
    pub fn commit_delegations_to_existing_city(
        &self,
        city_id: LocationId,
        staged_delegations: &[StagedId],
    ) -> Result<Vec<Delegation>, LocationError> {
        let _guard = self.begin_mutation()?;
        let parent = NodeKey::Persisted(city_id);

        let views = {
            let arena = self.arena();
            ensure_persisted_parent(&arena, parent, Level::City)?;
            staged_children_of(&arena, parent, Level::Delegation, staged_delegations)?
        };
        if views.is_empty() {
            return Ok(Vec::new());
        }

        let mut progress = CommitProgress::new("commit_delegations");
        info!(
            "event=location_commit module=service status=start op={} parent={} delegations={}",
            progress.operation,
            city_id,
            views.len()
        );

        let mut delegations = Vec::with_capacity(views.len());
        for view in &views {
            delegations.push(self.persist_delegation(city_id, &view.name, &mut progress)?);
        }

        {
            let mut arena = self.arena();
            for view in &views {
                arena.remove_subtree(view.key);
            }
        }
        progress.finish();
        Ok(delegations)
    }

    /// Creates every city in order; delegations are not touched yet.
    fn persist_cities<'v>(
        &self,
        country_id: LocationId,
        cities: &'v [LocationView],
        progress: &mut CommitProgress,
    ) -> Result<Vec<(City, &'v [LocationView])>, LocationError> {
        let mut persisted = Vec::with_capacity(cities.len());
        for city in cities {
            let city_id = match self.gateway.create_city(country_id, &city.name) {
                Ok(id) => id,
                Err(err) => return Err(progress.fail(Level::City, err)),
            };
            progress.record(city_id, Level::City, Some(country_id));
            self.merge_created(city_id, Level::City, &city.name, Some(country_id));
            persisted.push((
                City {
                    id: city_id,
                    name: city.name.clone(),
                    delegations: Vec::new(),
                },
                city.children.as_slice(),
            ));
        }
        Ok(persisted)
    }

    /// Creates the staged delegations of every freshly created city.
    fn persist_delegations_of(
        &self,
        cities: Vec<(City, &[LocationView])>,
        progress: &mut CommitProgress,
    ) -> Result<Vec<City>, LocationError> {
        let mut done = Vec::with_capacity(cities.len());
        for (mut city, delegations) in cities {
            for delegation in delegations {
                city.delegations
                    .push(self.persist_delegation(city.id, &delegation.name, progress)?);
            }
            done.push(city);
        }
        Ok(done)
    }

    fn persist_delegation(
        &self,
        city_id: LocationId,
        name: &str,
        progress: &mut CommitProgress,
    ) -> Result<Delegation, LocationError> {
        match self.gateway.create_delegation(city_id, name) {
            Ok(id) => {
                progress.record(id, Level::Delegation, Some(city_id));
                self.merge_created(id, Level::Delegation, name, Some(city_id));
                Ok(Delegation {
                    id,
                    name: name.to_string(),
                })
            }
            Err(err) => Err(progress.fail(Level::Delegation, err)),
        }
    }

    /// Adds one gateway-confirmed entity to the Entity Store.
    fn merge_created(
        &self,
        id: LocationId,
        level: Level,
        name: &str,
        parent: Option<LocationId>,
    ) {
        let result = self.arena().insert(
            NodeKey::Persisted(id),
            level,
            name,
            parent.map(NodeKey::Persisted),
        );
        if let Err(err) = result {
            warn!(
                "event=location_commit module=service status=merge_skipped level={} id={} error={}",
                level, id, err
            );
        }
    }
}

fn ensure_complete(view: &LocationView) -> Result<(), LocationError> {
    match find_incompleteness(view) {
        None => Ok(()),
        Some(reason) => Err(LocationError::IncompleteStructure {
            key: view.key,
            name: view.name.clone(),
            reason,
        }),
    }
}

fn ensure_persisted_parent(
    arena: &LocationArena,
    parent: NodeKey,
    level: Level,
) -> Result<(), LocationError> {
    let node = arena.get(parent).ok_or(LocationError::NotFound(parent))?;
    if node.level != level {
        return Err(LocationError::invalid_target(
            parent,
            format!("expected a {level}, found a {}", node.level),
        ));
    }
    Ok(())
}

/// Resolves staged ids to views, checking each hangs directly under `parent`.
fn staged_children_of(
    arena: &LocationArena,
    parent: NodeKey,
    level: Level,
    staged: &[StagedId],
) -> Result<Vec<LocationView>, LocationError> {
    let mut seen = HashSet::new();
    let mut views = Vec::with_capacity(staged.len());
    for id in staged {
        let key = NodeKey::Staged(*id);
        if !seen.insert(*id) {
            return Err(LocationError::invalid_target(key, "listed more than once"));
        }
        let node = arena.get(key).ok_or(LocationError::NotFound(key))?;
        if node.level != level {
            return Err(LocationError::invalid_target(
                key,
                format!("expected a {level}, found a {}", node.level),
            ));
        }
        if node.parent != Some(parent) {
            return Err(LocationError::invalid_target(
                key,
                format!("not staged under {parent}"),
            ));
        }
        views.push(arena.view(key).ok_or(LocationError::NotFound(key))?);
    }
    Ok(views)
}
