//! Location hierarchy use-case service.
//!
//! # Responsibility
//! - Own the Entity Store and Staging Area (one arena) behind a lock.
//! - Gate every mutating call with a single in-flight flag.
//! - Provide rename, refresh, reset and read-only snapshots. Staging,
//!   commit and cascading delete live in sibling modules.
//!
//! # Invariants
//! - At most one mutating call runs at a time; others fail with `Busy`.
//! - The arena lock is never held across a gateway call.
//! - `reset` is not gated by the flag and never cancels gateway calls
//!   already dispatched.

use crate::gateway::{GatewayError, LocationGateway};
use crate::model::location::{
    Country, Level, LocationId, LocationView, NodeKey, RemovedLocation, StagedId,
};
use crate::model::name::validate_name;
use crate::service::error::LocationError;
use crate::tree::arena::LocationArena;
use crate::tree::completeness::{incomplete_staged_root, is_complete};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Staged subtree attached to an already persisted parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedAddition {
    pub parent: LocationId,
    pub node: LocationView,
}

/// Read-only copy of the Staging Area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSnapshot {
    /// Brand-new staged countries in staging order.
    pub new_countries: Vec<LocationView>,
    /// Staged cities under persisted countries and staged delegations under
    /// persisted cities.
    pub additions: Vec<StagedAddition>,
}

impl StagingSnapshot {
    pub fn is_empty(&self) -> bool {
        self.new_countries.is_empty() && self.additions.is_empty()
    }
}

/// Held while one mutating call is in flight.
pub(crate) struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Location hierarchy service facade.
pub struct LocationService<G: LocationGateway> {
    pub(crate) gateway: G,
    state: Mutex<LocationArena>,
    in_flight: AtomicBool,
}

impl<G: LocationGateway> LocationService<G> {
    /// Creates service with an empty Entity Store.
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            state: Mutex::new(LocationArena::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Creates service and populates the Entity Store from the gateway.
    pub fn load(gateway: G) -> Result<Self, LocationError> {
        let service = Self::new(gateway);
        service.refresh()?;
        Ok(service)
    }

    /// Gateway used by this service.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Whether a mutating call is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn begin_mutation(&self) -> Result<InFlightGuard<'_>, LocationError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LocationError::Busy)?;
        Ok(InFlightGuard {
            flag: &self.in_flight,
        })
    }

    pub(crate) fn arena(&self) -> MutexGuard<'_, LocationArena> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entity Store snapshot.
    pub fn countries(&self) -> Vec<Country> {
        self.arena().persisted_countries()
    }

    /// Persisted snapshot of one country.
    pub fn country(&self, id: LocationId) -> Option<Country> {
        self.arena().persisted_country(id)
    }

    /// Subtree view of any node, staged children included.
    pub fn view(&self, key: NodeKey) -> Option<LocationView> {
        self.arena().view(key)
    }

    /// Staging Area snapshot.
    pub fn staging(&self) -> StagingSnapshot {
        let arena = self.arena();
        StagingSnapshot {
            new_countries: arena
                .staged_roots()
                .into_iter()
                .filter_map(|staged| arena.view(NodeKey::Staged(staged)))
                .collect(),
            additions: arena
                .staged_additions()
                .into_iter()
                .filter_map(|(parent, staged)| {
                    arena
                        .view(NodeKey::Staged(staged))
                        .map(|node| StagedAddition { parent, node })
                })
                .collect(),
        }
    }

    /// Whether the staged new country `country` may be committed.
    pub fn is_complete(&self, country: StagedId) -> Result<bool, LocationError> {
        let key = NodeKey::Staged(country);
        let view = self.arena().view(key).ok_or(LocationError::NotFound(key))?;
        if view.level != Level::Country {
            return Err(LocationError::invalid_target(key, "not a country"));
        }
        Ok(is_complete(&view))
    }

    /// The staged new country currently blocking further country staging.
    pub fn incomplete_root(&self) -> Option<(StagedId, String)> {
        incomplete_staged_root(&self.arena())
    }

    /// Renames one staged or persisted location.
    ///
    /// Persisted targets are renamed through the gateway first; the store is
    /// updated only after the gateway confirms. Returns the normalized name.
    pub fn rename(&self, key: NodeKey, raw_name: &str) -> Result<String, LocationError> {
        let _guard = self.begin_mutation()?;
        let level = self
            .arena()
            .get(key)
            .map(|node| node.level)
            .ok_or(LocationError::NotFound(key))?;
        let name = validate_name(level, raw_name)?;

        if let NodeKey::Persisted(id) = key {
            let result = match level {
                Level::Country => self.gateway.rename_country(id, &name),
                Level::City => self.gateway.rename_city(id, &name),
                Level::Delegation => self.gateway.rename_delegation(id, &name),
            };
            if let Err(err) = result {
                warn!(
                    "event=location_rename module=service status=error level={} id={} error={}",
                    level, id, err
                );
                return Err(err.into());
            }
        }

        if !self.arena().rename(key, name.as_str()) {
            warn!(
                "event=location_rename module=service status=stale level={} key={}",
                level, key
            );
        }
        info!(
            "event=location_rename module=service status=ok level={} key={}",
            level, key
        );
        Ok(name)
    }

    /// Replaces the Entity Store with the gateway's full hierarchy.
    ///
    /// Staged work stays unless its persisted parent disappeared; such
    /// orphans are discarded and returned.
    pub fn refresh(&self) -> Result<Vec<RemovedLocation>, LocationError> {
        let _guard = self.begin_mutation()?;
        let started_at = Instant::now();
        info!("event=location_refresh module=service status=start");

        let countries = self.gateway.fetch_hierarchy().map_err(|err| {
            warn!(
                "event=location_refresh module=service status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            LocationError::Gateway(err)
        })?;

        let discarded = self
            .arena()
            .replace_persisted(&countries)
            .map_err(|err| LocationError::Gateway(GatewayError::InvalidData(err.to_string())))?;

        info!(
            "event=location_refresh module=service status=ok duration_ms={} countries={} discarded_staged={}",
            started_at.elapsed().as_millis(),
            countries.len(),
            discarded.len()
        );
        Ok(discarded)
    }

    /// Discards all staged work immediately.
    ///
    /// Not gated by the in-flight flag. A commit already in flight keeps
    /// running and its confirmed entities still land in the Entity Store.
    pub fn reset(&self) -> Vec<RemovedLocation> {
        let mut arena = self.arena();
        let mut staged_keys: Vec<NodeKey> = arena
            .staged_roots()
            .into_iter()
            .map(NodeKey::Staged)
            .collect();
        staged_keys.extend(
            arena
                .staged_additions()
                .into_iter()
                .map(|(_, staged)| NodeKey::Staged(staged)),
        );

        let removed: Vec<RemovedLocation> = staged_keys
            .into_iter()
            .flat_map(|key| arena.remove_subtree(key))
            .collect();
        info!(
            "event=location_reset module=service status=ok discarded={} in_flight={}",
            removed.len(),
            self.is_busy()
        );
        removed
    }
}
