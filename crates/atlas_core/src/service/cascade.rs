//! Cascading delete engine.
//!
//! # Responsibility
//! - Delete persisted locations leaf-to-root through the gateway.
//! - Remove ancestors left without persisted children.
//!
//! # Invariants
//! - Countries and cities are deleted directly only when they have no
//!   persisted children; otherwise `HasChildren` is returned.
//! - One gateway call per level, issued strictly leaf-to-root; a parent is
//!   never deleted before its last child.
//! - The Entity Store drops each level only after the gateway confirms it.
//! - Staged nodes under a removed location are discarded with it.

use crate::gateway::{GatewayResult, LocationGateway};
use crate::model::location::{Level, LocationId, NodeKey, RemovedLocation};
use crate::service::error::LocationError;
use crate::service::location_service::LocationService;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// What a delete removed, leaf first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Only the target was removed.
    DeletedLeafOnly { leaf: RemovedLocation },
    /// Target delegation and its now-empty city.
    DeletedLeafAndCity {
        leaf: RemovedLocation,
        city: RemovedLocation,
    },
    /// Target delegation, its city and its country.
    DeletedLeafAndCityAndCountry {
        leaf: RemovedLocation,
        city: RemovedLocation,
        country: RemovedLocation,
    },
    /// Target empty city and its now-empty country.
    DeletedLeafAndCountry {
        leaf: RemovedLocation,
        country: RemovedLocation,
    },
}

impl DeleteOutcome {
    fn from_removed(mut removed: Vec<RemovedLocation>) -> Option<Self> {
        if removed.is_empty() {
            return None;
        }
        let leaf = removed.remove(0);
        let city = removed.iter().find(|item| item.level == Level::City).cloned();
        let country = removed
            .iter()
            .find(|item| item.level == Level::Country)
            .cloned();
        Some(match (city, country) {
            (None, None) => Self::DeletedLeafOnly { leaf },
            (Some(city), None) => Self::DeletedLeafAndCity { leaf, city },
            (Some(city), Some(country)) => Self::DeletedLeafAndCityAndCountry {
                leaf,
                city,
                country,
            },
            (None, Some(country)) => Self::DeletedLeafAndCountry { leaf, country },
        })
    }

    /// The entity the caller asked to delete.
    pub fn leaf(&self) -> &RemovedLocation {
        match self {
            Self::DeletedLeafOnly { leaf }
            | Self::DeletedLeafAndCity { leaf, .. }
            | Self::DeletedLeafAndCityAndCountry { leaf, .. }
            | Self::DeletedLeafAndCountry { leaf, .. } => leaf,
        }
    }

    /// Every removed entity, leaf first.
    pub fn removed(&self) -> Vec<&RemovedLocation> {
        match self {
            Self::DeletedLeafOnly { leaf } => vec![leaf],
            Self::DeletedLeafAndCity { leaf, city } => vec![leaf, city],
            Self::DeletedLeafAndCityAndCountry {
                leaf,
                city,
                country,
            } => vec![leaf, city, country],
            Self::DeletedLeafAndCountry { leaf, country } => vec![leaf, country],
        }
    }

    /// User-facing cascade message.
    pub fn message(&self) -> String {
        match self {
            Self::DeletedLeafOnly { leaf } => format!("Deleted {leaf}."),
            Self::DeletedLeafAndCity { leaf, city } => format!(
                "Deleted {leaf}; {city} had no delegations left and was deleted too."
            ),
            Self::DeletedLeafAndCityAndCountry {
                leaf,
                city,
                country,
            } => format!(
                "Deleted {leaf}; {city} and {country} had nothing left and were deleted too."
            ),
            Self::DeletedLeafAndCountry { leaf, country } => format!(
                "Deleted {leaf}; {country} had no cities left and was deleted too."
            ),
        }
    }
}

/// Result of one delete call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub outcome: DeleteOutcome,
    /// Staged nodes that hung under removed locations.
    pub discarded_staged: Vec<RemovedLocation>,
}

impl<G: LocationGateway> LocationService<G> {
    /// Deletes one persisted location, dispatching on its level.
    pub fn delete(&self, id: LocationId) -> Result<DeleteReport, LocationError> {
        let key = NodeKey::Persisted(id);
        let level = self
            .arena()
            .get(key)
            .map(|node| node.level)
            .ok_or(LocationError::NotFound(key))?;
        match level {
            Level::Country => self.delete_country(id),
            Level::City => self.delete_city(id),
            Level::Delegation => self.delete_delegation(id),
        }
    }

    /// Deletes one delegation and cascades to its city and country when
    /// they are left empty.
    pub fn delete_delegation(&self, id: LocationId) -> Result<DeleteReport, LocationError> {
        let _guard = self.begin_mutation()?;
        self.ensure_deletable(id, Level::Delegation)?;
        self.cascade_from(id)
    }

    /// Deletes one city that has no persisted delegations.
    ///
    /// Its country is removed too when this was its last city.
    pub fn delete_city(&self, id: LocationId) -> Result<DeleteReport, LocationError> {
        let _guard = self.begin_mutation()?;
        self.ensure_deletable(id, Level::City)?;
        self.cascade_from(id)
    }

    /// Deletes one country that has no persisted cities.
    pub fn delete_country(&self, id: LocationId) -> Result<DeleteReport, LocationError> {
        let _guard = self.begin_mutation()?;
        self.ensure_deletable(id, Level::Country)?;
        self.cascade_from(id)
    }

    fn ensure_deletable(&self, id: LocationId, level: Level) -> Result<(), LocationError> {
        let key = NodeKey::Persisted(id);
        let arena = self.arena();
        let node = arena.get(key).ok_or(LocationError::NotFound(key))?;
        if node.level != level {
            return Err(LocationError::invalid_target(
                key,
                format!("expected a {level}, found a {}", node.level),
            ));
        }

        let count = arena.persisted_child_count(key);
        match level.child() {
            Some(child_level) if count > 0 => Err(LocationError::HasChildren {
                level,
                name: node.name.clone(),
                child_level,
                count,
            }),
            _ => Ok(()),
        }
    }

    /// Walks from `id` towards the root, deleting each level that is left
    /// without persisted children.
    fn cascade_from(&self, id: LocationId) -> Result<DeleteReport, LocationError> {
        let started_at = Instant::now();
        let mut removed: Vec<RemovedLocation> = Vec::new();
        let mut discarded_staged = Vec::new();
        let mut cursor = Some(NodeKey::Persisted(id));

        while let Some(key) = cursor {
            let Some((level, parent)) = self
                .arena()
                .get(key)
                .map(|node| (node.level, node.parent))
            else {
                break;
            };
            let Some(current_id) = key.persisted_id() else {
                break;
            };

            if let Err(err) = self.gateway_delete(level, current_id) {
                warn!(
                    "event=location_delete module=service status=error level={} id={} removed={} duration_ms={} error={}",
                    level,
                    current_id,
                    removed.len(),
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(if removed.is_empty() {
                    LocationError::Gateway(err)
                } else {
                    LocationError::PartialDelete {
                        removed,
                        failed_level: level,
                        source: err,
                    }
                });
            }

            let mut arena = self.arena();
            let mut gone = arena.remove_subtree(key);
            if let Some(node) = gone.pop() {
                removed.push(node);
            }
            discarded_staged.extend(gone);

            cursor = parent.filter(|parent_key| {
                parent_key.is_persisted() && arena.persisted_child_count(*parent_key) == 0
            });
        }

        info!(
            "event=location_delete module=service status=ok id={} removed={} discarded_staged={} duration_ms={}",
            id,
            removed.len(),
            discarded_staged.len(),
            started_at.elapsed().as_millis()
        );
        let outcome =
            DeleteOutcome::from_removed(removed).ok_or(LocationError::NotFound(NodeKey::Persisted(id)))?;
        Ok(DeleteReport {
            outcome,
            discarded_staged,
        })
    }

    fn gateway_delete(&self, level: Level, id: LocationId) -> GatewayResult<()> {
        match level {
            Level::Country => self.gateway.delete_country(id),
            Level::City => self.gateway.delete_city(id),
            Level::Delegation => self.gateway.delete_delegation(id),
        }
    }
}
