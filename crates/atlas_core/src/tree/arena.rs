//! Arena of location nodes indexed by `NodeKey`.
//!
//! # Responsibility
//! - Hold persisted (Entity Store) and staged (Staging Area) nodes in one
//!   flat map with explicit parent/child key references.
//! - Provide subtree views, bottom-up removal and full persisted refresh.
//!
//! # Invariants
//! - Countries are roots; cities sit under countries; delegations under
//!   cities.
//! - A staged node never has a persisted descendant.
//! - Child order is insertion order and is preserved by views and refresh.

use crate::model::location::{
    City, Country, Delegation, Level, LocationId, LocationView, NodeKey, RemovedLocation,
    StagedId,
};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Structural insert errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// Key is already present.
    DuplicateKey(NodeKey),
    /// Parent key is not present.
    ParentNotFound(NodeKey),
    /// Parent/child levels do not line up.
    LevelMismatch {
        level: Level,
        parent_level: Option<Level>,
    },
    /// A persisted node cannot hang under a staged parent.
    PersistedUnderStaged { key: NodeKey, parent: NodeKey },
}

impl Display for ArenaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(key) => write!(f, "location already present: {key}"),
            Self::ParentNotFound(key) => write!(f, "parent location not found: {key}"),
            Self::LevelMismatch {
                level,
                parent_level: Some(parent_level),
            } => write!(f, "a {level} cannot be placed under a {parent_level}"),
            Self::LevelMismatch {
                level,
                parent_level: None,
            } => write!(f, "a {level} cannot be placed at the root"),
            Self::PersistedUnderStaged { key, parent } => {
                write!(f, "persisted location {key} cannot be placed under staged {parent}")
            }
        }
    }
}

impl Error for ArenaError {}

/// One node in the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationNode {
    pub key: NodeKey,
    pub level: Level,
    pub name: String,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
}

impl LocationNode {
    fn removed(&self) -> RemovedLocation {
        RemovedLocation {
            key: self.key,
            level: self.level,
            name: self.name.clone(),
        }
    }
}

/// Flat arena holding the whole location hierarchy.
#[derive(Debug, Clone, Default)]
pub struct LocationArena {
    nodes: HashMap<NodeKey, LocationNode>,
    roots: Vec<NodeKey>,
}

impl LocationArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an arena from a persisted hierarchy.
    pub fn from_countries(countries: &[Country]) -> Result<Self, ArenaError> {
        let mut arena = Self::new();
        for country in countries {
            arena.insert_country(country)?;
        }
        Ok(arena)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn get(&self, key: NodeKey) -> Option<&LocationNode> {
        self.nodes.get(&key)
    }

    /// Root keys in order.
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Direct children of `key` in order; empty when the key is unknown.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of persisted direct children of `key`.
    pub fn persisted_child_count(&self, key: NodeKey) -> usize {
        self.children(key)
            .iter()
            .filter(|child| child.is_persisted())
            .count()
    }

    /// Inserts one node under `parent` (or as a root when `None`).
    pub fn insert(
        &mut self,
        key: NodeKey,
        level: Level,
        name: impl Into<String>,
        parent: Option<NodeKey>,
    ) -> Result<(), ArenaError> {
        if self.nodes.contains_key(&key) {
            return Err(ArenaError::DuplicateKey(key));
        }

        match parent {
            None => {
                if level.parent().is_some() {
                    return Err(ArenaError::LevelMismatch {
                        level,
                        parent_level: None,
                    });
                }
                self.roots.push(key);
            }
            Some(parent_key) => {
                let parent_node = self
                    .nodes
                    .get_mut(&parent_key)
                    .ok_or(ArenaError::ParentNotFound(parent_key))?;
                if level.parent() != Some(parent_node.level) {
                    return Err(ArenaError::LevelMismatch {
                        level,
                        parent_level: Some(parent_node.level),
                    });
                }
                if key.is_persisted() && parent_key.is_staged() {
                    return Err(ArenaError::PersistedUnderStaged {
                        key,
                        parent: parent_key,
                    });
                }
                parent_node.children.push(key);
            }
        }

        self.nodes.insert(
            key,
            LocationNode {
                key,
                level,
                name: name.into(),
                parent,
                children: Vec::new(),
            },
        );
        Ok(())
    }

    /// Inserts one persisted country subtree as a root.
    pub fn insert_country(&mut self, country: &Country) -> Result<(), ArenaError> {
        let country_key = NodeKey::Persisted(country.id);
        self.insert(country_key, Level::Country, country.name.as_str(), None)?;
        for city in &country.cities {
            self.insert_city(country_key, city)?;
        }
        Ok(())
    }

    /// Inserts one persisted city subtree under `country`.
    pub fn insert_city(&mut self, country: NodeKey, city: &City) -> Result<(), ArenaError> {
        let city_key = NodeKey::Persisted(city.id);
        self.insert(city_key, Level::City, city.name.as_str(), Some(country))?;
        for delegation in &city.delegations {
            self.insert(
                NodeKey::Persisted(delegation.id),
                Level::Delegation,
                delegation.name.as_str(),
                Some(city_key),
            )?;
        }
        Ok(())
    }

    /// Renames one node; returns `false` when the key is unknown.
    pub fn rename(&mut self, key: NodeKey, name: impl Into<String>) -> bool {
        match self.nodes.get_mut(&key) {
            Some(node) => {
                node.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Keys of the subtree rooted at `key`, children before parents.
    pub fn subtree_postorder(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        self.collect_postorder(key, &mut keys);
        keys
    }

    fn collect_postorder(&self, key: NodeKey, keys: &mut Vec<NodeKey>) {
        let Some(node) = self.nodes.get(&key) else {
            return;
        };
        for child in &node.children {
            self.collect_postorder(*child, keys);
        }
        keys.push(key);
    }

    /// Removes the subtree rooted at `key` and detaches it from its parent.
    ///
    /// Returns removed nodes leaf-to-root; the last entry is `key` itself.
    pub fn remove_subtree(&mut self, key: NodeKey) -> Vec<RemovedLocation> {
        let Some(parent) = self.nodes.get(&key).map(|node| node.parent) else {
            return Vec::new();
        };
        match parent {
            Some(parent_key) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent_key) {
                    parent_node.children.retain(|child| *child != key);
                }
            }
            None => self.roots.retain(|root| *root != key),
        }

        self.subtree_postorder(key)
            .into_iter()
            .filter_map(|current| self.nodes.remove(&current))
            .map(|node| node.removed())
            .collect()
    }

    /// Builds a view of the subtree rooted at `key` including staged nodes.
    pub fn view(&self, key: NodeKey) -> Option<LocationView> {
        let node = self.nodes.get(&key)?;
        Some(LocationView {
            key,
            level: node.level,
            name: node.name.clone(),
            children: node
                .children
                .iter()
                .filter_map(|child| self.view(*child))
                .collect(),
        })
    }

    /// Persisted hierarchy snapshot; staged nodes are excluded.
    pub fn persisted_countries(&self) -> Vec<Country> {
        self.roots
            .iter()
            .filter_map(|root| match root {
                NodeKey::Persisted(id) => self.persisted_country(*id),
                NodeKey::Staged(_) => None,
            })
            .collect()
    }

    /// Persisted snapshot of one country; staged children are excluded.
    pub fn persisted_country(&self, id: LocationId) -> Option<Country> {
        let node = self.nodes.get(&NodeKey::Persisted(id))?;
        if node.level != Level::Country {
            return None;
        }
        Some(Country {
            id,
            name: node.name.clone(),
            cities: node
                .children
                .iter()
                .filter_map(|child| child.persisted_id())
                .filter_map(|city_id| self.persisted_city(city_id))
                .collect(),
        })
    }

    /// Persisted snapshot of one city; staged children are excluded.
    pub fn persisted_city(&self, id: LocationId) -> Option<City> {
        let node = self.nodes.get(&NodeKey::Persisted(id))?;
        if node.level != Level::City {
            return None;
        }
        Some(City {
            id,
            name: node.name.clone(),
            delegations: node
                .children
                .iter()
                .filter_map(|child| child.persisted_id())
                .filter_map(|delegation_id| {
                    self.nodes
                        .get(&NodeKey::Persisted(delegation_id))
                        .map(|delegation| Delegation {
                            id: delegation_id,
                            name: delegation.name.clone(),
                        })
                })
                .collect(),
        })
    }

    /// Staged countries (brand-new roots) in order.
    pub fn staged_roots(&self) -> Vec<StagedId> {
        self.roots
            .iter()
            .filter_map(|root| root.staged_id())
            .collect()
    }

    /// Staged nodes hanging directly under persisted parents, in tree order.
    pub fn staged_additions(&self) -> Vec<(LocationId, StagedId)> {
        let mut additions = Vec::new();
        for root in &self.roots {
            if root.is_persisted() {
                self.collect_staged_additions(*root, &mut additions);
            }
        }
        additions
    }

    fn collect_staged_additions(&self, key: NodeKey, additions: &mut Vec<(LocationId, StagedId)>) {
        let Some(parent_id) = key.persisted_id() else {
            return;
        };
        for child in self.children(key) {
            match child {
                NodeKey::Staged(staged) => additions.push((parent_id, *staged)),
                NodeKey::Persisted(_) => self.collect_staged_additions(*child, additions),
            }
        }
    }

    /// Replaces every persisted node with `countries`, keeping staged work.
    ///
    /// Staged roots are kept after the refreshed countries. Staged additions
    /// whose persisted parent no longer exists are discarded and returned
    /// (leaf-to-root per discarded subtree).
    pub fn replace_persisted(
        &mut self,
        countries: &[Country],
    ) -> Result<Vec<RemovedLocation>, ArenaError> {
        let mut next = Self::from_countries(countries)?;
        let mut discarded = Vec::new();

        for staged in self.staged_roots() {
            self.copy_subtree_into(NodeKey::Staged(staged), None, &mut next)?;
        }

        for (parent_id, staged) in self.staged_additions() {
            let parent_key = NodeKey::Persisted(parent_id);
            let key = NodeKey::Staged(staged);
            let parent_matches = match (next.get(parent_key), self.get(parent_key)) {
                (Some(new_parent), Some(old_parent)) => new_parent.level == old_parent.level,
                _ => false,
            };
            if parent_matches {
                self.copy_subtree_into(key, Some(parent_key), &mut next)?;
            } else {
                discarded.extend(
                    self.subtree_postorder(key)
                        .into_iter()
                        .filter_map(|current| self.get(current).map(LocationNode::removed)),
                );
            }
        }

        *self = next;
        Ok(discarded)
    }

    fn copy_subtree_into(
        &self,
        key: NodeKey,
        parent: Option<NodeKey>,
        target: &mut LocationArena,
    ) -> Result<(), ArenaError> {
        let Some(node) = self.nodes.get(&key) else {
            return Ok(());
        };
        target.insert(key, node.level, node.name.as_str(), parent)?;
        for child in &node.children {
            self.copy_subtree_into(*child, Some(key), target)?;
        }
        Ok(())
    }
}
