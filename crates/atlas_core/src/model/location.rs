//! Location hierarchy domain model.
//!
//! # Responsibility
//! - Define the three hierarchy levels and their identifiers.
//! - Provide read models for persisted and staged subtrees.
//!
//! # Invariants
//! - `LocationId` is issued by the persistence gateway and never generated
//!   locally.
//! - `StagedId` is generated locally, unique per process, and never reused
//!   after promotion or discard.
//! - A node at `Level::Country` has no parent; every other level has a parent
//!   exactly one level above it.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Gateway-issued identifier of a persisted location.
pub type LocationId = Uuid;

/// Hierarchy level of one location node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Country,
    City,
    Delegation,
}

impl Level {
    /// Stable lowercase label used in messages and log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::City => "city",
            Self::Delegation => "delegation",
        }
    }

    /// Level directly below this one, if any.
    pub fn child(self) -> Option<Level> {
        match self {
            Self::Country => Some(Self::City),
            Self::City => Some(Self::Delegation),
            Self::Delegation => None,
        }
    }

    /// Level directly above this one, if any.
    pub fn parent(self) -> Option<Level> {
        match self {
            Self::Country => None,
            Self::City => Some(Self::Country),
            Self::Delegation => Some(Self::City),
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally generated identifier of a staged, not-yet-committed location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagedId(Uuid);

impl StagedId {
    /// Generates a fresh staged id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for StagedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "staged:{}", self.0)
    }
}

/// Arena key of one location node: either persisted or staged.
///
/// Traversal, validation and cascade logic operate on `NodeKey` so persisted
/// and staged nodes share one code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum NodeKey {
    Persisted(LocationId),
    Staged(StagedId),
}

impl NodeKey {
    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged(_))
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }

    /// Returns gateway id when persisted.
    pub fn persisted_id(&self) -> Option<LocationId> {
        match self {
            Self::Persisted(id) => Some(*id),
            Self::Staged(_) => None,
        }
    }

    /// Returns local id when staged.
    pub fn staged_id(&self) -> Option<StagedId> {
        match self {
            Self::Staged(id) => Some(*id),
            Self::Persisted(_) => None,
        }
    }
}

impl Display for NodeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{id}"),
            Self::Staged(id) => write!(f, "{id}"),
        }
    }
}

impl From<StagedId> for NodeKey {
    fn from(value: StagedId) -> Self {
        Self::Staged(value)
    }
}

impl From<LocationId> for NodeKey {
    fn from(value: LocationId) -> Self {
        Self::Persisted(value)
    }
}

/// Persisted country with its ordered cities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: LocationId,
    pub name: String,
    pub cities: Vec<City>,
}

/// Persisted city with its ordered delegations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: LocationId,
    pub name: String,
    pub delegations: Vec<Delegation>,
}

/// Persisted delegation (leaf level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub id: LocationId,
    pub name: String,
}

impl Country {
    /// Finds one city by id.
    pub fn city(&self, id: LocationId) -> Option<&City> {
        self.cities.iter().find(|city| city.id == id)
    }
}

/// Level-agnostic subtree view over persisted or staged nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationView {
    pub key: NodeKey,
    pub level: Level,
    pub name: String,
    pub children: Vec<LocationView>,
}

impl LocationView {
    /// Finds one direct child by name.
    pub fn child_named(&self, name: &str) -> Option<&LocationView> {
        self.children.iter().find(|child| child.name == name)
    }
}

impl From<&Country> for LocationView {
    fn from(country: &Country) -> Self {
        Self {
            key: NodeKey::Persisted(country.id),
            level: Level::Country,
            name: country.name.clone(),
            children: country.cities.iter().map(LocationView::from).collect(),
        }
    }
}

impl From<&City> for LocationView {
    fn from(city: &City) -> Self {
        Self {
            key: NodeKey::Persisted(city.id),
            level: Level::City,
            name: city.name.clone(),
            children: city
                .delegations
                .iter()
                .map(|delegation| Self {
                    key: NodeKey::Persisted(delegation.id),
                    level: Level::Delegation,
                    name: delegation.name.clone(),
                    children: Vec::new(),
                })
                .collect(),
        }
    }
}

/// Record of one node removed from the arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedLocation {
    pub key: NodeKey,
    pub level: Level,
    pub name: String,
}

impl Display for RemovedLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.level, self.name)
    }
}

/// Record of one entity the gateway created during a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedLocation {
    pub id: LocationId,
    pub level: Level,
    /// Gateway id of the owning parent; `None` for countries.
    pub parent: Option<LocationId>,
}
