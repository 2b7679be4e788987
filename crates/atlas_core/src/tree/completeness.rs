//! Completeness rules for committable subtrees.
//!
//! # Responsibility
//! - Decide whether a country subtree may be committed.
//! - Locate the single incomplete staged root, if any.
//!
//! # Invariants
//! - A country is complete iff it has at least one city and every city has
//!   at least one delegation.
//! - Both functions are pure and perform no I/O.

use crate::model::location::{Level, LocationView, NodeKey, StagedId};
use crate::tree::arena::LocationArena;
use std::fmt::{Display, Formatter};

/// First reason a subtree is not committable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incompleteness {
    /// Country has no cities.
    NoCities,
    /// City has no delegations.
    CityWithoutDelegations { city: String },
}

impl Display for Incompleteness {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCities => write!(f, "country has no cities"),
            Self::CityWithoutDelegations { city } => {
                write!(f, "city '{city}' has no delegations")
            }
        }
    }
}

/// Returns whether `country` is a committable subtree.
pub fn is_complete(country: &LocationView) -> bool {
    find_incompleteness(country).is_none()
}

/// Returns the first completeness violation of `country`.
///
/// Non-country views are checked by the per-city rule only.
pub fn find_incompleteness(country: &LocationView) -> Option<Incompleteness> {
    match country.level {
        Level::Country => {
            if country.children.is_empty() {
                return Some(Incompleteness::NoCities);
            }
            country.children.iter().find_map(city_incompleteness)
        }
        Level::City => city_incompleteness(country),
        Level::Delegation => None,
    }
}

fn city_incompleteness(city: &LocationView) -> Option<Incompleteness> {
    if city.children.is_empty() {
        return Some(Incompleteness::CityWithoutDelegations {
            city: city.name.clone(),
        });
    }
    None
}

/// Returns the first staged new country whose subtree is incomplete.
///
/// Staged additions under persisted parents are not considered.
pub fn incomplete_staged_root(arena: &LocationArena) -> Option<(StagedId, String)> {
    incomplete_staged_root_except(arena, None)
}

/// Like [`incomplete_staged_root`], ignoring the staged country `except`.
pub fn incomplete_staged_root_except(
    arena: &LocationArena,
    except: Option<StagedId>,
) -> Option<(StagedId, String)> {
    arena.staged_roots().into_iter().find_map(|staged| {
        if Some(staged) == except {
            return None;
        }
        let view = arena.view(NodeKey::Staged(staged))?;
        if is_complete(&view) {
            None
        } else {
            Some((staged, view.name))
        }
    })
}
