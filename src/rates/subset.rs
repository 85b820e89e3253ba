//! Geographic subsets used to filter rows before aggregation.

use clap::ValueEnum;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::dataset::Memberships;
use crate::error::AcsError;
use crate::filter::FilteredRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subset {
    /// Every tract.
    All,
    /// Tracts whose `id` is in the urban list.
    Urban,
    /// Tracts whose `id` is not in the urban list.
    Rural,
    /// Tracts whose `id2` is not in the within-radius list.
    OutsideRadius,
}

impl Subset {
    pub const ALL: [Subset; 4] = [
        Subset::All,
        Subset::Urban,
        Subset::Rural,
        Subset::OutsideRadius,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subset::All => "all",
            Subset::Urban => "urban",
            Subset::Rural => "rural",
            Subset::OutsideRadius => "outside-radius",
        }
    }

    /// Resolves the subset into a row predicate over `memberships`.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError::MissingMembership`] if the subset needs a list that
    /// was not loaded.
    pub fn predicate<'a>(&self, memberships: &'a Memberships) -> Result<RowPredicate<'a>, AcsError> {
        Ok(match self {
            Subset::All => RowPredicate::Any,
            Subset::Urban => RowPredicate::IdIn(memberships.urban()?),
            Subset::Rural => RowPredicate::IdNotIn(memberships.urban()?),
            Subset::OutsideRadius => RowPredicate::Id2NotIn(memberships.within_radius()?),
        })
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership test applied to a single row.
#[derive(Debug, Clone, Copy)]
pub enum RowPredicate<'a> {
    Any,
    IdIn(&'a HashSet<String>),
    IdNotIn(&'a HashSet<String>),
    Id2NotIn(&'a HashSet<String>),
}

impl RowPredicate<'_> {
    pub fn accepts(&self, row: &FilteredRow) -> bool {
        match self {
            RowPredicate::Any => true,
            RowPredicate::IdIn(ids) => ids.contains(row.id()),
            RowPredicate::IdNotIn(ids) => !ids.contains(row.id()),
            RowPredicate::Id2NotIn(ids) => !ids.contains(row.id2()),
        }
    }
}
