//! Canonical soil-structure categories.
//!
//! Field surveys describe structure with many fine-grained terms
//! ("subangular blocky", "crumb", "wedge", ...). Models only ever see the
//! coarse closed vocabulary in [`StructureType`]. Collapsing a description
//! into that vocabulary goes through a static sorted table, never an
//! if/else chain, so the mapping can be audited at a glance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse soil-structure class (`Top_Type`).
///
/// Variants are declared in alphabetical order of their canonical names;
/// [`code`](Self::code) is the 0-based position in that order and is what
/// the feature encoder hands to models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructureType {
    #[serde(rename = "blocky")]
    Blocky,
    #[serde(rename = "granular")]
    Granular,
    #[serde(rename = "massive")]
    Massive,
    #[serde(rename = "platy")]
    Platy,
    #[serde(rename = "prismatic")]
    Prismatic,
    #[serde(rename = "single grain")]
    SingleGrain,
}

impl StructureType {
    /// All categories, ordered by code.
    pub const ALL: [StructureType; 6] = [
        StructureType::Blocky,
        StructureType::Granular,
        StructureType::Massive,
        StructureType::Platy,
        StructureType::Prismatic,
        StructureType::SingleGrain,
    ];

    /// Number of categories in the vocabulary.
    pub const N_CATEGORIES: usize = Self::ALL.len();

    /// Canonical (case-sensitive) name.
    pub fn name(self) -> &'static str {
        match self {
            StructureType::Blocky => "blocky",
            StructureType::Granular => "granular",
            StructureType::Massive => "massive",
            StructureType::Platy => "platy",
            StructureType::Prismatic => "prismatic",
            StructureType::SingleGrain => "single grain",
        }
    }

    /// 0-based category code, fixed regardless of which categories a batch contains.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Exact, case-sensitive match against the canonical names.
    pub fn parse_canonical(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// Collapse a free-text field description into a canonical category.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Returns `None` for descriptions that have no canonical class
    /// (e.g. "unknown"), which callers must treat as missing.
    pub fn from_description(description: &str) -> Option<Self> {
        let key = description.trim().to_ascii_lowercase();
        DESCRIPTION_TABLE
            .binary_search_by(|(d, _)| (*d).cmp(key.as_str()))
            .ok()
            .map(|idx| DESCRIPTION_TABLE[idx].1)
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string is not a canonical structure name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a canonical structure type")]
pub struct UnknownStructureType(pub String);

impl FromStr for StructureType {
    type Err = UnknownStructureType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_canonical(s).ok_or_else(|| UnknownStructureType(s.to_string()))
    }
}

/// Field description → canonical class. Must stay sorted by description.
static DESCRIPTION_TABLE: &[(&str, StructureType)] = &[
    ("angular blocky", StructureType::Blocky),
    ("blocky", StructureType::Blocky),
    ("columnar", StructureType::Prismatic),
    ("crumb", StructureType::Granular),
    ("granular", StructureType::Granular),
    ("lenticular", StructureType::Platy),
    ("massive", StructureType::Massive),
    ("platy", StructureType::Platy),
    ("prismatic", StructureType::Prismatic),
    ("single grain", StructureType::SingleGrain),
    ("single grained", StructureType::SingleGrain),
    ("subangular blocky", StructureType::Blocky),
    ("wedge", StructureType::Blocky),
];
