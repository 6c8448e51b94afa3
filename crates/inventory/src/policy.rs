//! Per-pass edit policy: lock state and strict mode.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Sub-fields of an inventory line that can be locked individually.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockedField {
    Actual,
    Broken,
    UnitState,
}

/// Lock state of an inventory.
///
/// On the wire this is either a boolean or a list of locked field names
/// (`["unit-state"]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LockedRepr", into = "LockedRepr")]
pub enum Locked {
    #[default]
    None,
    All,
    Fields(BTreeSet<LockedField>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LockedRepr {
    Flag(bool),
    Fields(Vec<LockedField>),
}

impl From<LockedRepr> for Locked {
    fn from(repr: LockedRepr) -> Self {
        match repr {
            LockedRepr::Flag(true) => Locked::All,
            LockedRepr::Flag(false) => Locked::None,
            LockedRepr::Fields(fields) => Locked::fields(fields),
        }
    }
}

impl From<Locked> for LockedRepr {
    fn from(locked: Locked) -> Self {
        match locked {
            Locked::None => LockedRepr::Flag(false),
            Locked::All => LockedRepr::Flag(true),
            Locked::Fields(fields) => LockedRepr::Fields(fields.into_iter().collect()),
        }
    }
}

impl Locked {
    /// Lock the given fields only. An empty list locks nothing.
    pub fn fields(fields: impl IntoIterator<Item = LockedField>) -> Self {
        let fields: BTreeSet<_> = fields.into_iter().collect();
        if fields.is_empty() {
            Locked::None
        } else {
            Locked::Fields(fields)
        }
    }

    /// Read-only inventory: every mutation is ignored.
    pub fn is_all(&self) -> bool {
        matches!(self, Locked::All)
    }

    pub fn is_field_locked(&self, field: LockedField) -> bool {
        match self {
            Locked::None => false,
            Locked::All => true,
            Locked::Fields(fields) => fields.contains(&field),
        }
    }
}

/// Flags supplied by the caller for one rendering pass. The engine reads them
/// and never sets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryOptions {
    pub locked: Locked,
    /// Recorded quantities should not exceed the awaited quantity. Advisory:
    /// the engine reports overflow but never clamps.
    pub strict: bool,
}
