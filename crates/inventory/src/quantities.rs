//! Per-material inventory quantities and per-unit states.

use serde::{Deserialize, Serialize};

use rentkit_core::{MaterialId, UnitId, ValueObject};

/// Normalized state of one awaited unit in an inventory pass.
///
/// Invariants (held by [`crate::normalize`]):
/// - `is_broken` implies `!is_lost`
/// - `is_lost` implies `state` is the unit's canonical state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitInventoryState {
    pub id: UnitId,
    pub state: String,
    pub is_lost: bool,
    pub is_broken: bool,
}

impl ValueObject for UnitInventoryState {}

/// A unit state as previously saved or edited; any field may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedUnit {
    pub id: UnitId,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub is_lost: Option<bool>,
    #[serde(default)]
    pub is_broken: Option<bool>,
}

impl RecordedUnit {
    /// A record carrying only the id; every flag falls back to its default.
    pub fn bare(id: UnitId) -> Self {
        Self {
            id,
            state: None,
            is_lost: None,
            is_broken: None,
        }
    }
}

impl From<UnitInventoryState> for RecordedUnit {
    fn from(unit: UnitInventoryState) -> Self {
        Self {
            id: unit.id,
            state: Some(unit.state),
            is_lost: Some(unit.is_lost),
            is_broken: Some(unit.is_broken),
        }
    }
}

/// Manual transitions of a unit's presence flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitToggle {
    /// Lost or broken → present and sound.
    MarkFound,
    /// Present (sound or broken) → lost.
    MarkLost,
    /// Lost or sound → present and broken.
    MarkBroken,
    /// Broken → present and sound.
    MarkRepaired,
}

/// Aggregate quantities of one material in one inventory pass.
///
/// `broken` counts units that came back damaged, so it is part of `actual`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialQuantities {
    pub actual: u32,
    pub broken: u32,
    #[serde(default)]
    pub units: Vec<UnitInventoryState>,
}

impl ValueObject for MaterialQuantities {}

impl MaterialQuantities {
    pub fn new(actual: u32, broken: u32) -> Self {
        Self {
            actual,
            broken,
            units: Vec::new(),
        }
    }

    pub fn unit(&self, unit_id: UnitId) -> Option<&UnitInventoryState> {
        self.units.iter().find(|unit| unit.id == unit_id)
    }

    fn unit_mut(&mut self, unit_id: UnitId) -> Option<&mut UnitInventoryState> {
        self.units.iter_mut().find(|unit| unit.id == unit_id)
    }

    /// Apply a manual transition, keeping `actual`/`broken` in step with the flags.
    ///
    /// Returns `false` when the unit is unknown or already in the target state.
    /// A unit going lost keeps its edited `state` here; the normalizer restores
    /// the canonical one.
    pub fn apply_toggle(&mut self, unit_id: UnitId, toggle: UnitToggle) -> bool {
        let Some(unit) = self.unit_mut(unit_id) else {
            return false;
        };
        let (was_lost, was_broken) = (unit.is_lost, unit.is_broken);
        let (is_lost, is_broken) = match toggle {
            UnitToggle::MarkFound => (false, false),
            UnitToggle::MarkLost => (true, false),
            UnitToggle::MarkBroken => (false, true),
            UnitToggle::MarkRepaired if was_broken => (false, false),
            UnitToggle::MarkRepaired => return false,
        };
        if (was_lost, was_broken) == (is_lost, is_broken) {
            return false;
        }
        unit.is_lost = is_lost;
        unit.is_broken = is_broken;

        match (was_lost, is_lost) {
            (true, false) => self.actual = self.actual.saturating_add(1),
            (false, true) => self.actual = self.actual.saturating_sub(1),
            _ => {}
        }
        match (was_broken, is_broken) {
            (false, true) => self.broken = self.broken.saturating_add(1),
            (true, false) => self.broken = self.broken.saturating_sub(1),
            _ => {}
        }
        true
    }

    /// Edit the condition state of a present unit. Lost units keep their
    /// canonical state, so the edit is refused for them.
    pub fn set_unit_state(&mut self, unit_id: UnitId, state: impl Into<String>) -> bool {
        match self.unit_mut(unit_id) {
            Some(unit) if !unit.is_lost => {
                unit.state = state.into();
                true
            }
            _ => false,
        }
    }
}

/// Quantities as loaded from (or handed back to) the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedQuantities {
    pub id: MaterialId,
    pub actual: u32,
    pub broken: u32,
    #[serde(default)]
    pub units: Vec<RecordedUnit>,
}

impl PersistedQuantities {
    pub fn from_quantities(id: MaterialId, quantities: MaterialQuantities) -> Self {
        Self {
            id,
            actual: quantities.actual,
            broken: quantities.broken,
            units: quantities.units.into_iter().map(RecordedUnit::from).collect(),
        }
    }
}

/// Presentation-level derivation for one material. Advisory only.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialStatus {
    /// Units awaited but not counted as returned.
    pub missing: u32,
    /// Units that came back broken.
    pub broken: u32,
    /// Strict mode only: more units counted than were awaited.
    pub exceeds_awaited: bool,
}

impl MaterialStatus {
    pub fn evaluate(awaited_quantity: u32, quantities: &MaterialQuantities, strict: bool) -> Self {
        Self {
            missing: awaited_quantity.saturating_sub(quantities.actual),
            broken: quantities.broken,
            exceeds_awaited: strict && quantities.actual > awaited_quantity,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.missing > 0
    }

    pub fn has_broken(&self) -> bool {
        self.broken > 0
    }
}

/// Advisory validation error for one material, sourced from a save attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialError {
    pub id: MaterialId,
    pub message: String,
}
