//! Reconciliation of recorded unit states against a material's awaited units.

use std::collections::HashMap;

use crate::material::Material;
use crate::quantities::{RecordedUnit, UnitInventoryState};

/// Normalize `recorded` against `material.awaited_units`.
///
/// The output follows the awaited order and contains exactly one entry per
/// awaited unit. A unit with no record is lost: returns have to be confirmed,
/// they are never assumed. Records for units the material does not await are
/// dropped, and when a unit is recorded twice the later record wins.
///
/// Non-unitary materials have no per-unit tracking and yield an empty list.
pub fn normalize(material: &Material, recorded: &[RecordedUnit]) -> Vec<UnitInventoryState> {
    if !material.is_unitary {
        return Vec::new();
    }

    let by_id: HashMap<_, _> = recorded.iter().map(|unit| (unit.id, unit)).collect();

    material
        .awaited_units
        .iter()
        .map(|awaited| {
            let Some(record) = by_id.get(&awaited.id) else {
                return UnitInventoryState {
                    id: awaited.id,
                    state: awaited.state.clone(),
                    is_lost: true,
                    is_broken: false,
                };
            };

            let is_broken = record.is_broken.unwrap_or(false);
            let is_lost = !is_broken && record.is_lost.unwrap_or(true);
            let state = match (&record.state, is_lost) {
                (Some(state), false) => state.clone(),
                _ => awaited.state.clone(),
            };

            UnitInventoryState {
                id: awaited.id,
                state,
                is_lost,
                is_broken,
            }
        })
        .collect()
}
