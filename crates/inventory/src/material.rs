//! Material catalog contract, as supplied by the event/booking collaborator.

use serde::{Deserialize, Serialize};

use rentkit_core::{Entity, MaterialId, UnitId};

/// A serialized unit the reservation expects back, with its last known state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitedUnit {
    pub id: UnitId,
    pub state: String,
}

/// Catalog view of a material. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    #[serde(default)]
    pub is_unitary: bool,
    #[serde(default)]
    pub awaited_units: Vec<AwaitedUnit>,
}

impl Material {
    /// Material tracked by aggregate count only.
    pub fn counted(id: MaterialId) -> Self {
        Self {
            id,
            is_unitary: false,
            awaited_units: Vec::new(),
        }
    }

    /// Material tracked per serialized unit.
    pub fn unitary(id: MaterialId, awaited_units: Vec<AwaitedUnit>) -> Self {
        Self {
            id,
            is_unitary: true,
            awaited_units,
        }
    }

    pub fn awaited_unit(&self, unit_id: UnitId) -> Option<&AwaitedUnit> {
        self.awaited_units.iter().find(|unit| unit.id == unit_id)
    }

    pub fn awaits_unit(&self, unit_id: UnitId) -> bool {
        self.awaited_unit(unit_id).is_some()
    }
}

impl Entity for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A material as booked for one event: the catalog entry plus its pivot quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMaterial {
    #[serde(flatten)]
    pub material: Material,
    pub awaited_quantity: u32,
}

impl InventoryMaterial {
    pub fn new(material: Material, awaited_quantity: u32) -> Self {
        Self {
            material,
            awaited_quantity,
        }
    }
}
