//! Inventory reconciliation domain module.
//!
//! Tracks, per inventory pass, how many units of each material came back,
//! which serialized units are lost or broken, and merges manual edits and
//! barcode scans into a consistent state. Pure domain logic: no IO, no
//! persistence. Every accepted change is published as an [`InventoryEvent`].

pub mod inventory;
pub mod material;
pub mod normalize;
pub mod policy;
pub mod quantities;
pub mod scan;

pub use inventory::{
    ChangeQuantities, Inventory, InventoryCommand, InventoryEvent, InventoryId, QuantitiesChanged,
    ScanFocus, ScanOutcome, ScanUnit, UnitScanned,
};
pub use material::{AwaitedUnit, InventoryMaterial, Material};
pub use normalize::normalize;
pub use policy::{InventoryOptions, Locked, LockedField};
pub use quantities::{
    MaterialError, MaterialQuantities, MaterialStatus, PersistedQuantities, RecordedUnit,
    UnitInventoryState, UnitToggle,
};
pub use scan::{ScanCode, ScanDecoder, ScanResolver, ScannedUnit};
