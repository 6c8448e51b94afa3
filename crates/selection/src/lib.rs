//! Material selection domain module.
//!
//! Quantities picked per material while building the material list of an
//! event or booking. Independent from the inventory pass that later checks
//! those materials back in.

pub mod store;

pub use store::{
    QuantityChanged, SelectedMaterial, SelectionCommand, SelectionEntry, SelectionEvent,
    SelectionId, SelectionInitialized, SelectionStore,
};
