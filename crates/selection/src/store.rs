use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentkit_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, MaterialId};
use rentkit_events::Event;

/// Selection session identifier (one per material list being edited).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionId(pub AggregateId);

impl SelectionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SelectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Selected quantity of one material.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub quantity: u32,
}

/// A saved material list line: `{id, quantity}`. Quantities may arrive negative
/// from older saves and are clamped on load.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedMaterial {
    pub id: MaterialId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionCommand {
    Init {
        materials: Vec<SelectedMaterial>,
        occurred_at: DateTime<Utc>,
    },
    Increment {
        material_id: MaterialId,
        occurred_at: DateTime<Utc>,
    },
    Decrement {
        material_id: MaterialId,
        occurred_at: DateTime<Utc>,
    },
    SetQuantity {
        material_id: MaterialId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    },
}

/// Event: SelectionInitialized. Only non-zero entries are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionInitialized {
    pub selection_id: SelectionId,
    pub entries: Vec<(MaterialId, u32)>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuantityChanged (absolute value after the change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChanged {
    pub selection_id: SelectionId,
    pub material_id: MaterialId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionEvent {
    SelectionInitialized(SelectionInitialized),
    QuantityChanged(QuantityChanged),
}

impl Event for SelectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SelectionEvent::SelectionInitialized(_) => "selection.initialized",
            SelectionEvent::QuantityChanged(_) => "selection.quantity_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SelectionEvent::SelectionInitialized(e) => e.occurred_at,
            SelectionEvent::QuantityChanged(e) => e.occurred_at,
        }
    }
}

/// Aggregate root: SelectionStore.
///
/// Mutated in place by the owner; the owner reads the map back directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionStore {
    id: SelectionId,
    entries: HashMap<MaterialId, SelectionEntry>,
    version: u64,
}

impl SelectionStore {
    pub fn empty(id: SelectionId) -> Self {
        Self {
            id,
            entries: HashMap::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> SelectionId {
        self.id
    }

    /// Replace the whole selection. Negative quantities clamp to zero and
    /// zero-quantity lines are not kept.
    pub fn init(&mut self, materials: impl IntoIterator<Item = SelectedMaterial>) {
        let event = self.decide_init(&materials.into_iter().collect::<Vec<_>>(), Utc::now());
        self.apply(&event);
    }

    /// Add one unit, creating the entry if needed.
    pub fn increment(&mut self, material_id: MaterialId) {
        let event = self.decide_increment(material_id, Utc::now());
        self.apply(&event);
    }

    /// Remove one unit. Absent or zero entries are left alone.
    pub fn decrement(&mut self, material_id: MaterialId) {
        if let Some(event) = self.decide_decrement(material_id, Utc::now()) {
            self.apply(&event);
        }
    }

    /// Set the absolute quantity, creating the entry if needed.
    ///
    /// Fails with [`DomainError::InvalidQuantity`] on a negative value, leaving
    /// the selection untouched.
    pub fn set_quantity(&mut self, material_id: MaterialId, quantity: i64) -> DomainResult<()> {
        if let Some(event) = self.decide_set_quantity(material_id, quantity, Utc::now())? {
            self.apply(&event);
        }
        Ok(())
    }

    pub fn get(&self, material_id: MaterialId) -> Option<&SelectionEntry> {
        self.entries.get(&material_id)
    }

    /// Selected quantity, `0` when the material was never selected.
    pub fn quantity(&self, material_id: MaterialId) -> u32 {
        self.get(material_id).map_or(0, |entry| entry.quantity)
    }

    pub fn contains(&self, material_id: MaterialId) -> bool {
        self.entries.contains_key(&material_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, SelectionEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, *entry))
    }

    /// Total number of units selected across all materials.
    pub fn total(&self) -> u64 {
        self.entries.values().map(|entry| u64::from(entry.quantity)).sum()
    }

    /// Lines worth saving: non-zero quantities, in material id order.
    pub fn to_list(&self) -> Vec<SelectedMaterial> {
        let mut list: Vec<_> = self
            .iter()
            .filter(|(_, entry)| entry.quantity > 0)
            .map(|(id, entry)| SelectedMaterial {
                id,
                quantity: i64::from(entry.quantity),
            })
            .collect();
        list.sort_by_key(|line| line.id);
        list
    }

    fn decide_init(&self, materials: &[SelectedMaterial], occurred_at: DateTime<Utc>) -> SelectionEvent {
        let entries = materials
            .iter()
            .filter_map(|line| {
                let quantity = u32::try_from(line.quantity.max(0)).unwrap_or(u32::MAX);
                (quantity > 0).then_some((line.id, quantity))
            })
            .collect();
        SelectionEvent::SelectionInitialized(SelectionInitialized {
            selection_id: self.id,
            entries,
            occurred_at,
        })
    }

    fn decide_increment(&self, material_id: MaterialId, occurred_at: DateTime<Utc>) -> SelectionEvent {
        self.changed(material_id, self.quantity(material_id).saturating_add(1), occurred_at)
    }

    fn decide_decrement(
        &self,
        material_id: MaterialId,
        occurred_at: DateTime<Utc>,
    ) -> Option<SelectionEvent> {
        match self.quantity(material_id) {
            0 => {
                tracing::debug!(%material_id, "decrement ignored: nothing selected");
                None
            }
            current => Some(self.changed(material_id, current - 1, occurred_at)),
        }
    }

    fn decide_set_quantity(
        &self,
        material_id: MaterialId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Option<SelectionEvent>> {
        if quantity < 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| DomainError::validation(format!("quantity {quantity} is too large")))?;
        if self.get(material_id).is_some_and(|entry| entry.quantity == quantity) {
            return Ok(None);
        }
        Ok(Some(self.changed(material_id, quantity, occurred_at)))
    }

    fn changed(&self, material_id: MaterialId, quantity: u32, occurred_at: DateTime<Utc>) -> SelectionEvent {
        SelectionEvent::QuantityChanged(QuantityChanged {
            selection_id: self.id,
            material_id,
            quantity,
            occurred_at,
        })
    }
}

impl AggregateRoot for SelectionStore {
    type Id = SelectionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for SelectionStore {
    type Command = SelectionCommand;
    type Event = SelectionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SelectionEvent::SelectionInitialized(e) => {
                self.entries = e
                    .entries
                    .iter()
                    .map(|(id, quantity)| (*id, SelectionEntry { quantity: *quantity }))
                    .collect();
            }
            SelectionEvent::QuantityChanged(e) => {
                self.entries
                    .entry(e.material_id)
                    .or_default()
                    .quantity = e.quantity;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = match command {
            SelectionCommand::Init {
                materials,
                occurred_at,
            } => Some(self.decide_init(materials, *occurred_at)),
            SelectionCommand::Increment {
                material_id,
                occurred_at,
            } => Some(self.decide_increment(*material_id, *occurred_at)),
            SelectionCommand::Decrement {
                material_id,
                occurred_at,
            } => self.decide_decrement(*material_id, *occurred_at),
            SelectionCommand::SetQuantity {
                material_id,
                quantity,
                occurred_at,
            } => self.decide_set_quantity(*material_id, *quantity, *occurred_at)?,
        };
        Ok(events.into_iter().collect())
    }
}
