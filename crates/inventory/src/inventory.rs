use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentkit_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion, MaterialId,
    UnitId,
};
use rentkit_events::{Event, EventBus, execute};

use crate::material::InventoryMaterial;
use crate::normalize::normalize;
use crate::policy::{InventoryOptions, LockedField};
use crate::quantities::{
    MaterialError, MaterialQuantities, MaterialStatus, PersistedQuantities, RecordedUnit,
    UnitToggle,
};

/// Inventory pass identifier (one per event return or departure check).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryId(pub AggregateId);

impl InventoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Command: ChangeQuantities (manual edit of a whole line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeQuantities {
    pub material_id: MaterialId,
    pub quantities: MaterialQuantities,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ScanUnit (a decoded barcode scan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanUnit {
    pub material_id: MaterialId,
    pub unit_id: UnitId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    ChangeQuantities(ChangeQuantities),
    ScanUnit(ScanUnit),
}

/// Event: QuantitiesChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitiesChanged {
    pub inventory_id: InventoryId,
    pub material_id: MaterialId,
    pub quantities: MaterialQuantities,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitScanned. Carries the full line after the unit was counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitScanned {
    pub inventory_id: InventoryId,
    pub material_id: MaterialId,
    pub unit_id: UnitId,
    pub quantities: MaterialQuantities,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    QuantitiesChanged(QuantitiesChanged),
    UnitScanned(UnitScanned),
}

impl InventoryEvent {
    pub fn material_id(&self) -> MaterialId {
        match self {
            InventoryEvent::QuantitiesChanged(e) => e.material_id,
            InventoryEvent::UnitScanned(e) => e.material_id,
        }
    }

    /// The normalized `{actual, broken, units}` snapshot to hand to persistence.
    pub fn quantities(&self) -> &MaterialQuantities {
        match self {
            InventoryEvent::QuantitiesChanged(e) => &e.quantities,
            InventoryEvent::UnitScanned(e) => &e.quantities,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::QuantitiesChanged(_) => "inventory.quantities.changed",
            InventoryEvent::UnitScanned(_) => "inventory.unit.scanned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::QuantitiesChanged(e) => e.occurred_at,
            InventoryEvent::UnitScanned(e) => e.occurred_at,
        }
    }
}

/// Row the view should bring into view after a scan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFocus {
    pub material_id: MaterialId,
    pub unit_id: UnitId,
}

/// Result of feeding a scan to the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scan does not designate an awaited unit of a unitary material.
    Ignored,
    /// The unit exists but nothing changed (already found, or inventory locked).
    Unchanged(ScanFocus),
    /// The unit was lost and is now counted as returned.
    Recorded {
        focus: ScanFocus,
        quantities: MaterialQuantities,
    },
}

impl ScanOutcome {
    pub fn focus(&self) -> Option<ScanFocus> {
        match self {
            ScanOutcome::Ignored => None,
            ScanOutcome::Unchanged(focus) => Some(*focus),
            ScanOutcome::Recorded { focus, .. } => Some(*focus),
        }
    }
}

/// Aggregate root: Inventory.
///
/// Holds the quantities of every material of one inventory pass. Every accepted
/// mutation is applied here first, then published on `bus` for the owner to
/// persist; the inventory never persists anything itself.
#[derive(Debug)]
pub struct Inventory<B> {
    id: InventoryId,
    materials: BTreeMap<MaterialId, InventoryMaterial>,
    recorded: HashMap<MaterialId, PersistedQuantities>,
    errors: HashMap<MaterialId, String>,
    options: InventoryOptions,
    version: u64,
    bus: B,
}

impl<B> Inventory<B>
where
    B: EventBus<InventoryEvent>,
{
    /// Open an inventory pass over `materials`, seeded with previously saved quantities.
    ///
    /// Saved quantities for materials outside the pass are discarded.
    pub fn new(
        id: InventoryId,
        materials: impl IntoIterator<Item = InventoryMaterial>,
        persisted: impl IntoIterator<Item = PersistedQuantities>,
        options: InventoryOptions,
        bus: B,
    ) -> Self {
        let materials: BTreeMap<_, _> = materials
            .into_iter()
            .map(|entry| (entry.material.id, entry))
            .collect();

        let mut recorded = HashMap::new();
        for quantities in persisted {
            if materials.contains_key(&quantities.id) {
                recorded.insert(quantities.id, quantities);
            } else {
                tracing::debug!(material_id = %quantities.id, "discarding quantities of unknown material");
            }
        }

        tracing::info!(
            inventory_id = %id,
            materials = materials.len(),
            recorded = recorded.len(),
            "inventory loaded"
        );

        Self {
            id,
            materials,
            recorded,
            errors: HashMap::new(),
            options,
            version: 0,
            bus,
        }
    }

    pub fn id_typed(&self) -> InventoryId {
        self.id
    }

    pub fn options(&self) -> &InventoryOptions {
        &self.options
    }

    /// Replace the lock/strict flags for the next rendering pass.
    pub fn set_options(&mut self, options: InventoryOptions) {
        self.options = options;
    }

    pub fn material(&self, material_id: MaterialId) -> DomainResult<&InventoryMaterial> {
        self.materials
            .get(&material_id)
            .ok_or_else(|| DomainError::not_found(format!("material {material_id}")))
    }

    /// Current quantities of a material, with units normalized against its awaited units.
    pub fn get_quantities(&self, material_id: MaterialId) -> DomainResult<MaterialQuantities> {
        let entry = self.material(material_id)?;
        let quantities = match self.recorded.get(&material_id) {
            Some(saved) => MaterialQuantities {
                actual: saved.actual,
                broken: saved.broken,
                units: normalize(&entry.material, &saved.units),
            },
            None => MaterialQuantities {
                units: normalize(&entry.material, &[]),
                ..MaterialQuantities::default()
            },
        };
        Ok(quantities)
    }

    /// Record a manual edit of one line.
    ///
    /// Ignored while the inventory is fully locked. Locked sub-fields keep their
    /// current values. Strict bounds are not enforced here.
    pub fn handle_change(
        &mut self,
        material_id: MaterialId,
        quantities: MaterialQuantities,
    ) -> DomainResult<()> {
        self.dispatch(InventoryCommand::ChangeQuantities(ChangeQuantities {
            material_id,
            quantities,
            occurred_at: Utc::now(),
        }))
        .map(|_| ())
    }

    /// [`Self::handle_change`], refused with a conflict when the caller edited
    /// from a stale version.
    pub fn handle_change_expecting(
        &mut self,
        expected: ExpectedVersion,
        material_id: MaterialId,
        quantities: MaterialQuantities,
    ) -> DomainResult<()> {
        expected.check(self.version)?;
        self.handle_change(material_id, quantities)
    }

    /// Apply a manual found/lost/broken transition to one unit.
    ///
    /// Returns `Ok(false)` when nothing changed: the unit is unknown, already in
    /// the target state, or the counts it would move are locked.
    pub fn toggle_unit(
        &mut self,
        material_id: MaterialId,
        unit_id: UnitId,
        toggle: UnitToggle,
    ) -> DomainResult<bool> {
        let mut quantities = self.get_quantities(material_id)?;
        let locked = &self.options.locked;
        if locked.is_field_locked(LockedField::Actual) || locked.is_field_locked(LockedField::Broken) {
            tracing::debug!(%material_id, %unit_id, "unit toggle ignored: counts are locked");
            return Ok(false);
        }
        if !quantities.apply_toggle(unit_id, toggle) {
            return Ok(false);
        }
        self.handle_change(material_id, quantities)?;
        Ok(true)
    }

    /// Edit the condition state of a returned unit.
    pub fn set_unit_state(
        &mut self,
        material_id: MaterialId,
        unit_id: UnitId,
        state: impl Into<String>,
    ) -> DomainResult<bool> {
        let mut quantities = self.get_quantities(material_id)?;
        if self.options.locked.is_field_locked(LockedField::UnitState) {
            tracing::debug!(%material_id, %unit_id, "unit state edit ignored: locked");
            return Ok(false);
        }
        if !quantities.set_unit_state(unit_id, state) {
            return Ok(false);
        }
        self.handle_change(material_id, quantities)?;
        Ok(true)
    }

    /// Count a scanned unit as returned.
    ///
    /// Scans that do not designate an awaited unit of a unitary material are
    /// ignored. A known unit always yields a focus, even when nothing changes.
    pub fn handle_scan(
        &mut self,
        material_id: Option<MaterialId>,
        unit_id: Option<UnitId>,
    ) -> DomainResult<ScanOutcome> {
        let (Some(material_id), Some(unit_id)) = (material_id, unit_id) else {
            tracing::debug!("scan ignored: incomplete code");
            return Ok(ScanOutcome::Ignored);
        };
        if self.scan_target(material_id, unit_id).is_none() {
            tracing::debug!(%material_id, %unit_id, "scan ignored: not an awaited unit");
            return Ok(ScanOutcome::Ignored);
        }

        let focus = ScanFocus {
            material_id,
            unit_id,
        };
        let events = self.dispatch(InventoryCommand::ScanUnit(ScanUnit {
            material_id,
            unit_id,
            occurred_at: Utc::now(),
        }))?;

        Ok(match events.into_iter().next() {
            Some(event) => ScanOutcome::Recorded {
                focus,
                quantities: event.quantities().clone(),
            },
            None => ScanOutcome::Unchanged(focus),
        })
    }

    /// Advisory error recorded against a material by the last save attempt.
    pub fn get_error(&self, material_id: MaterialId) -> Option<&str> {
        self.errors.get(&material_id).map(String::as_str)
    }

    /// Replace advisory errors with those returned by a save attempt.
    pub fn set_errors(&mut self, errors: impl IntoIterator<Item = MaterialError>) {
        self.errors = errors
            .into_iter()
            .map(|error| (error.id, error.message))
            .collect();
    }

    /// Upper bound the view should enforce on `actual`, in strict mode only.
    pub fn max_actual(&self, material_id: MaterialId) -> DomainResult<Option<u32>> {
        let entry = self.material(material_id)?;
        Ok(self.options.strict.then_some(entry.awaited_quantity))
    }

    pub fn status(&self, material_id: MaterialId) -> DomainResult<MaterialStatus> {
        let entry = self.material(material_id)?;
        let quantities = self.get_quantities(material_id)?;
        Ok(MaterialStatus::evaluate(
            entry.awaited_quantity,
            &quantities,
            self.options.strict,
        ))
    }

    /// Materials with fewer units counted than awaited, in id order.
    pub fn missing_materials(&self) -> Vec<MaterialId> {
        self.materials
            .keys()
            .copied()
            .filter(|id| self.status(*id).is_ok_and(|status| status.is_missing()))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_materials().is_empty()
    }

    /// Current quantities of every material, in the persistence contract shape.
    pub fn to_persisted(&self) -> Vec<PersistedQuantities> {
        self.materials
            .keys()
            .filter_map(|id| {
                self.get_quantities(*id)
                    .ok()
                    .map(|quantities| PersistedQuantities::from_quantities(*id, quantities))
            })
            .collect()
    }

    fn dispatch(&mut self, command: InventoryCommand) -> DomainResult<Vec<InventoryEvent>> {
        let events = execute(self, &command)?;
        for event in &events {
            self.bus.publish(event.clone()).map_err(|e| {
                tracing::warn!(
                    inventory_id = %self.id,
                    event_type = event.event_type(),
                    error = %e,
                    "failed to publish inventory change"
                );
                DomainError::publish(e.to_string())
            })?;
        }
        Ok(events)
    }
}

impl<B> Inventory<B> {
    /// Current quantities of a scannable unit's material, if the scan designates one.
    fn scan_target(&self, material_id: MaterialId, unit_id: UnitId) -> Option<MaterialQuantities> {
        let entry = self.materials.get(&material_id)?;
        let material = &entry.material;
        if !material.is_unitary || material.awaited_units.is_empty() || !material.awaits_unit(unit_id)
        {
            return None;
        }
        let saved = self.recorded.get(&material_id);
        let quantities = MaterialQuantities {
            actual: saved.map_or(0, |q| q.actual),
            broken: saved.map_or(0, |q| q.broken),
            units: normalize(material, saved.map_or(&[][..], |q| q.units.as_slice())),
        };
        quantities.unit(unit_id)?;
        Some(quantities)
    }

    fn decide_change(&self, cmd: &ChangeQuantities) -> Result<Vec<InventoryEvent>, DomainError> {
        let locked = &self.options.locked;
        if locked.is_all() {
            tracing::debug!(material_id = %cmd.material_id, "change ignored: inventory is locked");
            return Ok(Vec::new());
        }
        let entry = self
            .materials
            .get(&cmd.material_id)
            .ok_or_else(|| DomainError::not_found(format!("material {}", cmd.material_id)))?;
        let material = &entry.material;
        let saved = self.recorded.get(&cmd.material_id);

        let mut next = cmd.quantities.clone();
        if locked.is_field_locked(LockedField::Actual) {
            next.actual = saved.map_or(0, |q| q.actual);
        }
        if locked.is_field_locked(LockedField::Broken) {
            next.broken = saved.map_or(0, |q| q.broken);
        }

        let mut units: Vec<RecordedUnit> = next.units.into_iter().map(RecordedUnit::from).collect();
        if locked.is_field_locked(LockedField::UnitState) {
            let current = normalize(material, saved.map_or(&[][..], |q| q.units.as_slice()));
            for unit in &mut units {
                if let Some(previous) = current.iter().find(|c| c.id == unit.id) {
                    unit.state = Some(previous.state.clone());
                }
            }
        }
        next.units = normalize(material, &units);

        Ok(vec![InventoryEvent::QuantitiesChanged(QuantitiesChanged {
            inventory_id: self.id,
            material_id: cmd.material_id,
            quantities: next,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn decide_scan(&self, cmd: &ScanUnit) -> Result<Vec<InventoryEvent>, DomainError> {
        let Some(mut quantities) = self.scan_target(cmd.material_id, cmd.unit_id) else {
            return Ok(Vec::new());
        };
        let locked = &self.options.locked;
        if locked.is_all() || locked.is_field_locked(LockedField::Actual) {
            tracing::debug!(material_id = %cmd.material_id, unit_id = %cmd.unit_id, "scan ignored: inventory is locked");
            return Ok(Vec::new());
        }
        // Only a lost unit moves; a second scan of the same unit is not counted twice.
        if !quantities.unit(cmd.unit_id).is_some_and(|unit| unit.is_lost) {
            return Ok(Vec::new());
        }
        quantities.apply_toggle(cmd.unit_id, UnitToggle::MarkFound);

        Ok(vec![InventoryEvent::UnitScanned(UnitScanned {
            inventory_id: self.id,
            material_id: cmd.material_id,
            unit_id: cmd.unit_id,
            quantities,
            occurred_at: cmd.occurred_at,
        })])
    }
}

impl<B> AggregateRoot for Inventory<B> {
    type Id = InventoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl<B> Aggregate for Inventory<B> {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        let material_id = event.material_id();
        self.recorded.insert(
            material_id,
            PersistedQuantities::from_quantities(material_id, event.quantities().clone()),
        );
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::ChangeQuantities(cmd) => self.decide_change(cmd),
            InventoryCommand::ScanUnit(cmd) => self.decide_scan(cmd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rentkit_events::{InMemoryEventBus, Subscription};

    use crate::material::{AwaitedUnit, Material};
    use crate::policy::Locked;
    use crate::quantities::UnitInventoryState;

    type Bus = Arc<InMemoryEventBus<InventoryEvent>>;

    fn mid(id: u64) -> MaterialId {
        MaterialId::new(id)
    }

    fn uid(id: u64) -> UnitId {
        UnitId::new(id)
    }

    fn unitary(id: u64, unit_ids: &[u64]) -> InventoryMaterial {
        let units = unit_ids
            .iter()
            .map(|u| AwaitedUnit {
                id: uid(*u),
                state: "ok".to_string(),
            })
            .collect::<Vec<_>>();
        let awaited = units.len() as u32;
        InventoryMaterial::new(Material::unitary(mid(id), units), awaited)
    }

    fn counted(id: u64, awaited: u32) -> InventoryMaterial {
        InventoryMaterial::new(Material::counted(mid(id)), awaited)
    }

    fn open(
        materials: Vec<InventoryMaterial>,
        persisted: Vec<PersistedQuantities>,
        options: InventoryOptions,
    ) -> (Inventory<Bus>, Subscription<InventoryEvent>) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let changes = bus.subscribe();
        let inventory = Inventory::new(
            InventoryId::new(AggregateId::new()),
            materials,
            persisted,
            options,
            bus,
        );
        (inventory, changes)
    }

    fn locked(locked: Locked) -> InventoryOptions {
        InventoryOptions {
            locked,
            strict: false,
        }
    }

    fn found(id: u64, state: &str) -> UnitInventoryState {
        UnitInventoryState {
            id: uid(id),
            state: state.to_string(),
            is_lost: false,
            is_broken: false,
        }
    }

    #[test]
    fn unknown_material_is_a_contract_violation() {
        let (mut inventory, _changes) = open(vec![counted(1, 2)], vec![], InventoryOptions::default());

        assert!(matches!(inventory.get_quantities(mid(9)), Err(DomainError::NotFound(_))));
        assert!(matches!(
            inventory.handle_change(mid(9), MaterialQuantities::new(1, 0)),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn unrecorded_material_starts_empty_with_units_lost() {
        let (inventory, _changes) =
            open(vec![unitary(7, &[70, 71]), counted(8, 4)], vec![], InventoryOptions::default());

        let q = inventory.get_quantities(mid(7)).unwrap();
        assert_eq!((q.actual, q.broken), (0, 0));
        assert!(q.units.iter().all(|u| u.is_lost && !u.is_broken));

        assert_eq!(inventory.get_quantities(mid(8)).unwrap(), MaterialQuantities::new(0, 0));
    }

    #[test]
    fn persisted_quantities_seed_the_inventory() {
        let persisted = vec![
            PersistedQuantities {
                id: mid(7),
                actual: 1,
                broken: 0,
                units: vec![RecordedUnit::from(found(70, "worn"))],
            },
            PersistedQuantities {
                id: mid(99),
                actual: 3,
                broken: 0,
                units: vec![],
            },
        ];
        let (inventory, _changes) = open(vec![unitary(7, &[70, 71])], persisted, InventoryOptions::default());

        let q = inventory.get_quantities(mid(7)).unwrap();
        assert_eq!(q.actual, 1);
        assert_eq!(q.units[0], found(70, "worn"));
        assert!(q.units[1].is_lost);
        assert_eq!(inventory.to_persisted().len(), 1);
    }

    #[test]
    fn change_is_applied_and_emitted() {
        let (mut inventory, changes) = open(vec![counted(1, 5)], vec![], InventoryOptions::default());

        inventory.handle_change(mid(1), MaterialQuantities::new(4, 1)).unwrap();

        assert_eq!(inventory.get_quantities(mid(1)).unwrap(), MaterialQuantities::new(4, 1));
        assert_eq!(inventory.version(), 1);
        let event = changes.try_recv().unwrap();
        assert_eq!(event.event_type(), "inventory.quantities.changed");
        assert_eq!(event.material_id(), mid(1));
        assert_eq!(event.quantities(), &MaterialQuantities::new(4, 1));
    }

    #[test]
    fn change_on_counted_material_drops_units() {
        let (mut inventory, _changes) = open(vec![counted(1, 5)], vec![], InventoryOptions::default());
        let mut q = MaterialQuantities::new(2, 0);
        q.units.push(found(10, "ok"));

        inventory.handle_change(mid(1), q).unwrap();

        assert!(inventory.get_quantities(mid(1)).unwrap().units.is_empty());
    }

    #[test]
    fn change_normalizes_units() {
        let (mut inventory, changes) = open(vec![unitary(7, &[70, 71])], vec![], InventoryOptions::default());
        let q = MaterialQuantities {
            actual: 1,
            broken: 1,
            units: vec![
                UnitInventoryState {
                    id: uid(70),
                    state: "damaged".to_string(),
                    is_lost: true,
                    is_broken: true,
                },
                found(99, "ok"),
            ],
        };

        inventory.handle_change(mid(7), q).unwrap();

        let emitted = changes.try_recv().unwrap();
        let units = &emitted.quantities().units;
        assert_eq!(units.len(), 2);
        assert!(units[0].is_broken && !units[0].is_lost);
        assert_eq!(units[0].state, "damaged");
        assert!(units[1].is_lost);
        assert_eq!(units[1].id, uid(71));
    }

    #[test]
    fn change_is_ignored_while_locked() {
        let (mut inventory, changes) = open(vec![counted(1, 5)], vec![], locked(Locked::All));

        inventory.handle_change(mid(1), MaterialQuantities::new(4, 0)).unwrap();

        assert_eq!(inventory.get_quantities(mid(1)).unwrap().actual, 0);
        assert_eq!(inventory.version(), 0);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn locked_fields_keep_their_values() {
        let persisted = vec![PersistedQuantities {
            id: mid(7),
            actual: 1,
            broken: 0,
            units: vec![RecordedUnit::from(found(70, "ok"))],
        }];
        let options = locked(Locked::fields([LockedField::UnitState, LockedField::Broken]));
        let (mut inventory, _changes) = open(vec![unitary(7, &[70])], persisted, options);

        let mut q = inventory.get_quantities(mid(7)).unwrap();
        q.actual = 2;
        q.broken = 1;
        q.units[0].state = "damaged".to_string();
        inventory.handle_change(mid(7), q).unwrap();

        let q = inventory.get_quantities(mid(7)).unwrap();
        assert_eq!(q.actual, 2);
        assert_eq!(q.broken, 0);
        assert_eq!(q.units[0].state, "ok");
        assert!(!inventory.set_unit_state(mid(7), uid(70), "worn").unwrap());
    }

    #[test]
    fn locked_actual_keeps_its_value_and_blocks_scans() {
        let persisted = vec![PersistedQuantities {
            id: mid(7),
            actual: 1,
            broken: 0,
            units: vec![RecordedUnit::from(found(70, "ok"))],
        }];
        let options = locked(Locked::fields([LockedField::Actual]));
        let (mut inventory, changes) = open(vec![unitary(7, &[70, 71])], persisted, options);

        let mut q = inventory.get_quantities(mid(7)).unwrap();
        q.actual = 2;
        q.units[0].state = "worn".to_string();
        inventory.handle_change(mid(7), q).unwrap();

        let q = inventory.get_quantities(mid(7)).unwrap();
        assert_eq!(q.actual, 1);
        assert_eq!(q.units[0].state, "worn");
        assert!(changes.try_recv().is_ok());

        let outcome = inventory.handle_scan(Some(mid(7)), Some(uid(71))).unwrap();
        assert!(!matches!(outcome, ScanOutcome::Recorded { .. }));
        let q = inventory.get_quantities(mid(7)).unwrap();
        assert_eq!(q.actual, 1);
        assert!(q.units[1].is_lost);
        assert!(changes.try_recv().is_err());
    }

    #[derive(Debug)]
    struct RejectingBus;

    impl EventBus<InventoryEvent> for RejectingBus {
        type Error = String;

        fn publish(&self, _message: InventoryEvent) -> Result<(), Self::Error> {
            Err("save refused".to_string())
        }

        fn subscribe(&self) -> Subscription<InventoryEvent> {
            Subscription::new(std::sync::mpsc::channel().1)
        }
    }

    #[test]
    fn publish_failure_is_reported_after_the_change_is_applied() {
        let mut inventory = Inventory::new(
            InventoryId::new(AggregateId::new()),
            vec![counted(1, 5), unitary(7, &[70])],
            Vec::<PersistedQuantities>::new(),
            InventoryOptions::default(),
            RejectingBus,
        );

        let err = inventory
            .handle_change(mid(1), MaterialQuantities::new(3, 0))
            .unwrap_err();

        assert_eq!(err, DomainError::Publish("save refused".to_string()));
        assert_eq!(inventory.get_quantities(mid(1)).unwrap().actual, 3);
        assert_eq!(inventory.version(), 1);

        let err = inventory.handle_scan(Some(mid(7)), Some(uid(70))).unwrap_err();
        assert!(matches!(err, DomainError::Publish(_)));
        assert!(!inventory.get_quantities(mid(7)).unwrap().units[0].is_lost);
        assert_eq!(inventory.version(), 2);
    }

    #[test]
    fn stale_change_is_a_conflict() {
        let (mut inventory, _changes) = open(vec![counted(1, 5)], vec![], InventoryOptions::default());
        inventory
            .handle_change_expecting(ExpectedVersion::Exact(0), mid(1), MaterialQuantities::new(1, 0))
            .unwrap();

        let err = inventory
            .handle_change_expecting(ExpectedVersion::Exact(0), mid(1), MaterialQuantities::new(2, 0))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(inventory.get_quantities(mid(1)).unwrap().actual, 1);
    }

    #[test]
    fn scan_counts_a_lost_unit_once() {
        let (mut inventory, changes) = open(vec![unitary(7, &[70, 71])], vec![], InventoryOptions::default());

        let outcome = inventory.handle_scan(Some(mid(7)), Some(uid(70))).unwrap();
        let ScanOutcome::Recorded { focus, quantities } = outcome else {
            panic!("expected the scan to be recorded");
        };
        assert_eq!(focus, ScanFocus { material_id: mid(7), unit_id: uid(70) });
        assert_eq!(quantities.actual, 1);
        assert_eq!(changes.try_recv().unwrap().event_type(), "inventory.unit.scanned");

        let again = inventory.handle_scan(Some(mid(7)), Some(uid(70))).unwrap();
        assert!(matches!(again, ScanOutcome::Unchanged(_)));
        assert_eq!(inventory.get_quantities(mid(7)).unwrap().actual, 1);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn scan_of_broken_unit_leaves_it_broken() {
        let (mut inventory, _changes) = open(vec![unitary(7, &[70])], vec![], InventoryOptions::default());
        inventory.toggle_unit(mid(7), uid(70), UnitToggle::MarkBroken).unwrap();

        let outcome = inventory.handle_scan(Some(mid(7)), Some(uid(70))).unwrap();

        assert!(matches!(outcome, ScanOutcome::Unchanged(_)));
        let q = inventory.get_quantities(mid(7)).unwrap();
        assert_eq!((q.actual, q.broken), (1, 1));
        assert!(q.units[0].is_broken);
    }

    #[test]
    fn scan_while_locked_focuses_without_mutating() {
        let (mut inventory, changes) = open(vec![unitary(7, &[70])], vec![], locked(Locked::All));

        let outcome = inventory.handle_scan(Some(mid(7)), Some(uid(70))).unwrap();

        assert_eq!(outcome.focus(), Some(ScanFocus { material_id: mid(7), unit_id: uid(70) }));
        let q = inventory.get_quantities(mid(7)).unwrap();
        assert_eq!(q.actual, 0);
        assert!(q.units[0].is_lost);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn scan_of_foreign_or_incomplete_code_is_ignored() {
        let (mut inventory, _changes) =
            open(vec![unitary(7, &[70]), counted(8, 3), unitary(9, &[])], vec![], InventoryOptions::default());

        assert_eq!(inventory.handle_scan(None, Some(uid(70))).unwrap(), ScanOutcome::Ignored);
        assert_eq!(inventory.handle_scan(Some(mid(7)), None).unwrap(), ScanOutcome::Ignored);
        assert_eq!(inventory.handle_scan(Some(mid(42)), Some(uid(70))).unwrap(), ScanOutcome::Ignored);
        assert_eq!(inventory.handle_scan(Some(mid(8)), Some(uid(70))).unwrap(), ScanOutcome::Ignored);
        assert_eq!(inventory.handle_scan(Some(mid(9)), Some(uid(70))).unwrap(), ScanOutcome::Ignored);
        assert_eq!(inventory.handle_scan(Some(mid(7)), Some(uid(71))).unwrap(), ScanOutcome::Ignored);
        assert_eq!(inventory.version(), 0);
    }

    #[test]
    fn toggles_move_counts_with_flags() {
        let (mut inventory, _changes) = open(vec![unitary(7, &[70, 71])], vec![], InventoryOptions::default());

        assert!(inventory.toggle_unit(mid(7), uid(70), UnitToggle::MarkBroken).unwrap());
        assert!(inventory.toggle_unit(mid(7), uid(71), UnitToggle::MarkFound).unwrap());
        assert!(!inventory.toggle_unit(mid(7), uid(71), UnitToggle::MarkFound).unwrap());
        assert!(inventory.set_unit_state(mid(7), uid(71), "worn").unwrap());

        let q = inventory.get_quantities(mid(7)).unwrap();
        assert_eq!((q.actual, q.broken), (2, 1));

        assert!(inventory.toggle_unit(mid(7), uid(71), UnitToggle::MarkLost).unwrap());
        let q = inventory.get_quantities(mid(7)).unwrap();
        assert_eq!(q.actual, 1);
        assert_eq!(q.units[1].state, "ok");
    }

    #[test]
    fn status_reports_missing_and_strict_overflow() {
        let options = InventoryOptions {
            locked: Locked::None,
            strict: true,
        };
        let (mut inventory, _changes) = open(vec![counted(1, 3), counted(2, 1)], vec![], options);

        inventory.handle_change(mid(1), MaterialQuantities::new(2, 1)).unwrap();
        inventory.handle_change(mid(2), MaterialQuantities::new(2, 0)).unwrap();

        let first = inventory.status(mid(1)).unwrap();
        assert_eq!(first.missing, 1);
        assert!(first.has_broken());
        assert!(inventory.status(mid(2)).unwrap().exceeds_awaited);
        assert_eq!(inventory.max_actual(mid(2)).unwrap(), Some(1));
        assert_eq!(inventory.missing_materials(), vec![mid(1)]);
        assert!(!inventory.is_complete());

        // The engine never clamps, even in strict mode.
        assert_eq!(inventory.get_quantities(mid(2)).unwrap().actual, 2);
    }

    #[test]
    fn errors_are_looked_up_per_material() {
        let (mut inventory, _changes) = open(vec![counted(1, 3)], vec![], InventoryOptions::default());
        assert_eq!(inventory.get_error(mid(1)), None);

        inventory.set_errors(vec![MaterialError {
            id: mid(1),
            message: "quantity exceeds the awaited quantity".to_string(),
        }]);

        assert_eq!(
            inventory.get_error(mid(1)),
            Some("quantity exceeds the awaited quantity")
        );
        inventory.set_errors(Vec::new());
        assert_eq!(inventory.get_error(mid(1)), None);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Scan(u64),
            Toggle(u64, UnitToggle),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            let toggle = prop_oneof![
                Just(UnitToggle::MarkFound),
                Just(UnitToggle::MarkLost),
                Just(UnitToggle::MarkBroken),
                Just(UnitToggle::MarkRepaired),
            ];
            prop_oneof![
                (70u64..74).prop_map(Op::Scan),
                (70u64..74, toggle).prop_map(|(u, t)| Op::Toggle(u, t)),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 300,
                ..ProptestConfig::default()
            })]

            /// Property: counts stay equal to what the unit flags say.
            #[test]
            fn counts_track_unit_flags(ops in proptest::collection::vec(op_strategy(), 0..40)) {
                let (mut inventory, _changes) =
                    open(vec![unitary(7, &[70, 71, 72])], vec![], InventoryOptions::default());

                for op in ops {
                    match op {
                        Op::Scan(u) => { inventory.handle_scan(Some(mid(7)), Some(uid(u))).unwrap(); }
                        Op::Toggle(u, t) => { inventory.toggle_unit(mid(7), uid(u), t).unwrap(); }
                    }
                    let q = inventory.get_quantities(mid(7)).unwrap();
                    let present = q.units.iter().filter(|u| !u.is_lost).count() as u32;
                    let broken = q.units.iter().filter(|u| u.is_broken).count() as u32;
                    prop_assert_eq!(q.actual, present);
                    prop_assert_eq!(q.broken, broken);
                    prop_assert!(q.units.iter().all(|u| !(u.is_lost && u.is_broken)));
                }
            }

            /// Property: nothing mutates a fully locked inventory.
            #[test]
            fn locked_inventory_never_changes(ops in proptest::collection::vec(op_strategy(), 0..20)) {
                let (mut inventory, changes) =
                    open(vec![unitary(7, &[70, 71, 72])], vec![], locked(Locked::All));
                let before = inventory.get_quantities(mid(7)).unwrap();

                for op in ops {
                    match op {
                        Op::Scan(u) => { inventory.handle_scan(Some(mid(7)), Some(uid(u))).unwrap(); }
                        Op::Toggle(u, t) => { inventory.toggle_unit(mid(7), uid(u), t).unwrap(); }
                    }
                }

                prop_assert_eq!(inventory.get_quantities(mid(7)).unwrap(), before);
                prop_assert!(changes.try_recv().is_err());
            }
        }
    }
}
