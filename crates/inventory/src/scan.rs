//! Barcode scan glue: injected scan stream → [`Inventory::handle_scan`].

use serde::{Deserialize, Serialize};

use rentkit_core::{DomainResult, MaterialId, UnitId};
use rentkit_events::{EventBus, Subscription};

use crate::inventory::{Inventory, InventoryEvent, ScanOutcome};

/// Raw code read by a scanner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanCode(pub String);

impl ScanCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A code decoded into the unit it designates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedUnit {
    pub material_id: MaterialId,
    pub unit_id: UnitId,
}

/// Turns a raw code into a unit reference; `None` for codes that designate no unit.
pub trait ScanDecoder {
    fn decode(&self, code: &ScanCode) -> Option<ScannedUnit>;
}

impl<F> ScanDecoder for F
where
    F: Fn(&ScanCode) -> Option<ScannedUnit>,
{
    fn decode(&self, code: &ScanCode) -> Option<ScannedUnit> {
        self(code)
    }
}

/// Forwards decoded scans from a subscribed stream to an inventory.
#[derive(Debug)]
pub struct ScanResolver<D> {
    decoder: D,
    subscription: Option<Subscription<ScanCode>>,
}

impl<D: ScanDecoder> ScanResolver<D> {
    pub fn subscribe<S>(source: &S, decoder: D) -> Self
    where
        S: EventBus<ScanCode> + ?Sized,
    {
        Self {
            decoder,
            subscription: Some(source.subscribe()),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Stop listening. Safe to call any number of times.
    pub fn unsubscribe(&mut self) {
        if self.subscription.take().is_some() {
            tracing::debug!("scan listener unsubscribed");
        }
    }

    /// Feed every queued code to `inventory`, in arrival order.
    ///
    /// Codes that fail to decode are skipped. Returns nothing once unsubscribed.
    pub fn pump<B>(&self, inventory: &mut Inventory<B>) -> DomainResult<Vec<ScanOutcome>>
    where
        B: EventBus<InventoryEvent>,
    {
        let Some(subscription) = &self.subscription else {
            return Ok(Vec::new());
        };
        subscription
            .drain()
            .map(|code| self.resolve(&code, inventory))
            .collect()
    }

    /// Decode one code and hand it to `inventory`.
    pub fn resolve<B>(&self, code: &ScanCode, inventory: &mut Inventory<B>) -> DomainResult<ScanOutcome>
    where
        B: EventBus<InventoryEvent>,
    {
        match self.decoder.decode(code) {
            Some(scanned) => inventory.handle_scan(Some(scanned.material_id), Some(scanned.unit_id)),
            None => {
                tracing::debug!(code = code.as_str(), "scan code not recognized");
                Ok(ScanOutcome::Ignored)
            }
        }
    }
}
