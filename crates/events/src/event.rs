use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are immutable snapshots of what changed; consumers never receive a
/// reference into the aggregate that produced them.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "inventory.quantities.changed").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
