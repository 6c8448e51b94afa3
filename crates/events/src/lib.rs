//! Event plumbing shared by the reconciliation stores.
//!
//! - [`Event`]: facts emitted by aggregates.
//! - [`EventBus`]/[`Subscription`]: synchronous fan-out used both for upward
//!   change emission and for injected scan streams.
//! - [`execute`]: decide + apply in one step.

pub mod bus;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
