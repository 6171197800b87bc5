//! Checkout events and the pub/sub mechanics that carry them.
//!
//! Events are published only after the state they describe has been persisted;
//! the order store stays the source of truth.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
