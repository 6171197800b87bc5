//! Infrastructure layer: in-memory implementations of the checkout
//! repositories and the stock ledger.
//!
//! Every store guards its map with a `std::sync::RwLock`; poisoned locks are
//! reported as errors rather than unwrapped.

pub mod catalog;
pub mod order_store;
pub mod stock_ledger;

pub use catalog::{InMemoryHubDirectory, InMemoryOrderCycleCalendar};
pub use order_store::InMemoryOrderStore;
pub use stock_ledger::InMemoryStockLedger;
