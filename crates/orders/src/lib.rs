//! Orders domain module: orders, line items, order-cycle windows and hubs.
//!
//! Deterministic domain logic plus the repository traits the checkout
//! coordinator reads and writes through. Implementations live in
//! `farmgate-infra`.

pub mod event;
pub mod order;
pub mod order_cycle;
pub mod repository;

pub use event::{CheckoutEvent, LinesCommitted};
pub use order::{LineItem, LineRequest, Order, OrderSnapshot, SnapshotLine};
pub use order_cycle::{Distributor, OrderCycleWindow};
pub use repository::{HubDirectory, OrderCycleCalendar, OrderStore, RepositoryError};
