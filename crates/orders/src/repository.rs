//! Read/write seams the checkout coordinator works through.

use chrono::{DateTime, Utc};
use thiserror::Error;

use farmgate_core::{DistributorId, DomainError, ExpectedVersion, OrderCycleId, OrderId, VariantId};

use crate::{Distributor, Order, OrderCycleWindow};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The write was computed from a stale read.
    #[error("conflict: {0}")]
    Conflict(DomainError),

    /// The backing store could not be read or written (e.g. poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Authoritative order storage.
pub trait OrderStore: Send + Sync {
    fn load(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Persist `order`, provided the stored copy is still at `expected`.
    fn save(&self, order: &Order, expected: ExpectedVersion) -> Result<(), RepositoryError>;
}

/// Distributor lookup.
pub trait HubDirectory: Send + Sync {
    fn distributor(&self, distributor_id: DistributorId) -> Result<Option<Distributor>, RepositoryError>;

    /// Unknown hubs are never ready.
    fn hub_ready(&self, distributor_id: DistributorId) -> Result<bool, RepositoryError> {
        Ok(self
            .distributor(distributor_id)?
            .is_some_and(|d| d.ready_for_checkout))
    }
}

/// Snapshot reads of order-cycle windows.
pub trait OrderCycleCalendar: Send + Sync {
    fn window(&self, order_cycle_id: OrderCycleId) -> Result<Option<OrderCycleWindow>, RepositoryError>;

    /// Unknown cycles are never open.
    fn is_open(&self, order_cycle_id: OrderCycleId, now: DateTime<Utc>) -> Result<bool, RepositoryError> {
        Ok(self.window(order_cycle_id)?.is_some_and(|w| w.is_open(now)))
    }

    fn distributes_variants(
        &self,
        order_cycle_id: OrderCycleId,
        distributor_id: DistributorId,
        variants: &[VariantId],
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .window(order_cycle_id)?
            .is_some_and(|w| w.distributes_variants(distributor_id, variants)))
    }
}
