//! In-memory hub directory and order-cycle calendar.

use std::collections::HashMap;
use std::sync::RwLock;

use farmgate_core::{DistributorId, OrderCycleId};
use farmgate_orders::{Distributor, HubDirectory, OrderCycleCalendar, OrderCycleWindow, RepositoryError};

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryHubDirectory {
    hubs: RwLock<HashMap<DistributorId, Distributor>>,
}

impl InMemoryHubDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, distributor: Distributor) -> Result<(), RepositoryError> {
        self.hubs.write().map_err(|_| poisoned())?.insert(distributor.id, distributor);
        Ok(())
    }
}

impl HubDirectory for InMemoryHubDirectory {
    fn distributor(&self, distributor_id: DistributorId) -> Result<Option<Distributor>, RepositoryError> {
        Ok(self.hubs.read().map_err(|_| poisoned())?.get(&distributor_id).cloned())
    }
}

/// Windows are replaced wholesale by `upsert`; readers always see a complete
/// window.
#[derive(Debug, Default)]
pub struct InMemoryOrderCycleCalendar {
    windows: RwLock<HashMap<OrderCycleId, OrderCycleWindow>>,
}

impl InMemoryOrderCycleCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, window: OrderCycleWindow) -> Result<(), RepositoryError> {
        self.windows.write().map_err(|_| poisoned())?.insert(window.id, window);
        Ok(())
    }
}

impl OrderCycleCalendar for InMemoryOrderCycleCalendar {
    fn window(&self, order_cycle_id: OrderCycleId) -> Result<Option<OrderCycleWindow>, RepositoryError> {
        Ok(self.windows.read().map_err(|_| poisoned())?.get(&order_cycle_id).cloned())
    }
}
