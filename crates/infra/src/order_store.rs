use std::collections::HashMap;
use std::sync::RwLock;

use farmgate_core::{AggregateRoot, DomainError, ExpectedVersion, OrderId};
use farmgate_orders::{Order, OrderStore, RepositoryError};

/// In-memory order store. Intended for tests, simulations and dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite without a version check (seeding).
    pub fn insert(&self, order: Order) -> Result<(), RepositoryError> {
        self.save(&order, ExpectedVersion::Any)
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OrderStore for InMemoryOrderStore {
    fn load(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self
            .orders
            .read()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(orders.get(&order_id).cloned())
    }

    fn save(&self, order: &Order, expected: ExpectedVersion) -> Result<(), RepositoryError> {
        let mut orders = self
            .orders
            .write()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;

        if let ExpectedVersion::Exact(_) = expected {
            let stored = orders
                .get(order.id())
                .map(|o| o.version())
                .ok_or(RepositoryError::Conflict(DomainError::NotFound))?;
            expected.check(stored).map_err(RepositoryError::Conflict)?;
        }

        orders.insert(*order.id(), order.clone());
        Ok(())
    }
}
