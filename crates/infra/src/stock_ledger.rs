use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use farmgate_core::VariantId;
use farmgate_inventory::{
    insufficient_variants, plan_commit, QuantityChange, StockEntry, StockError, StockLedger,
};

/// In-memory stock ledger.
///
/// The write lock is held across plan and apply, so a commit is atomic with
/// respect to every other ledger call.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    entries: RwLock<HashMap<VariantId, StockEntry>>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace the on-hand count of a variant with nothing committed.
    pub fn set_on_hand(&self, variant_id: VariantId, on_hand: i64) -> Result<(), StockError> {
        if on_hand < 0 {
            return Err(StockError::NegativeOnHand { variant_id, on_hand });
        }
        let mut entries = self.write()?;
        entries.insert(variant_id, StockEntry::with_on_hand(variant_id, on_hand));
        Ok(())
    }

    pub fn available(&self, variant_id: VariantId) -> Result<i64, StockError> {
        Ok(self.entry(variant_id)?.map(|e| e.available()).unwrap_or(0))
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<VariantId, StockEntry>>, StockError> {
        self.entries
            .read()
            .map_err(|_| StockError::Unavailable("lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<VariantId, StockEntry>>, StockError> {
        self.entries
            .write()
            .map_err(|_| StockError::Unavailable("lock poisoned".to_string()))
    }
}

impl StockLedger for InMemoryStockLedger {
    fn check_insufficient_stock(
        &self,
        changes: &[QuantityChange],
    ) -> Result<BTreeSet<VariantId>, StockError> {
        let entries = self.read()?;
        Ok(insufficient_variants(|v| entries.get(&v).copied(), changes))
    }

    fn commit(&self, changes: &[QuantityChange]) -> Result<(), StockError> {
        let mut entries = self.write()?;
        let planned = plan_commit(|v| entries.get(&v).copied(), changes)?;
        for next in planned {
            tracing::debug!(
                variant_id = %next.variant_id,
                committed = next.committed,
                available = next.available(),
                "stock committed"
            );
            entries.insert(next.variant_id, next);
        }
        Ok(())
    }

    fn adjust_on_hand(&self, variant_id: VariantId, delta: i64) -> Result<StockEntry, StockError> {
        let mut entries = self.write()?;
        let current = entries
            .get(&variant_id)
            .copied()
            .unwrap_or_else(|| StockEntry::empty(variant_id));

        let on_hand = current.on_hand + delta;
        if on_hand < 0 {
            return Err(StockError::NegativeOnHand { variant_id, on_hand });
        }

        let next = StockEntry { on_hand, ..current };
        if next.available() < 0 {
            tracing::warn!(
                variant_id = %variant_id,
                available = next.available(),
                "on-hand adjustment left variant over-committed"
            );
        }
        entries.insert(variant_id, next);
        Ok(next)
    }

    fn entry(&self, variant_id: VariantId) -> Result<Option<StockEntry>, StockError> {
        Ok(self.read()?.get(&variant_id).copied())
    }
}
