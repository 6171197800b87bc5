use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use farmgate_core::VariantId;

/// Stock position of one variant.
///
/// `committed` is the quantity held by order lines. `available` may dip below
/// zero after an on-hand shrinkage; lines touching such a variant then fail
/// validation until quantities are reduced.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub variant_id: VariantId,
    pub on_hand: i64,
    pub committed: i64,
}

impl StockEntry {
    pub fn empty(variant_id: VariantId) -> Self {
        Self {
            variant_id,
            on_hand: 0,
            committed: 0,
        }
    }

    pub fn with_on_hand(variant_id: VariantId, on_hand: i64) -> Self {
        Self {
            variant_id,
            on_hand,
            committed: 0,
        }
    }

    pub fn available(&self) -> i64 {
        self.on_hand - self.committed
    }
}

/// A line's quantity moving from what the order currently holds (`committed`)
/// to what the caller asks for (`requested`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChange {
    pub variant_id: VariantId,
    pub committed: u32,
    pub requested: u32,
}

impl QuantityChange {
    pub fn new(variant_id: VariantId, committed: u32, requested: u32) -> Self {
        Self {
            variant_id,
            committed,
            requested,
        }
    }

    /// A line that stays as it is (used to re-check an order's current lines).
    pub fn unchanged(variant_id: VariantId, quantity: u32) -> Self {
        Self::new(variant_id, quantity, quantity)
    }

    pub fn delta(&self) -> i64 {
        i64::from(self.requested) - i64::from(self.committed)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("insufficient stock for {} variant(s)", .0.len())]
    Insufficient(BTreeSet<VariantId>),

    #[error("on-hand quantity for {variant_id} cannot go negative (would be {on_hand})")]
    NegativeOnHand { variant_id: VariantId, on_hand: i64 },

    #[error("committed quantity for {0} would go negative")]
    Inconsistent(VariantId),

    #[error("stock ledger unavailable: {0}")]
    Unavailable(String),
}

/// Shared per-variant stock ledger.
///
/// `commit` must only be called while the lock of the order whose lines are
/// changing is held.
pub trait StockLedger: Send + Sync {
    /// Variants whose requested quantity exceeds availability. No side effects.
    fn check_insufficient_stock(
        &self,
        changes: &[QuantityChange],
    ) -> Result<BTreeSet<VariantId>, StockError>;

    /// Apply every change or none of them.
    fn commit(&self, changes: &[QuantityChange]) -> Result<(), StockError>;

    /// Restock (positive) or shrinkage (negative) of the physical on-hand count.
    fn adjust_on_hand(&self, variant_id: VariantId, delta: i64) -> Result<StockEntry, StockError>;

    /// Restock: add `quantity` to the on-hand count.
    fn receive(&self, variant_id: VariantId, quantity: u32) -> Result<StockEntry, StockError> {
        self.adjust_on_hand(variant_id, i64::from(quantity))
    }

    fn entry(&self, variant_id: VariantId) -> Result<Option<StockEntry>, StockError>;
}

/// Net delta per variant; several changes for one variant are summed.
fn net_deltas(changes: &[QuantityChange]) -> BTreeMap<VariantId, i64> {
    let mut deltas = BTreeMap::new();
    for change in changes {
        *deltas.entry(change.variant_id).or_insert(0) += change.delta();
    }
    deltas
}

/// Variants that would be left with negative availability if `changes` were
/// applied. Decreasing a line never makes it insufficient on its own, but an
/// unchanged line over an already over-committed variant does.
pub fn insufficient_variants<F>(lookup: F, changes: &[QuantityChange]) -> BTreeSet<VariantId>
where
    F: Fn(VariantId) -> Option<StockEntry>,
{
    net_deltas(changes)
        .into_iter()
        .filter(|(variant_id, delta)| {
            let entry = lookup(*variant_id).unwrap_or_else(|| StockEntry::empty(*variant_id));
            entry.available() - delta < 0
        })
        .map(|(variant_id, _)| variant_id)
        .collect()
}

/// Compute the entries that result from applying `changes`.
///
/// Fails with `Insufficient` naming every variant whose usage grows past
/// availability. Variants whose usage shrinks are always accepted. Variants with
/// a zero net delta are not returned.
pub fn plan_commit<F>(lookup: F, changes: &[QuantityChange]) -> Result<Vec<StockEntry>, StockError>
where
    F: Fn(VariantId) -> Option<StockEntry>,
{
    let mut insufficient = BTreeSet::new();
    let mut planned = Vec::new();

    for (variant_id, delta) in net_deltas(changes) {
        if delta == 0 {
            continue;
        }
        let current = lookup(variant_id).unwrap_or_else(|| StockEntry::empty(variant_id));
        let next = StockEntry {
            committed: current.committed + delta,
            ..current
        };
        if next.committed < 0 {
            return Err(StockError::Inconsistent(variant_id));
        }
        if delta > 0 && next.available() < 0 {
            insufficient.insert(variant_id);
            continue;
        }
        planned.push(next);
    }

    if insufficient.is_empty() {
        Ok(planned)
    } else {
        Err(StockError::Insufficient(insufficient))
    }
}
