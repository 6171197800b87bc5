use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use farmgate_auth::{AccessToken, OrderAccess};
use farmgate_core::{
    AggregateRoot, DistributorId, DomainError, DomainResult, Money, OrderCycleId, OrderId, UserId,
    VariantId,
};
use farmgate_inventory::QuantityChange;

/// One line of an order. An order holds at most one line per variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub variant_id: VariantId,
    pub quantity: u32,
    /// Price in smallest currency unit, fixed when the line was added.
    pub unit_price: Money,
}

impl LineItem {
    pub fn total(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// Requested new quantity for a variant. Zero removes the line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(variant_id: VariantId, quantity: u32) -> Self {
        Self {
            variant_id,
            quantity,
        }
    }

    pub fn remove(variant_id: VariantId) -> Self {
        Self::new(variant_id, 0)
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    version: u64,
    items: Vec<LineItem>,
    completed: bool,
    checkout_allowed: bool,
    distributor_id: Option<DistributorId>,
    order_cycle_id: Option<OrderCycleId>,
    owner: Option<UserId>,
    access_token: Option<AccessToken>,
}

impl Order {
    /// A fresh cart: no lines, checkout allowed, no hub or cycle chosen yet.
    pub fn new(id: OrderId) -> Self {
        Self {
            id,
            version: 0,
            items: Vec::new(),
            completed: false,
            checkout_allowed: true,
            distributor_id: None,
            order_cycle_id: None,
            owner: None,
            access_token: None,
        }
    }

    pub fn with_distributor(mut self, distributor_id: DistributorId) -> Self {
        self.distributor_id = Some(distributor_id);
        self
    }

    pub fn with_order_cycle(mut self, order_cycle_id: OrderCycleId) -> Self {
        self.order_cycle_id = Some(order_cycle_id);
        self
    }

    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.owner = Some(user_id);
        self
    }

    pub fn with_access_token(mut self, token: AccessToken) -> Self {
        self.access_token = Some(token);
        self
    }

    /// Add a line while building an order. Replaces an existing line for the
    /// same variant.
    pub fn with_line(mut self, variant_id: VariantId, quantity: u32, unit_price: Money) -> Self {
        self.items.retain(|l| l.variant_id != variant_id);
        if quantity > 0 {
            self.items.push(LineItem {
                variant_id,
                quantity,
                unit_price,
            });
        }
        self
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_checkout_allowed(&self) -> bool {
        self.checkout_allowed
    }

    pub fn distributor_id(&self) -> Option<DistributorId> {
        self.distributor_id
    }

    pub fn order_cycle_id(&self) -> Option<OrderCycleId> {
        self.order_cycle_id
    }

    pub fn access(&self) -> OrderAccess {
        OrderAccess {
            owner: self.owner,
            token: self.access_token.clone(),
        }
    }

    pub fn line(&self, variant_id: VariantId) -> Option<&LineItem> {
        self.items.iter().find(|l| l.variant_id == variant_id)
    }

    pub fn quantity_of(&self, variant_id: VariantId) -> u32 {
        self.line(variant_id).map(|l| l.quantity).unwrap_or(0)
    }

    pub fn set_checkout_allowed(&mut self, allowed: bool) {
        self.checkout_allowed = allowed;
        self.version += 1;
    }

    pub fn complete(&mut self) -> DomainResult<()> {
        if self.completed {
            return Err(DomainError::invariant("order already completed"));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("cannot complete an empty order"));
        }
        self.completed = true;
        self.version += 1;
        Ok(())
    }

    /// The order's current lines as no-op changes, for re-validating what the
    /// order already holds.
    pub fn unchanged_lines(&self) -> Vec<QuantityChange> {
        self.items
            .iter()
            .map(|l| QuantityChange::unchanged(l.variant_id, l.quantity))
            .collect()
    }

    /// Translate requested quantities into changes against the current lines.
    ///
    /// Without a `base`, requested quantities are absolute. With a `base` taken
    /// at an older version, each request is rebased onto the current state as
    /// `current + (requested - seen)` so a concurrent change is not silently
    /// overwritten. Unlisted variants keep their quantity.
    pub fn proposed_changes(
        &self,
        requests: &[LineRequest],
        base: Option<&OrderSnapshot>,
    ) -> DomainResult<Vec<QuantityChange>> {
        let mut seen_variants = BTreeSet::new();
        for r in requests {
            if !seen_variants.insert(r.variant_id) {
                return Err(DomainError::validation(format!(
                    "variant {} requested more than once",
                    r.variant_id
                )));
            }
        }

        let stale_base = match base {
            Some(snapshot) if snapshot.order_id != self.id => {
                return Err(DomainError::validation("base snapshot belongs to another order"));
            }
            Some(snapshot) if snapshot.version != self.version => Some(snapshot),
            _ => None,
        };

        let changes = requests
            .iter()
            .map(|r| {
                let current = self.quantity_of(r.variant_id);
                let target = match stale_base {
                    Some(snapshot) => {
                        let seen = i64::from(snapshot.quantity_of(r.variant_id));
                        let rebased = i64::from(current) + i64::from(r.quantity) - seen;
                        u32::try_from(rebased.max(0)).unwrap_or(u32::MAX)
                    }
                    None => r.quantity,
                };
                QuantityChange::new(r.variant_id, current, target)
            })
            .collect();

        Ok(changes)
    }

    /// Apply changes to the lines. New lines are priced with `price_of`.
    ///
    /// Returns whether anything changed; the version is bumped only then.
    pub fn apply_changes<F>(&mut self, changes: &[QuantityChange], price_of: F) -> DomainResult<bool>
    where
        F: Fn(VariantId) -> Option<Money>,
    {
        let mut next = self.items.clone();
        let mut changed = false;

        for change in changes {
            let current = next.iter().position(|l| l.variant_id == change.variant_id);
            match (current, change.requested) {
                (Some(idx), 0) => {
                    next.remove(idx);
                    changed = true;
                }
                (Some(idx), qty) => {
                    if next[idx].quantity != qty {
                        next[idx].quantity = qty;
                        changed = true;
                    }
                }
                (None, 0) => {}
                (None, qty) => {
                    let unit_price = price_of(change.variant_id).ok_or_else(|| {
                        DomainError::validation(format!("no price for variant {}", change.variant_id))
                    })?;
                    next.push(LineItem {
                        variant_id: change.variant_id,
                        quantity: qty,
                        unit_price,
                    });
                    changed = true;
                }
            }
        }

        if changed {
            self.items = next;
            self.version += 1;
        }
        Ok(changed)
    }

    pub fn item_total(&self) -> DomainResult<Money> {
        self.items
            .iter()
            .try_fold(Money::ZERO, |acc, l| acc.checked_add(l.total()?))
    }

    pub fn snapshot(&self) -> DomainResult<OrderSnapshot> {
        let lines = self
            .items
            .iter()
            .map(|l| {
                Ok(SnapshotLine {
                    variant_id: l.variant_id,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    total: l.total()?,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(OrderSnapshot {
            order_id: self.id,
            version: self.version,
            lines,
            item_total: self.item_total()?,
            completed: self.completed,
            checkout_allowed: self.checkout_allowed,
            distributor_id: self.distributor_id,
            order_cycle_id: self.order_cycle_id,
        })
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
}

/// Read-only view of an order handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub version: u64,
    pub lines: Vec<SnapshotLine>,
    pub item_total: Money,
    pub completed: bool,
    pub checkout_allowed: bool,
    pub distributor_id: Option<DistributorId>,
    pub order_cycle_id: Option<OrderCycleId>,
}

impl OrderSnapshot {
    pub fn quantity_of(&self, variant_id: VariantId) -> u32 {
        self.lines
            .iter()
            .find(|l| l.variant_id == variant_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }
}
