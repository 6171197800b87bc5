use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmgate_core::{DistributorId, Money, OrderCycleId, VariantId};

/// A distributor (hub) that orders are placed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distributor {
    pub id: DistributorId,
    /// Whether the hub currently accepts checkouts (payment and shipping set up).
    pub ready_for_checkout: bool,
    /// Whether customers may change orders after completing them.
    pub allow_order_changes: bool,
}

impl Distributor {
    pub fn ready(id: DistributorId) -> Self {
        Self {
            id,
            ready_for_checkout: true,
            allow_order_changes: false,
        }
    }
}

/// A scheduled selling window: which hubs sell which variants, at what price,
/// between `opens_at` and `closes_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCycleWindow {
    pub id: OrderCycleId,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub distributors: BTreeSet<DistributorId>,
    pub variants: BTreeMap<VariantId, Money>,
}

impl OrderCycleWindow {
    pub fn new(id: OrderCycleId, opens_at: DateTime<Utc>, closes_at: DateTime<Utc>) -> Self {
        Self {
            id,
            opens_at,
            closes_at,
            distributors: BTreeSet::new(),
            variants: BTreeMap::new(),
        }
    }

    pub fn with_distributor(mut self, distributor_id: DistributorId) -> Self {
        self.distributors.insert(distributor_id);
        self
    }

    pub fn with_variant(mut self, variant_id: VariantId, unit_price: Money) -> Self {
        self.variants.insert(variant_id, unit_price);
        self
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.opens_at <= now && now < self.closes_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.closes_at
    }

    /// True iff `distributor_id` sells in this cycle and every variant is
    /// permitted. An empty item list is trivially distributed.
    pub fn distributes_variants<'a>(
        &self,
        distributor_id: DistributorId,
        variants: impl IntoIterator<Item = &'a VariantId>,
    ) -> bool {
        self.distributors.contains(&distributor_id)
            && variants.into_iter().all(|v| self.variants.contains_key(v))
    }

    pub fn price_of(&self, variant_id: VariantId) -> Option<Money> {
        self.variants.get(&variant_id).copied()
    }
}
