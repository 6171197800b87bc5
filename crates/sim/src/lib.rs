//! Concurrent checkout simulation.
//!
//! Seeds one hub, one open order cycle and a single scarce variant, then lets
//! a crowd of customers race for it from their own threads. Each customer
//! also has a second "tab" updating the same order from the same stale view.

use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Serialize;

use farmgate_auth::{Actor, Principal};
use farmgate_checkout::{CheckoutLockCoordinator, CheckoutStores, CoordinatorConfig, UpdateError, UpdateRequest};
use farmgate_core::{DistributorId, Money, OrderCycleId, OrderId, UserId, VariantId};
use farmgate_events::{EventBus, EventEnvelope, InMemoryEventBus};
use farmgate_inventory::StockLedger;
use farmgate_infra::{InMemoryHubDirectory, InMemoryOrderCycleCalendar, InMemoryOrderStore, InMemoryStockLedger};
use farmgate_orders::{CheckoutEvent, Distributor, Order, OrderCycleWindow, OrderStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub customers: usize,
    pub stock: i64,
    pub quantity: u32,
    pub coordinator: CoordinatorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            customers: 16,
            stock: 40,
            quantity: 3,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl SimConfig {
    /// Defaults overridden by `SIM_CUSTOMERS`, `SIM_STOCK` and `SIM_QUANTITY`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            coordinator: CoordinatorConfig::from_env(),
            ..Self::default()
        };
        if let Ok(raw) = std::env::var("SIM_CUSTOMERS") {
            config.customers = raw.parse().with_context(|| format!("SIM_CUSTOMERS={raw}"))?;
        }
        if let Ok(raw) = std::env::var("SIM_STOCK") {
            config.stock = raw.parse().with_context(|| format!("SIM_STOCK={raw}"))?;
        }
        if let Ok(raw) = std::env::var("SIM_QUANTITY") {
            config.quantity = raw.parse().with_context(|| format!("SIM_QUANTITY={raw}"))?;
        }
        Ok(config)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SimReport {
    pub updates: usize,
    pub committed: usize,
    /// Failures by kind (`insufficient`, `lock_timeout`, ...).
    pub rejected: BTreeMap<String, usize>,
    pub events: usize,
    pub stock_on_hand: i64,
    pub stock_available: i64,
    pub held_by_orders: i64,
}

impl SimReport {
    /// Every unit is either still available or held by exactly one order line.
    pub fn consistent(&self) -> bool {
        self.stock_available >= 0 && self.stock_available + self.held_by_orders == self.stock_on_hand
    }
}

pub fn run(config: &SimConfig) -> Result<SimReport> {
    let now = Utc::now();
    let hub = DistributorId::new();
    let cycle = OrderCycleId::new();
    let variant = VariantId::new();

    let ledger = Arc::new(InMemoryStockLedger::new());
    ledger.set_on_hand(variant, config.stock)?;

    let hubs = Arc::new(InMemoryHubDirectory::new());
    hubs.upsert(Distributor::ready(hub))?;

    let calendar = Arc::new(InMemoryOrderCycleCalendar::new());
    calendar.upsert(
        OrderCycleWindow::new(cycle, now - Duration::hours(1), now + Duration::hours(1))
            .with_distributor(hub)
            .with_variant(variant, Money::from_minor(650)),
    )?;

    let orders = Arc::new(InMemoryOrderStore::new());
    let customers: Vec<(UserId, OrderId)> = (0..config.customers)
        .map(|_| {
            let owner = UserId::new();
            let order_id = OrderId::new();
            orders
                .insert(
                    Order::new(order_id)
                        .with_distributor(hub)
                        .with_order_cycle(cycle)
                        .owned_by(owner),
                )
                .map(|_| (owner, order_id))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let bus = Arc::new(InMemoryEventBus::<EventEnvelope<CheckoutEvent>>::new());
    let events = bus.subscribe();
    let stores = CheckoutStores {
        orders: orders.clone(),
        ledger: ledger.clone(),
        hubs,
        calendar,
    };
    let coordinator = Arc::new(CheckoutLockCoordinator::new(config.coordinator, stores, bus));

    let start = Arc::new(Barrier::new(config.customers * 2));
    let mut handles = Vec::with_capacity(config.customers * 2);
    for (owner, order_id) in &customers {
        let base = orders
            .load(*order_id)?
            .context("seeded order vanished")?
            .snapshot()?;
        for _tab in 0..2 {
            let coordinator = coordinator.clone();
            let start = start.clone();
            let request = UpdateRequest::new(Actor::user(Principal::customer(*owner)))
                .with_line(variant, config.quantity)
                .with_base(base.clone());
            let order_id = *order_id;
            handles.push(thread::spawn(move || {
                start.wait();
                coordinator.update(order_id, &request)
            }));
        }
    }

    let mut report = SimReport::default();
    for handle in handles {
        let result = handle
            .join()
            .map_err(|_| anyhow::anyhow!("customer thread panicked"))?;
        report.updates += 1;
        match result {
            Ok(_) => report.committed += 1,
            Err(e) => *report.rejected.entry(rejection_kind(&e).to_string()).or_insert(0) += 1,
        }
    }

    report.events = std::iter::from_fn(|| events.try_recv().ok()).count();
    let entry = ledger.entry(variant)?.context("variant missing from ledger")?;
    report.stock_on_hand = entry.on_hand;
    report.stock_available = entry.available();
    for (_, order_id) in &customers {
        let order = orders.load(*order_id)?.context("order vanished")?;
        report.held_by_orders += i64::from(order.quantity_of(variant));
    }

    tracing::info!(
        committed = report.committed,
        available = report.stock_available,
        "simulation finished"
    );
    Ok(report)
}

fn rejection_kind(error: &UpdateError) -> &'static str {
    match error {
        UpdateError::Insufficient(_) => "insufficient",
        UpdateError::LockTimeout { .. } => "lock_timeout",
        UpdateError::Validation(_) => "validation",
        UpdateError::Unauthorized => "unauthorized",
        UpdateError::InvalidRequest(_) => "invalid_request",
        UpdateError::Store(_) => "store",
    }
}
