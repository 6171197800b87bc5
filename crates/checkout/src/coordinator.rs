//! Guarded checkout operations.
//!
//! Every operation that reads an order to decide on a write, or writes its
//! lines, runs under that order's lock:
//!
//! ```text
//! acquire(order) ─▶ load current order ─▶ gate ─▶ ledger.commit ─▶ save ─▶ release
//!                                                                    │
//!                                                                    └─▶ publish
//! ```
//!
//! A rejection at any step before `save` leaves the ledger and the stored
//! order untouched. A failed `save` after a successful commit is compensated
//! by committing the inverse changes, still under the same lock.

use std::sync::Arc;

use farmgate_auth::Actor;
use farmgate_core::{AggregateRoot, Clock, ExpectedVersion, OrderId, RequestId, SystemClock, VariantId};
use farmgate_events::{EventBus, EventEnvelope};
use farmgate_inventory::{QuantityChange, StockLedger};
use farmgate_orders::{
    CheckoutEvent, HubDirectory, LineRequest, LinesCommitted, Order, OrderCycleCalendar, OrderSnapshot,
    OrderStore,
};

use crate::config::CoordinatorConfig;
use crate::gate::{Check, GateSubject, GateVerdict, OrderGate, RejectReason, AMENDMENT_CHAIN, CHECKOUT_CHAIN};
use crate::lock::{LockError, OrderLockRegistry};
use crate::outcome::{CheckoutOutcome, UpdateError};

/// The stores a coordinator reads and writes through.
#[derive(Clone)]
pub struct CheckoutStores {
    pub orders: Arc<dyn OrderStore>,
    pub ledger: Arc<dyn StockLedger>,
    pub hubs: Arc<dyn HubDirectory>,
    pub calendar: Arc<dyn OrderCycleCalendar>,
}

/// A request to change an order's lines.
///
/// Quantities are absolute (`0` removes the line); variants not listed keep
/// their current quantity. When `base` is the snapshot the caller last read and
/// the order has moved on since, quantities are rebased onto the current order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub request_id: RequestId,
    pub actor: Actor,
    pub lines: Vec<LineRequest>,
    pub base: Option<OrderSnapshot>,
}

impl UpdateRequest {
    pub fn new(actor: Actor) -> Self {
        Self {
            request_id: RequestId::new(),
            actor,
            lines: Vec::new(),
            base: None,
        }
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_line(mut self, variant_id: VariantId, quantity: u32) -> Self {
        self.lines.push(LineRequest::new(variant_id, quantity));
        self
    }

    pub fn without_line(mut self, variant_id: VariantId) -> Self {
        self.lines.push(LineRequest::remove(variant_id));
        self
    }

    pub fn with_base(mut self, base: OrderSnapshot) -> Self {
        self.base = Some(base);
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum EditKind {
    Checkout,
    Amendment,
}

impl EditKind {
    fn chain(self) -> &'static [Check] {
        match self {
            EditKind::Checkout => CHECKOUT_CHAIN,
            EditKind::Amendment => AMENDMENT_CHAIN,
        }
    }
}

/// Serializes every guarded operation on one order, and only on that order.
///
/// Shared between threads behind an `Arc`.
pub struct CheckoutLockCoordinator<B> {
    locks: OrderLockRegistry,
    stores: CheckoutStores,
    clock: Arc<dyn Clock>,
    bus: B,
}

impl<B> CheckoutLockCoordinator<B>
where
    B: EventBus<EventEnvelope<CheckoutEvent>>,
{
    pub fn new(config: CoordinatorConfig, stores: CheckoutStores, bus: B) -> Self {
        Self {
            locks: OrderLockRegistry::new(config.lock_timeout()),
            stores,
            clock: Arc::new(SystemClock),
            bus,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn locks(&self) -> &OrderLockRegistry {
        &self.locks
    }

    pub fn stores(&self) -> &CheckoutStores {
        &self.stores
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Run `operation` while holding the lock on `order_id`.
    ///
    /// Waits up to the configured timeout for another request to release the
    /// order. The lock is released however `operation` exits, panics included.
    /// Calls nested inside `operation` with the same `request_id`, on the same
    /// thread, re-enter.
    pub fn guard<R>(
        &self,
        order_id: OrderId,
        request_id: RequestId,
        operation: impl FnOnce() -> R,
    ) -> Result<R, LockError> {
        let span = tracing::info_span!("checkout.guard", %order_id, %request_id);
        let _entered = span.enter();

        let _token = self.locks.acquire(order_id, request_id)?;
        tracing::debug!("order lock acquired");
        Ok(operation())
    }

    /// Guarded view of the order for the checkout page.
    pub fn edit(&self, order_id: OrderId, request_id: RequestId, actor: &Actor) -> CheckoutOutcome {
        self.guard(order_id, request_id, || self.view_locked(order_id, actor))
            .map_err(UpdateError::from)
            .and_then(|viewed| viewed)
            .unwrap_or_else(CheckoutOutcome::Failed)
    }

    /// Change the lines of an order that has not been checked out yet.
    pub fn update(&self, order_id: OrderId, request: &UpdateRequest) -> Result<OrderSnapshot, UpdateError> {
        self.guard(order_id, request.request_id, || {
            self.update_locked(order_id, request, EditKind::Checkout)
        })?
    }

    /// Change the lines of a completed order, when its distributor allows
    /// changes and the order cycle is still open.
    pub fn amend(&self, order_id: OrderId, request: &UpdateRequest) -> Result<OrderSnapshot, UpdateError> {
        self.guard(order_id, request.request_id, || {
            self.update_locked(order_id, request, EditKind::Amendment)
        })?
    }

    fn gate(&self) -> OrderGate<'_> {
        OrderGate::new(
            self.stores.hubs.as_ref(),
            self.stores.calendar.as_ref(),
            self.stores.ledger.as_ref(),
            self.clock.now(),
        )
    }

    fn view_locked(&self, order_id: OrderId, actor: &Actor) -> Result<CheckoutOutcome, UpdateError> {
        let order = self.stores.orders.load(order_id)?;
        let lines = order.as_ref().map(Order::unchanged_lines).unwrap_or_default();
        let verdict = self.gate().evaluate(
            CHECKOUT_CHAIN,
            GateSubject {
                order: order.as_ref(),
                lines: &lines,
                actor,
            },
        )?;

        match (verdict, order) {
            (GateVerdict::Pass, Some(order)) => Ok(CheckoutOutcome::Proceed(order.snapshot()?)),
            (GateVerdict::Pass, None) => Ok(RejectReason::OrderUnavailable.into()),
            (GateVerdict::Reject { reason, .. }, _) => Ok(reason.into()),
        }
    }

    fn update_locked(
        &self,
        order_id: OrderId,
        request: &UpdateRequest,
        kind: EditKind,
    ) -> Result<OrderSnapshot, UpdateError> {
        let current = self.stores.orders.load(order_id)?;

        let (changes, lines) = match &current {
            Some(order) => {
                let changes = order.proposed_changes(&request.lines, request.base.as_ref())?;
                let lines = resulting_lines(order, &changes);
                (changes, lines)
            }
            None => (Vec::new(), Vec::new()),
        };

        let verdict = self.gate().evaluate(
            kind.chain(),
            GateSubject {
                order: current.as_ref(),
                lines: &lines,
                actor: &request.actor,
            },
        )?;
        match verdict {
            GateVerdict::Pass => {}
            // Stock shortfalls without a distribution problem are reported as
            // such rather than as a cart redirect.
            GateVerdict::Reject {
                reason:
                    RejectReason::InvalidLineItems {
                        insufficient,
                        undistributed,
                    },
                ..
            } if undistributed.is_empty() => return Err(UpdateError::Insufficient(insufficient)),
            GateVerdict::Reject { reason, .. } => return Err(reason.into()),
        }

        let order = current.ok_or(UpdateError::Validation(RejectReason::OrderUnavailable))?;
        let changes: Vec<QuantityChange> = changes.into_iter().filter(|c| c.delta() != 0).collect();
        if changes.is_empty() {
            tracing::debug!(%order_id, "update is a no-op");
            return Ok(order.snapshot()?);
        }

        let window = match order.order_cycle_id() {
            Some(cycle) => self.stores.calendar.window(cycle)?,
            None => None,
        };
        let mut next = order.clone();
        next.apply_changes(&changes, |variant_id| {
            window.as_ref().and_then(|w| w.price_of(variant_id))
        })?;
        let snapshot = next.snapshot()?;

        self.stores.ledger.commit(&changes)?;
        if let Err(e) = self.stores.orders.save(&next, ExpectedVersion::Exact(order.version())) {
            self.compensate(order_id, &changes);
            return Err(e.into());
        }

        tracing::info!(
            %order_id,
            request_id = %request.request_id,
            version = next.version(),
            lines = changes.len(),
            amendment = kind == EditKind::Amendment,
            "order lines committed"
        );

        let event = CheckoutEvent::LinesCommitted(LinesCommitted {
            order_id,
            changes,
            amendment: kind == EditKind::Amendment,
            occurred_at: self.clock.now(),
        });
        if let Err(e) = self.bus.publish(EventEnvelope::new(order_id, next.version(), event)) {
            tracing::warn!(%order_id, error = ?e, "failed to publish lines committed");
        }

        Ok(snapshot)
    }

    /// Undo a ledger commit whose order could not be saved.
    fn compensate(&self, order_id: OrderId, changes: &[QuantityChange]) {
        let inverse: Vec<QuantityChange> = changes
            .iter()
            .map(|c| QuantityChange::new(c.variant_id, c.requested, c.committed))
            .collect();
        if let Err(e) = self.stores.ledger.commit(&inverse) {
            tracing::error!(%order_id, error = %e, "failed to release stock after a failed save");
        }
    }
}

/// Every line the order would hold after `changes`: the changed lines plus
/// the current lines the request leaves alone.
fn resulting_lines(order: &Order, changes: &[QuantityChange]) -> Vec<QuantityChange> {
    let mut lines: Vec<QuantityChange> = order
        .unchanged_lines()
        .into_iter()
        .filter(|line| !changes.iter().any(|c| c.variant_id == line.variant_id))
        .collect();
    lines.extend_from_slice(changes);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::{Duration, Utc};

    use farmgate_auth::{AccessToken, Principal, Role};
    use farmgate_core::{DistributorId, FixedClock, Money, OrderCycleId, UserId};
    use farmgate_events::InMemoryEventBus;
    use farmgate_infra::{
        InMemoryHubDirectory, InMemoryOrderCycleCalendar, InMemoryOrderStore, InMemoryStockLedger,
    };
    use farmgate_orders::{Distributor, OrderCycleWindow, RepositoryError};

    use crate::gate::GateOutcome;

    type Bus = InMemoryEventBus<EventEnvelope<CheckoutEvent>>;

    struct Fixture {
        coordinator: CheckoutLockCoordinator<Arc<Bus>>,
        orders: Arc<InMemoryOrderStore>,
        ledger: Arc<InMemoryStockLedger>,
        hubs: Arc<InMemoryHubDirectory>,
        bus: Arc<Bus>,
        clock: Arc<FixedClock>,
        hub: DistributorId,
        cycle: OrderCycleId,
        x: VariantId,
        y: VariantId,
        owner: UserId,
    }

    impl Fixture {
        fn new() -> Self {
            let now = Utc::now();
            let hub = DistributorId::new();
            let cycle = OrderCycleId::new();
            let (x, y) = (VariantId::new(), VariantId::new());

            let orders = Arc::new(InMemoryOrderStore::new());
            let ledger = Arc::new(InMemoryStockLedger::new());
            ledger.set_on_hand(x, 5).unwrap();
            ledger.set_on_hand(y, 3).unwrap();

            let hubs = Arc::new(InMemoryHubDirectory::new());
            hubs.upsert(Distributor::ready(hub)).unwrap();

            let calendar = Arc::new(InMemoryOrderCycleCalendar::new());
            calendar
                .upsert(
                    OrderCycleWindow::new(cycle, now - Duration::hours(1), now + Duration::hours(1))
                        .with_distributor(hub)
                        .with_variant(x, Money::from_minor(400))
                        .with_variant(y, Money::from_minor(250)),
                )
                .unwrap();

            let bus = Arc::new(Bus::new());
            let clock = Arc::new(FixedClock::at(now));
            let stores = CheckoutStores {
                orders: orders.clone(),
                ledger: ledger.clone(),
                hubs: hubs.clone(),
                calendar,
            };
            let coordinator = CheckoutLockCoordinator::new(
                CoordinatorConfig::with_lock_timeout(std::time::Duration::from_millis(200)),
                stores,
                bus.clone(),
            )
            .with_clock(clock.clone());

            Self {
                coordinator,
                orders,
                ledger,
                hubs,
                bus,
                clock,
                hub,
                cycle,
                x,
                y,
                owner: UserId::new(),
            }
        }

        fn empty_order(&self) -> OrderId {
            let id = OrderId::new();
            self.orders
                .insert(
                    Order::new(id)
                        .with_distributor(self.hub)
                        .with_order_cycle(self.cycle)
                        .owned_by(self.owner),
                )
                .unwrap();
            id
        }

        fn owner(&self) -> Actor {
            Actor::user(Principal::customer(self.owner))
        }

        fn request(&self) -> UpdateRequest {
            UpdateRequest::new(self.owner())
        }

        fn stored(&self, order_id: OrderId) -> Order {
            self.orders.load(order_id).unwrap().unwrap()
        }

        fn allow_changes(&self, allow: bool) {
            self.hubs
                .upsert(Distributor {
                    id: self.hub,
                    ready_for_checkout: true,
                    allow_order_changes: allow,
                })
                .unwrap();
        }
    }

    #[test]
    fn update_commits_stock_and_returns_the_committed_lines() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let events = f.bus.subscribe();

        let snapshot = f
            .coordinator
            .update(order_id, &f.request().with_line(f.x, 2).with_line(f.y, 1))
            .unwrap();

        assert_eq!(snapshot.quantity_of(f.x), 2);
        assert_eq!(snapshot.quantity_of(f.y), 1);
        assert_eq!(snapshot.item_total, Money::from_minor(1050));
        assert_eq!(snapshot, f.stored(order_id).snapshot().unwrap());
        assert_eq!(f.ledger.available(f.x).unwrap(), 3);
        assert_eq!(f.ledger.available(f.y).unwrap(), 2);

        let envelope = events.try_recv().unwrap();
        assert_eq!(envelope.order_id(), order_id);
        assert_eq!(envelope.order_version(), snapshot.version);
        assert!(!f.coordinator.locks().is_locked(order_id));
    }

    #[test]
    fn repeating_the_current_quantities_is_a_no_op() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let first = f.coordinator.update(order_id, &f.request().with_line(f.x, 2)).unwrap();
        let events = f.bus.subscribe();

        let again = f.coordinator.update(order_id, &f.request().with_line(f.x, 2)).unwrap();

        assert_eq!(again, first);
        assert_eq!(f.ledger.available(f.x).unwrap(), 3);
        assert!(events.try_recv().is_err(), "no event for a no-op");
    }

    #[test]
    fn removing_a_line_releases_its_stock() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        f.coordinator.update(order_id, &f.request().with_line(f.x, 4)).unwrap();

        let snapshot = f.coordinator.update(order_id, &f.request().without_line(f.x)).unwrap();

        assert!(snapshot.lines.is_empty());
        assert_eq!(f.ledger.available(f.x).unwrap(), 5);
    }

    #[test]
    fn shortfall_is_insufficient_and_changes_nothing() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let before = f.stored(order_id);

        let err = f
            .coordinator
            .update(order_id, &f.request().with_line(f.x, 1).with_line(f.y, 4))
            .unwrap_err();

        assert_eq!(err, UpdateError::Insufficient(BTreeSet::from([f.y])));
        assert_eq!(err.outcome(), Some(GateOutcome::InsufficientStock));
        assert_eq!(f.stored(order_id), before);
        assert_eq!(f.ledger.available(f.x).unwrap(), 5);
    }

    #[test]
    fn closed_cycle_fails_validation_without_mutation() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        f.clock.advance(Duration::hours(2));

        let err = f.coordinator.update(order_id, &f.request().with_line(f.x, 1)).unwrap_err();

        assert_eq!(err, UpdateError::Validation(RejectReason::OrderCycleExpired));
        assert_eq!(err.outcome(), Some(GateOutcome::ProceedToShop));
        assert_eq!(f.ledger.available(f.x).unwrap(), 5);
        assert_eq!(f.stored(order_id).version(), 0);
    }

    #[test]
    fn completed_order_sends_the_caller_to_the_shop() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        f.coordinator.update(order_id, &f.request().with_line(f.x, 1)).unwrap();
        let mut order = f.stored(order_id);
        order.complete().unwrap();
        f.orders.insert(order).unwrap();

        let err = f.coordinator.update(order_id, &f.request().with_line(f.x, 2)).unwrap_err();
        assert_eq!(err.outcome(), Some(GateOutcome::ProceedToShop));
        assert_eq!(
            f.coordinator.edit(order_id, RequestId::new(), &f.owner()).kind(),
            Some(GateOutcome::ProceedToShop)
        );
    }

    #[test]
    fn undistributed_variant_goes_to_the_cart() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let stray = VariantId::new();
        f.ledger.set_on_hand(stray, 10).unwrap();

        let err = f.coordinator.update(order_id, &f.request().with_line(stray, 1)).unwrap_err();

        assert_eq!(err.outcome(), Some(GateOutcome::ProceedToCart));
        assert_eq!(f.ledger.available(stray).unwrap(), 10);
    }

    #[test]
    fn strangers_are_unauthorized_but_guests_with_the_token_are_not() {
        let f = Fixture::new();
        let order_id = OrderId::new();
        let token = AccessToken::new("guest-token");
        f.orders
            .insert(
                Order::new(order_id)
                    .with_distributor(f.hub)
                    .with_order_cycle(f.cycle)
                    .with_access_token(token.clone()),
            )
            .unwrap();

        let stranger = UpdateRequest::new(Actor::user(Principal::customer(UserId::new()))).with_line(f.x, 1);
        assert_eq!(f.coordinator.update(order_id, &stranger).unwrap_err(), UpdateError::Unauthorized);

        let guest = UpdateRequest::new(Actor::guest(token)).with_line(f.x, 1);
        assert!(f.coordinator.update(order_id, &guest).is_ok());

        let manager = UpdateRequest::new(Actor::user(
            Principal::customer(UserId::new()).with_role(Role::HUB_MANAGER),
        ))
        .with_line(f.x, 2);
        assert!(f.coordinator.update(order_id, &manager).is_ok());
    }

    #[test]
    fn duplicate_variants_are_an_invalid_request() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let err = f
            .coordinator
            .update(order_id, &f.request().with_line(f.x, 1).with_line(f.x, 2))
            .unwrap_err();
        assert!(matches!(err, UpdateError::InvalidRequest(_)));
    }

    #[test]
    fn missing_order_is_unavailable() {
        let f = Fixture::new();
        let err = f.coordinator.update(OrderId::new(), &f.request().with_line(f.x, 1)).unwrap_err();
        assert_eq!(err, UpdateError::Validation(RejectReason::OrderUnavailable));
    }

    #[test]
    fn stale_base_is_rebased_instead_of_overwriting() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let base = f.stored(order_id).snapshot().unwrap();

        // Another tab adds 2 of X after `base` was read.
        f.coordinator.update(order_id, &f.request().with_line(f.x, 2)).unwrap();

        // This tab, still looking at `base`, asks for 1 of X.
        let snapshot = f
            .coordinator
            .update(order_id, &f.request().with_line(f.x, 1).with_base(base))
            .unwrap();

        assert_eq!(snapshot.quantity_of(f.x), 3);
        assert_eq!(f.ledger.available(f.x).unwrap(), 2);
    }

    #[test]
    fn shrunk_stock_can_be_resolved_by_reducing_the_line() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        f.coordinator.update(order_id, &f.request().with_line(f.x, 4)).unwrap();
        f.ledger.adjust_on_hand(f.x, -3).unwrap();

        assert_eq!(
            f.coordinator.edit(order_id, RequestId::new(), &f.owner()).kind(),
            Some(GateOutcome::ProceedToCart)
        );

        let snapshot = f.coordinator.update(order_id, &f.request().with_line(f.x, 2)).unwrap();
        assert_eq!(snapshot.quantity_of(f.x), 2);
        assert_eq!(f.ledger.available(f.x).unwrap(), 0);
        assert!(f.coordinator.edit(order_id, RequestId::new(), &f.owner()).snapshot().is_some());
    }

    #[test]
    fn edit_returns_the_locked_order_or_a_redirect() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        f.coordinator.update(order_id, &f.request().with_line(f.x, 1)).unwrap();

        let outcome = f.coordinator.edit(order_id, RequestId::new(), &f.owner());
        assert_eq!(outcome.snapshot().map(|s| s.quantity_of(f.x)), Some(1));

        let stranger = Actor::user(Principal::customer(UserId::new()));
        assert_eq!(
            f.coordinator.edit(order_id, RequestId::new(), &stranger),
            CheckoutOutcome::Forbidden
        );
        assert_eq!(
            f.coordinator.edit(OrderId::new(), RequestId::new(), &f.owner()).kind(),
            Some(GateOutcome::ProceedToShop)
        );
    }

    #[test]
    fn edit_times_out_while_another_request_holds_the_order() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let _held = f.coordinator.locks().acquire(order_id, RequestId::new()).unwrap();

        match f.coordinator.edit(order_id, RequestId::new(), &f.owner()) {
            CheckoutOutcome::Failed(UpdateError::LockTimeout { order_id: locked, .. }) => {
                assert_eq!(locked, order_id)
            }
            other => panic!("expected a lock timeout, got {other:?}"),
        }
    }

    #[test]
    fn amend_needs_a_completed_order_and_a_permissive_hub() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        f.coordinator.update(order_id, &f.request().with_line(f.x, 1)).unwrap();

        let err = f.coordinator.amend(order_id, &f.request().with_line(f.x, 2)).unwrap_err();
        assert_eq!(err, UpdateError::Validation(RejectReason::OrderUnavailable));

        let mut order = f.stored(order_id);
        order.complete().unwrap();
        f.orders.insert(order).unwrap();

        let err = f.coordinator.amend(order_id, &f.request().with_line(f.x, 2)).unwrap_err();
        assert_eq!(err, UpdateError::Validation(RejectReason::ChangesNotAllowed));

        f.allow_changes(true);
        let events = f.bus.subscribe();
        let snapshot = f.coordinator.amend(order_id, &f.request().with_line(f.x, 2)).unwrap();
        assert!(snapshot.completed);
        assert_eq!(snapshot.quantity_of(f.x), 2);
        assert_eq!(f.ledger.available(f.x).unwrap(), 3);

        match events.try_recv().unwrap().into_payload() {
            CheckoutEvent::LinesCommitted(e) => assert!(e.amendment),
        }
    }

    #[test]
    fn amend_is_refused_once_the_cycle_closes() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        f.coordinator.update(order_id, &f.request().with_line(f.x, 1)).unwrap();
        let mut order = f.stored(order_id);
        order.complete().unwrap();
        f.orders.insert(order).unwrap();
        f.allow_changes(true);
        f.clock.advance(Duration::hours(2));

        let err = f.coordinator.amend(order_id, &f.request().with_line(f.x, 2)).unwrap_err();
        assert_eq!(err, UpdateError::Validation(RejectReason::OrderCycleExpired));
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore(Arc<InMemoryOrderStore>);

    impl OrderStore for ReadOnlyStore {
        fn load(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
            self.0.load(order_id)
        }

        fn save(&self, _order: &Order, _expected: ExpectedVersion) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("read-only".to_string()))
        }
    }

    #[test]
    fn failed_save_gives_the_stock_back() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let stores = CheckoutStores {
            orders: Arc::new(ReadOnlyStore(f.orders.clone())),
            ..f.coordinator.stores().clone()
        };
        let coordinator = CheckoutLockCoordinator::new(CoordinatorConfig::default(), stores, f.bus.clone())
            .with_clock(f.clock.clone());

        let err = coordinator.update(order_id, &f.request().with_line(f.x, 3)).unwrap_err();

        assert!(matches!(err, UpdateError::Store(_)));
        assert_eq!(f.ledger.available(f.x).unwrap(), 5);
        assert_eq!(f.stored(order_id).version(), 0);
    }

    #[test]
    fn view_nested_in_a_guarded_operation_re_enters() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        f.coordinator.update(order_id, &f.request().with_line(f.x, 1)).unwrap();
        let request_id = RequestId::new();

        let viewed = f
            .coordinator
            .guard(order_id, request_id, || f.coordinator.edit(order_id, request_id, &f.owner()))
            .unwrap();

        assert_eq!(viewed.snapshot().map(|s| s.quantity_of(f.x)), Some(1));
        assert!(!f.coordinator.locks().is_locked(order_id));
    }

    #[test]
    fn base_from_another_order_is_an_invalid_request() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let other = f.empty_order();
        let foreign = f.stored(other).snapshot().unwrap();

        let err = f
            .coordinator
            .update(order_id, &f.request().with_line(f.x, 1).with_base(foreign))
            .unwrap_err();

        assert!(matches!(err, UpdateError::InvalidRequest(_)), "{err:?}");
        assert_eq!(f.ledger.available(f.x).unwrap(), 5);
    }

    #[test]
    fn guard_re_enters_for_the_same_request() {
        let f = Fixture::new();
        let order_id = f.empty_order();
        let request = f.request().with_line(f.x, 1);

        let nested = f
            .coordinator
            .guard(order_id, request.request_id, || f.coordinator.update(order_id, &request))
            .unwrap();

        assert!(nested.is_ok());
        assert!(!f.coordinator.locks().is_locked(order_id));
    }
}
