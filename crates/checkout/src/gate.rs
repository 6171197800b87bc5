//! Order eligibility checks.
//!
//! Checks are named values in an explicit, ordered chain. [`OrderGate::evaluate`]
//! walks a chain and stops at the first check that rejects; the rejection's
//! [`RejectReason`] decides where the caller is sent.
//!
//! Checks only read: they query the hub directory, the order-cycle calendar and
//! the stock ledger but never mutate them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use farmgate_auth::{authorize_order_edit, Actor};
use farmgate_core::VariantId;
use farmgate_inventory::{QuantityChange, StockError, StockLedger};
use farmgate_orders::{HubDirectory, Order, OrderCycleCalendar, RepositoryError};

/// Where a gated caller goes next.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    /// Continue with the operation.
    Proceed,
    /// Nothing to check out here: back to the shopfront.
    ProceedToShop,
    /// The cart needs attention before checkout can continue.
    ProceedToCart,
    /// Stock ran out under the order's lines.
    InsufficientStock,
    /// The actor may not touch this order.
    Forbidden,
}

/// Why a check rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("distributor is not ready for checkout")]
    HubNotReady,

    #[error("order cycle is not open")]
    OrderCycleExpired,

    #[error("order has no order cycle")]
    NoOrderCycle,

    #[error("order has no distributor")]
    NoDistributor,

    #[error("order is missing, completed or not open for checkout")]
    OrderUnavailable,

    #[error("order lines are not valid for this hub and order cycle")]
    InvalidLineItems {
        insufficient: BTreeSet<VariantId>,
        undistributed: BTreeSet<VariantId>,
    },

    #[error("order is already completed")]
    Completed,

    #[error("checkout is not allowed for this order")]
    CheckoutNotAllowed,

    #[error("insufficient stock")]
    InsufficientStock { variants: BTreeSet<VariantId> },

    #[error("distributor does not allow changes to completed orders")]
    ChangesNotAllowed,

    #[error("not authorized to edit this order")]
    Unauthorized,
}

impl RejectReason {
    pub fn outcome(&self) -> GateOutcome {
        match self {
            RejectReason::HubNotReady
            | RejectReason::OrderCycleExpired
            | RejectReason::NoOrderCycle
            | RejectReason::NoDistributor
            | RejectReason::OrderUnavailable
            | RejectReason::ChangesNotAllowed => GateOutcome::ProceedToShop,
            RejectReason::InvalidLineItems { .. }
            | RejectReason::Completed
            | RejectReason::CheckoutNotAllowed => GateOutcome::ProceedToCart,
            RejectReason::InsufficientStock { .. } => GateOutcome::InsufficientStock,
            RejectReason::Unauthorized => GateOutcome::Forbidden,
        }
    }
}

/// A check could not be evaluated because a collaborator failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Stock(#[from] StockError),
}

/// One named eligibility check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    HubReady,
    OrderCycleNotExpired,
    HasOrderCycle,
    HasDistributor,
    OrderExists,
    LineItemsValid,
    NotCompleted,
    CheckoutAllowed,
    SufficientStock,
    Authorized,
    OrderCompleted,
    ChangesAllowed,
}

/// Checkout precedence: the first failing check decides the outcome.
pub const CHECKOUT_CHAIN: &[Check] = &[
    Check::HubReady,
    Check::OrderCycleNotExpired,
    Check::HasOrderCycle,
    Check::HasDistributor,
    Check::OrderExists,
    Check::LineItemsValid,
    Check::NotCompleted,
    Check::CheckoutAllowed,
    Check::SufficientStock,
    Check::Authorized,
];

/// Amending a completed order: the hub must allow changes and the cycle must
/// still be open.
pub const AMENDMENT_CHAIN: &[Check] = &[
    Check::OrderCycleNotExpired,
    Check::HasOrderCycle,
    Check::HasDistributor,
    Check::OrderCompleted,
    Check::ChangesAllowed,
    Check::LineItemsValid,
    Check::SufficientStock,
    Check::Authorized,
];

/// What is being checked: the order (if it exists), the lines to validate and
/// the caller.
#[derive(Debug, Clone, Copy)]
pub struct GateSubject<'a> {
    pub order: Option<&'a Order>,
    pub lines: &'a [QuantityChange],
    pub actor: &'a Actor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Pass,
    Reject { check: Check, reason: RejectReason },
}

impl GateVerdict {
    pub fn outcome(&self) -> GateOutcome {
        match self {
            GateVerdict::Pass => GateOutcome::Proceed,
            GateVerdict::Reject { reason, .. } => reason.outcome(),
        }
    }
}

/// Read-only view over the collaborators the checks consult.
pub struct OrderGate<'a> {
    hubs: &'a dyn HubDirectory,
    calendar: &'a dyn OrderCycleCalendar,
    ledger: &'a dyn StockLedger,
    now: DateTime<Utc>,
}

impl<'a> OrderGate<'a> {
    pub fn new(
        hubs: &'a dyn HubDirectory,
        calendar: &'a dyn OrderCycleCalendar,
        ledger: &'a dyn StockLedger,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            hubs,
            calendar,
            ledger,
            now,
        }
    }

    /// Run `chain` in order; the first rejection short-circuits the rest.
    pub fn evaluate(&self, chain: &[Check], subject: GateSubject<'_>) -> Result<GateVerdict, GateError> {
        for &check in chain {
            if let Some(reason) = self.run(check, subject)? {
                tracing::debug!(?check, %reason, "gate rejected");
                return Ok(GateVerdict::Reject { check, reason });
            }
        }
        Ok(GateVerdict::Pass)
    }

    fn run(&self, check: Check, subject: GateSubject<'_>) -> Result<Option<RejectReason>, GateError> {
        let reject_unless = |ok: bool, reason: RejectReason| if ok { None } else { Some(reason) };

        let order = match (check, subject.order) {
            (Check::OrderExists, order) => {
                return Ok(reject_unless(Self::order_exists(order), RejectReason::OrderUnavailable));
            }
            (Check::OrderCompleted, order) => {
                return Ok(reject_unless(
                    order.is_some_and(Order::is_completed),
                    RejectReason::OrderUnavailable,
                ));
            }
            // Remaining checks pass vacuously without an order; the existence
            // check later in the chain reports it.
            (_, None) => return Ok(None),
            (_, Some(order)) => order,
        };

        let verdict = match check {
            Check::HubReady => reject_unless(self.hub_ready(order)?, RejectReason::HubNotReady),
            Check::OrderCycleNotExpired => {
                reject_unless(self.order_cycle_not_expired(order)?, RejectReason::OrderCycleExpired)
            }
            Check::HasOrderCycle => {
                reject_unless(order.order_cycle_id().is_some(), RejectReason::NoOrderCycle)
            }
            Check::HasDistributor => {
                reject_unless(order.distributor_id().is_some(), RejectReason::NoDistributor)
            }
            Check::LineItemsValid => self.line_items_valid(order, subject.lines)?,
            Check::NotCompleted => reject_unless(!order.is_completed(), RejectReason::Completed),
            Check::CheckoutAllowed => {
                reject_unless(order.is_checkout_allowed(), RejectReason::CheckoutNotAllowed)
            }
            Check::SufficientStock => {
                let variants = self.ledger.check_insufficient_stock(subject.lines)?;
                reject_unless(variants.is_empty(), RejectReason::InsufficientStock { variants })
            }
            Check::Authorized => reject_unless(
                authorize_order_edit(subject.actor, &order.access()).is_ok(),
                RejectReason::Unauthorized,
            ),
            Check::ChangesAllowed => {
                reject_unless(self.changes_allowed(order)?, RejectReason::ChangesNotAllowed)
            }
            Check::OrderExists | Check::OrderCompleted => None,
        };
        Ok(verdict)
    }

    /// Absent distributor passes; `HasDistributor` reports it.
    pub fn hub_ready(&self, order: &Order) -> Result<bool, GateError> {
        match order.distributor_id() {
            Some(distributor_id) => Ok(self.hubs.hub_ready(distributor_id)?),
            None => Ok(true),
        }
    }

    /// Absent order cycle passes; `HasOrderCycle` reports it.
    pub fn order_cycle_not_expired(&self, order: &Order) -> Result<bool, GateError> {
        match order.order_cycle_id() {
            Some(order_cycle_id) => Ok(self.calendar.is_open(order_cycle_id, self.now)?),
            None => Ok(true),
        }
    }

    pub fn order_exists(order: Option<&Order>) -> bool {
        order.is_some_and(|o| o.is_checkout_allowed() && !o.is_completed())
    }

    fn changes_allowed(&self, order: &Order) -> Result<bool, GateError> {
        match order.distributor_id() {
            Some(distributor_id) => Ok(self
                .hubs
                .distributor(distributor_id)?
                .is_some_and(|d| d.allow_order_changes)),
            None => Ok(false),
        }
    }

    /// No insufficient lines and every line distributed by the order's hub in
    /// its order cycle.
    fn line_items_valid(
        &self,
        order: &Order,
        lines: &[QuantityChange],
    ) -> Result<Option<RejectReason>, GateError> {
        let insufficient = self.ledger.check_insufficient_stock(lines)?;

        let wanted: Vec<VariantId> = lines
            .iter()
            .filter(|l| l.requested > 0)
            .map(|l| l.variant_id)
            .collect();

        let undistributed: BTreeSet<VariantId> = match (order.order_cycle_id(), order.distributor_id()) {
            (Some(cycle), Some(hub)) => match self.calendar.window(cycle)? {
                Some(window) => wanted
                    .iter()
                    .filter(|v| !window.distributes_variants(hub, std::iter::once(*v)))
                    .copied()
                    .collect(),
                None => wanted.iter().copied().collect(),
            },
            _ => wanted.iter().copied().collect(),
        };

        if insufficient.is_empty() && undistributed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(RejectReason::InvalidLineItems {
                insufficient,
                undistributed,
            }))
        }
    }
}
