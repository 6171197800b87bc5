//! What callers get back from guarded operations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use farmgate_core::{DomainError, OrderId, VariantId};
use farmgate_inventory::StockError;
use farmgate_orders::{OrderSnapshot, RepositoryError};

use crate::gate::{GateError, GateOutcome, RejectReason};
use crate::lock::LockError;

/// Failure of a guarded update. Every variant is retryable by the caller and
/// none of them leaves a partial write behind.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UpdateError {
    /// Requested quantities exceed available stock.
    #[error("insufficient stock for {} variant(s)", .0.len())]
    Insufficient(BTreeSet<VariantId>),

    /// Another request held the order for too long; nothing was attempted.
    #[error("timed out waiting for order {order_id} after {waited_ms} ms")]
    LockTimeout { order_id: OrderId, waited_ms: u64 },

    /// An eligibility check failed against the locked order.
    #[error("validation failed: {0}")]
    Validation(RejectReason),

    /// The actor may not edit this order.
    #[error("unauthorized")]
    Unauthorized,

    /// The request itself is malformed (e.g. a variant listed twice).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A store or the ledger could not be reached.
    #[error("store failure: {0}")]
    Store(String),
}

impl UpdateError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// The redirect-style outcome a transport layer should present.
    pub fn outcome(&self) -> Option<GateOutcome> {
        match self {
            UpdateError::Insufficient(_) => Some(GateOutcome::InsufficientStock),
            UpdateError::Validation(reason) => Some(reason.outcome()),
            UpdateError::Unauthorized => Some(GateOutcome::Forbidden),
            UpdateError::LockTimeout { .. }
            | UpdateError::InvalidRequest(_)
            | UpdateError::Store(_) => None,
        }
    }
}

impl From<RejectReason> for UpdateError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::Unauthorized => UpdateError::Unauthorized,
            RejectReason::InsufficientStock { variants } => UpdateError::Insufficient(variants),
            reason => UpdateError::Validation(reason),
        }
    }
}

impl From<LockError> for UpdateError {
    fn from(value: LockError) -> Self {
        match value {
            LockError::Timeout { order_id, waited } => UpdateError::LockTimeout {
                order_id,
                waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            },
            LockError::Poisoned => UpdateError::store(value.to_string()),
        }
    }
}

impl From<StockError> for UpdateError {
    fn from(value: StockError) -> Self {
        match value {
            StockError::Insufficient(variants) => UpdateError::Insufficient(variants),
            other => UpdateError::store(other.to_string()),
        }
    }
}

impl From<RepositoryError> for UpdateError {
    fn from(value: RepositoryError) -> Self {
        UpdateError::store(value.to_string())
    }
}

impl From<GateError> for UpdateError {
    fn from(value: GateError) -> Self {
        match value {
            GateError::Repository(e) => e.into(),
            GateError::Stock(e) => e.into(),
        }
    }
}

impl From<DomainError> for UpdateError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(message) | DomainError::InvalidId(message) => {
                UpdateError::InvalidRequest(message)
            }
            other => UpdateError::store(other.to_string()),
        }
    }
}

/// Tagged result of a guarded operation, ready for a transport layer to turn
/// into a redirect, a status code or a rendered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Proceed(OrderSnapshot),
    ProceedToShop(RejectReason),
    ProceedToCart(RejectReason),
    InsufficientStock(BTreeSet<VariantId>),
    Forbidden,
    Failed(UpdateError),
}

impl CheckoutOutcome {
    pub fn kind(&self) -> Option<GateOutcome> {
        match self {
            CheckoutOutcome::Proceed(_) => Some(GateOutcome::Proceed),
            CheckoutOutcome::ProceedToShop(_) => Some(GateOutcome::ProceedToShop),
            CheckoutOutcome::ProceedToCart(_) => Some(GateOutcome::ProceedToCart),
            CheckoutOutcome::InsufficientStock(_) => Some(GateOutcome::InsufficientStock),
            CheckoutOutcome::Forbidden => Some(GateOutcome::Forbidden),
            CheckoutOutcome::Failed(_) => None,
        }
    }

    pub fn snapshot(&self) -> Option<&OrderSnapshot> {
        match self {
            CheckoutOutcome::Proceed(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

impl From<RejectReason> for CheckoutOutcome {
    fn from(reason: RejectReason) -> Self {
        match reason.outcome() {
            GateOutcome::ProceedToShop => CheckoutOutcome::ProceedToShop(reason),
            GateOutcome::ProceedToCart => CheckoutOutcome::ProceedToCart(reason),
            GateOutcome::Forbidden => CheckoutOutcome::Forbidden,
            GateOutcome::InsufficientStock | GateOutcome::Proceed => match reason {
                RejectReason::InsufficientStock { variants } => CheckoutOutcome::InsufficientStock(variants),
                other => CheckoutOutcome::Failed(UpdateError::Validation(other)),
            },
        }
    }
}

impl From<Result<OrderSnapshot, UpdateError>> for CheckoutOutcome {
    fn from(result: Result<OrderSnapshot, UpdateError>) -> Self {
        match result {
            Ok(snapshot) => CheckoutOutcome::Proceed(snapshot),
            Err(UpdateError::Validation(reason)) => reason.into(),
            Err(UpdateError::Insufficient(variants)) => CheckoutOutcome::InsufficientStock(variants),
            Err(UpdateError::Unauthorized) => CheckoutOutcome::Forbidden,
            Err(other) => CheckoutOutcome::Failed(other),
        }
    }
}
