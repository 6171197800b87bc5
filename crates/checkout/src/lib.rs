//! Checkout concurrency coordination.
//!
//! [`CheckoutLockCoordinator`] runs every read-validate-write sequence on an
//! order under a per-order lock, so the eligibility checks in [`gate`] and the
//! stock commit against the ledger see a state nobody else is changing.
//! Operations on different orders never wait on each other.

pub mod config;
pub mod coordinator;
pub mod gate;
pub mod lock;
pub mod outcome;


pub use config::{CoordinatorConfig, LOCK_TIMEOUT_ENV};
pub use coordinator::{CheckoutLockCoordinator, CheckoutStores, UpdateRequest};
pub use gate::{
    Check, GateError, GateOutcome, GateSubject, GateVerdict, OrderGate, RejectReason, AMENDMENT_CHAIN,
    CHECKOUT_CHAIN,
};
pub use lock::{LockError, OrderLockGuard, OrderLockRegistry};
pub use outcome::{CheckoutOutcome, UpdateError};
