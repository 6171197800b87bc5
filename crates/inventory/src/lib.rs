//! Stock domain module.
//!
//! Business rules for per-variant availability, implemented as deterministic
//! domain logic (no IO, no locking). Shared ledgers implement [`StockLedger`]
//! on top of [`plan_commit`] and [`insufficient_variants`].

pub mod stock;

pub use stock::{
    insufficient_variants, plan_commit, QuantityChange, StockEntry, StockError, StockLedger,
};
