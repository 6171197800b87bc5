//! Aggregate root trait and optimistic version expectations.
//!
//! Orders are guarded by a pessimistic per-order lock, but every persisted write
//! still carries an expected version so a store can refuse a write computed from
//! a stale read.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Incremented by one for every persisted change.
    fn version(&self) -> u64;
}

/// Version expectation for a write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (first insert, administrative overwrite).
    Any,
    /// Require the stored record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        match self {
            ExpectedVersion::Exact(expected) if expected != actual => {
                Err(DomainError::VersionConflict { expected, actual })
            }
            _ => Ok(()),
        }
    }
}
