//! `farmgate-core`: shared domain building blocks for the checkout workspace.
//!
//! Pure primitives only: identifiers, the domain error, aggregate versioning,
//! money, and the clock seam. No storage or locking lives here.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{DistributorId, OrderCycleId, OrderId, RequestId, UserId, VariantId};
pub use value_object::{Money, ValueObject};
