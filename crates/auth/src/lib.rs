//! `farmgate-auth`: pure authorization boundary for checkout operations.
//!
//! Decoupled from HTTP and sessions: callers pass an explicit [`Actor`] into
//! every gated operation instead of relying on an implicit current user.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, authorize_order_edit, AuthzError, OrderAccess};
pub use permissions::Permission;
pub use principal::{AccessToken, Actor, Principal};
pub use roles::Role;
