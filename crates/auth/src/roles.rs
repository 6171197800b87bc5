use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const CUSTOMER: Role = Role(Cow::Borrowed("customer"));
    pub const HUB_MANAGER: Role = Role(Cow::Borrowed("hub_manager"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Permissions implied by the built-in roles. Unknown roles grant nothing.
    pub fn implied_permissions(&self) -> Vec<Permission> {
        match self.as_str() {
            "admin" => vec![Permission::WILDCARD],
            "hub_manager" => vec![Permission::ORDERS_MANAGE],
            _ => Vec::new(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
