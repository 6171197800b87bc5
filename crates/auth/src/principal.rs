use serde::{Deserialize, Serialize};

use farmgate_core::UserId;

use crate::{Permission, Role};

/// A signed-in user with their granted roles and explicit permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            roles: vec![Role::CUSTOMER],
            permissions: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Explicit permissions plus those implied by roles.
    pub fn effective_permissions(&self) -> Vec<Permission> {
        let mut perms: Vec<Permission> = self
            .roles
            .iter()
            .flat_map(Role::implied_permissions)
            .chain(self.permissions.iter().cloned())
            .collect();
        perms.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        perms.dedup();
        perms
    }
}

/// Guest order access token (handed out when an order is created without an
/// account; presenting it later grants edit access to that order only).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The caller of a gated operation: a signed-in principal, a guest holding an
/// order access token, both, or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub principal: Option<Principal>,
    pub access_token: Option<AccessToken>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            access_token: None,
        }
    }

    pub fn guest(token: AccessToken) -> Self {
        Self {
            principal: None,
            access_token: Some(token),
        }
    }
}
