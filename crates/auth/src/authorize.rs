use serde::{Deserialize, Serialize};
use thiserror::Error;

use farmgate_core::UserId;

use crate::{AccessToken, Actor, Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("forbidden: actor may not edit this order")]
    NotOrderOwner,
}

/// Who may edit an order, as recorded on the order itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAccess {
    pub owner: Option<UserId>,
    pub token: Option<AccessToken>,
}

/// Check a single permission for a principal.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .effective_permissions()
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Capability check for editing one order.
///
/// Granted when any of these hold:
/// - the actor is the signed-in owner of the order
/// - the actor presents the order's guest access token
/// - the actor holds `orders.manage`
pub fn authorize_order_edit(actor: &Actor, access: &OrderAccess) -> Result<(), AuthzError> {
    if let Some(principal) = &actor.principal {
        if access.owner == Some(principal.user_id) {
            return Ok(());
        }
        if authorize(principal, &Permission::ORDERS_MANAGE).is_ok() {
            return Ok(());
        }
    }

    match (&actor.access_token, &access.token) {
        (Some(presented), Some(expected)) if presented == expected => Ok(()),
        _ => {
            tracing::debug!(owner = ?access.owner, "order edit denied");
            Err(AuthzError::NotOrderOwner)
        }
    }
}
