use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farmgate_core::OrderId;
use farmgate_events::Event;
use farmgate_inventory::QuantityChange;

/// Event: the lines of an order were changed and their stock committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesCommitted {
    pub order_id: OrderId,
    pub changes: Vec<QuantityChange>,
    /// True when the order was already completed (a post-checkout amendment).
    pub amendment: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutEvent {
    LinesCommitted(LinesCommitted),
}

impl Event for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::LinesCommitted(e) if e.amendment => "checkout.order.amended",
            CheckoutEvent::LinesCommitted(_) => "checkout.order.lines_committed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CheckoutEvent::LinesCommitted(e) => e.occurred_at,
        }
    }
}
