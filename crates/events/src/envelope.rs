use serde::{Deserialize, Serialize};
use uuid::Uuid;

use farmgate_core::OrderId;

/// Envelope for a published order event.
///
/// `order_version` is the order version the event produced, so consumers can
/// drop duplicates and stale deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    order_id: OrderId,
    order_version: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(order_id: OrderId, order_version: u64, payload: E) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            order_id,
            order_version,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn order_version(&self) -> u64 {
        self.order_version
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
