//! In-memory event bus for tests, simulations and single-process deployments.

use std::sync::{mpsc, Mutex};

use crate::bus::{EventBus, Subscription};

#[derive(Debug)]
pub enum InMemoryBusError {
    /// Internal subscriber list lock was poisoned.
    Poisoned,
}

#[derive(Debug)]
enum Subscriber<M> {
    Unbounded(mpsc::Sender<M>),
    Bounded(mpsc::SyncSender<M>),
}

impl<M> Subscriber<M> {
    /// False once the subscriber should be dropped from the list.
    fn deliver(&self, message: M) -> bool {
        match self {
            Self::Unbounded(tx) => tx.send(message).is_ok(),
            // A full queue means the receiver has fallen behind; it is cut off.
            Self::Bounded(tx) => tx.try_send(message).is_ok(),
        }
    }
}

/// Fan-out over `std::sync::mpsc` channels. Dead subscribers are pruned on
/// publish.
///
/// `new()` gives every subscriber an unbounded queue: a subscription that is
/// kept alive but never drained grows without limit. Use
/// [`InMemoryEventBus::bounded`] for long-running processes; there a
/// subscriber whose queue is full is disconnected on the next publish and
/// sees the channel close after draining what it already has.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<Subscriber<M>>>,
    capacity: Option<usize>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus whose subscribers each buffer at most `capacity` messages.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: Some(capacity.max(1)),
        }
    }

    /// Number of live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: None,
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        let before = subs.len();
        subs.retain(|sub| sub.deliver(message.clone()));
        if subs.len() < before {
            tracing::debug!(pruned = before - subs.len(), "event subscribers dropped");
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (sub, rx) = match self.capacity {
            Some(capacity) => {
                let (tx, rx) = mpsc::sync_channel(capacity);
                (Subscriber::Bounded(tx), rx)
            }
            None => {
                let (tx, rx) = mpsc::channel();
                (Subscriber::Unbounded(tx), rx)
            }
        };
        // A poisoned list still hands out a (silent) subscription.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(sub);
        }
        Subscription::new(rx)
    }
}
