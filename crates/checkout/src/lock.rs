//! Per-order mutual exclusion.
//!
//! ## Token lifecycle
//!
//! ```text
//! Idle ──acquire──▶ Locked(request, depth) ──release (depth → 0)──▶ Idle
//!                       │      ▲
//!                       └──────┘ re-entrant acquire by the same request on the same thread
//! ```
//!
//! The token table is a `Mutex<HashMap<OrderId, Holder>>` guarded for the few
//! instructions it takes to inspect or update an entry. The guarded operation
//! itself runs with the table unlocked, so:
//!
//! - callers for the same order wait on the `Condvar` until the holder releases
//! - callers for other orders only ever contend on the table mutex
//! - a panic inside an operation cannot poison the table
//!
//! Tokens are released by [`OrderLockGuard`]'s `Drop`, which also runs while
//! unwinding.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use thiserror::Error;

use farmgate_core::{OrderId, RequestId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Another request held the order for longer than the configured wait.
    #[error("timed out after {waited:?} waiting for the lock on order {order_id}")]
    Timeout { order_id: OrderId, waited: Duration },

    /// The token table mutex was poisoned.
    #[error("order lock table poisoned")]
    Poisoned,
}

#[derive(Debug, Copy, Clone)]
struct Holder {
    request_id: RequestId,
    thread: ThreadId,
    depth: u32,
}

impl Holder {
    /// Nesting needs both: a request id submitted twice from two threads is
    /// two operations, not one.
    fn is(&self, request_id: RequestId, thread: ThreadId) -> bool {
        self.request_id == request_id && self.thread == thread
    }
}

/// Registry of per-order lock tokens.
#[derive(Debug)]
pub struct OrderLockRegistry {
    table: Mutex<HashMap<OrderId, Holder>>,
    released: Condvar,
    timeout: Duration,
}

impl OrderLockRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire the token for `order_id` on behalf of `request_id`.
    ///
    /// Blocks while a different request holds the order, up to the configured
    /// timeout. Re-acquiring from the holding request on the holding thread
    /// nests instead of waiting.
    pub fn acquire(
        &self,
        order_id: OrderId,
        request_id: RequestId,
    ) -> Result<OrderLockGuard<'_>, LockError> {
        let deadline = Instant::now() + self.timeout;
        let thread = thread::current().id();
        let mut table = self.table.lock().map_err(|_| LockError::Poisoned)?;

        loop {
            match table.get_mut(&order_id) {
                None => {
                    table.insert(
                        order_id,
                        Holder {
                            request_id,
                            thread,
                            depth: 1,
                        },
                    );
                    return Ok(OrderLockGuard::new(self, order_id));
                }
                Some(holder) if holder.is(request_id, thread) => {
                    holder.depth += 1;
                    tracing::trace!(%order_id, %request_id, depth = holder.depth, "re-entrant lock");
                    return Ok(OrderLockGuard::new(self, order_id));
                }
                Some(holder) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!(
                            %order_id,
                            %request_id,
                            holder = %holder.request_id,
                            "order lock wait timed out"
                        );
                        return Err(LockError::Timeout {
                            order_id,
                            waited: self.timeout,
                        });
                    }
                    let (next, _) = self
                        .released
                        .wait_timeout(table, deadline - now)
                        .map_err(|_| LockError::Poisoned)?;
                    table = next;
                }
            }
        }
    }

    /// Whether any request currently holds `order_id`.
    pub fn is_locked(&self, order_id: OrderId) -> bool {
        self.lock_table().contains_key(&order_id)
    }

    /// Number of orders currently locked.
    pub fn held(&self) -> usize {
        self.lock_table().len()
    }

    fn release(&self, order_id: OrderId) {
        let mut table = self.lock_table();
        let now_idle = match table.get_mut(&order_id) {
            Some(holder) if holder.depth > 1 => {
                holder.depth -= 1;
                false
            }
            Some(_) => true,
            None => false,
        };
        if now_idle {
            table.remove(&order_id);
            drop(table);
            self.released.notify_all();
        }
    }

    /// Table access for release and inspection. Never fails: a release must
    /// happen even if some other thread panicked while updating the table.
    fn lock_table(&self) -> MutexGuard<'_, HashMap<OrderId, Holder>> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// RAII token for one acquisition. Dropping it releases (or un-nests) the lock.
#[derive(Debug)]
#[must_use = "the order is unlocked as soon as the guard is dropped"]
pub struct OrderLockGuard<'a> {
    registry: &'a OrderLockRegistry,
    order_id: OrderId,
}

impl<'a> OrderLockGuard<'a> {
    fn new(registry: &'a OrderLockRegistry, order_id: OrderId) -> Self {
        Self { registry, order_id }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }
}

impl Drop for OrderLockGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(self.order_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;

    fn registry(timeout_ms: u64) -> Arc<OrderLockRegistry> {
        Arc::new(OrderLockRegistry::new(Duration::from_millis(timeout_ms)))
    }

    #[test]
    fn released_when_guard_drops() {
        let locks = registry(100);
        let order_id = OrderId::new();

        let guard = locks.acquire(order_id, RequestId::new()).unwrap();
        assert!(locks.is_locked(order_id));
        drop(guard);

        assert!(!locks.is_locked(order_id));
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn same_request_nests_without_deadlock() {
        let locks = registry(50);
        let order_id = OrderId::new();
        let request_id = RequestId::new();

        let outer = locks.acquire(order_id, request_id).unwrap();
        let inner = locks.acquire(order_id, request_id).unwrap();
        drop(inner);
        assert!(locks.is_locked(order_id), "outer acquisition still holds");
        drop(outer);
        assert!(!locks.is_locked(order_id));
    }

    #[test]
    fn same_request_on_two_threads_still_excludes() {
        let locks = registry(5_000);
        let order_id = OrderId::new();
        let request_id = RequestId::new();
        let start = Arc::new(std::sync::Barrier::new(2));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let (locks, start) = (locks.clone(), start.clone());
                let (inside, max_seen) = (inside.clone(), max_seen.clone());
                thread::spawn(move || {
                    start.wait();
                    let _guard = locks.acquire(order_id, request_id).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(!locks.is_locked(order_id));
    }

    #[test]
    fn other_request_times_out_while_held() {
        let locks = registry(30);
        let order_id = OrderId::new();
        let _held = locks.acquire(order_id, RequestId::new()).unwrap();

        let err = locks.acquire(order_id, RequestId::new()).unwrap_err();
        assert_eq!(
            err,
            LockError::Timeout {
                order_id,
                waited: Duration::from_millis(30)
            }
        );
    }

    #[test]
    fn different_orders_do_not_wait_on_each_other() {
        let locks = registry(20);
        let _a = locks.acquire(OrderId::new(), RequestId::new()).unwrap();
        assert!(locks.acquire(OrderId::new(), RequestId::new()).is_ok());
    }

    #[test]
    fn waiter_proceeds_once_holder_releases() {
        let locks = registry(2_000);
        let order_id = OrderId::new();
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let locks = locks.clone();
            thread::spawn(move || {
                let _guard = locks.acquire(order_id, RequestId::new()).unwrap();
                locked_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };

        locked_rx.recv().unwrap();
        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || locks.acquire(order_id, RequestId::new()).map(|_| ()))
        };

        thread::sleep(Duration::from_millis(20));
        release_tx.send(()).unwrap();

        holder.join().unwrap();
        assert!(waiter.join().unwrap().is_ok());
        assert!(!locks.is_locked(order_id));
    }

    #[test]
    fn at_most_one_holder_per_order() {
        let locks = registry(5_000);
        let order_id = OrderId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        let _guard = locks.acquire(order_id, RequestId::new()).unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.held(), 0);
    }
}
