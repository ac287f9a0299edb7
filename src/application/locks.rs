use crate::domain::order::OrderId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// One async mutex per order id.
///
/// Every service that loads and saves an order takes its lock here, so clones
/// of one `OrderLocks` must be handed to all of them. Commands for the same
/// order run one after another; different orders never wait on each other.
/// Entries nobody holds or waits for are dropped on the next acquisition.
#[derive(Default, Clone)]
pub struct OrderLocks {
    locks: Arc<Mutex<HashMap<OrderId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, order_id: OrderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|id, lock| *id == order_id || Arc::strong_count(lock) > 1);
            locks.entry(order_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of orders with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
