use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Serializes work per order id while letting different orders run in
/// parallel. Entries are dropped once no one holds or waits on them.
#[derive(Debug, Default, Clone)]
pub struct OrderLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock<T>(&self, order_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(order_id.to_string()).or_default().clone()
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here: nobody else is waiting.
        if Arc::strong_count(&lock) == 2 {
            map.remove(order_id);
        }
        result
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
