use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// One mutex per key, created on demand and dropped once nobody holds or
/// waits on it.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        KeyedLocks::default()
    }

    /// Runs `f` while holding the lock for `key`.
    pub fn with_key<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let result = {
            let _guard = lock(&*slot);
            f()
        };

        let mut slots = lock(&self.slots);
        // map + this call; anyone else waiting holds a third reference
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }

        result
    }

    pub fn active_keys(&self) -> usize {
        lock(&self.slots).len()
    }
}

// A panic inside a critical section leaves no state behind worth refusing
// access over; the protected data is `()`.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
