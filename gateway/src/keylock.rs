use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key mutual exclusion table. Concurrent `lock` calls with the same key
/// serialize; distinct keys never contend.
#[derive(Debug, Default)]
pub struct KeyLock {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating the entry on first use.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop the table entry for `key`.
    ///
    /// A guard already held for `key` stays valid through its own handle;
    /// later `lock` calls get a fresh mutex. Used both to break a lock while
    /// tearing a task down mid-critical-section and to clean the entry up
    /// once the record is deleted, so the table does not retain one mutex per
    /// historical key.
    pub fn remove(&self, key: &str) {
        self.locks.remove(key);
    }
}
