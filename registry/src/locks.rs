//! Lazy per-key mutex tables: StartLocks and DownloadLocks (spec §3, §9).
//!
//! Entries are created once and never removed — cardinality is bounded by
//! the allowlist, so this is simpler and cheaper than reference-counted
//! cleanup (spec §3 "StartLock table").

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct LockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the mutex for `key`, creating it if this is the first request
    /// for that key. `DashMap::entry` makes the get-or-insert atomic, so
    /// concurrent callers for a brand-new key never race to create two
    /// different mutexes for it.
    pub fn get_or_create(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_returns_same_mutex() {
        let table = LockTable::new();
        let a = table.get_or_create("repo/model");
        let b = table.get_or_create("repo/model");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn different_keys_are_independent() {
        let table = LockTable::new();
        let a = table.get_or_create("repo/model-a");
        let b = table.get_or_create("repo/model-b");
        assert!(!Arc::ptr_eq(&a, &b));

        let _guard_a = a.lock().await;
        // Locking b must not block even though a is held.
        let _guard_b = tokio::time::timeout(std::time::Duration::from_millis(50), b.lock())
            .await
            .expect("locking an unrelated key must not block");
    }
}
