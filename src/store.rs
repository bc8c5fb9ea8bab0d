//! Sharded in-memory key-value store.
//!
//! Each shard is an independent `RwLock<Vec<(String, String)>>` collision
//! chain; there is no store-wide lock. `put`/`delete` release their shard
//! lock before publishing a notification, so the lock order session-table →
//! shard (see concurrency model) is never inverted from inside the Store.

use std::io::Write;
use std::sync::RwLock;

use anyhow::{anyhow, Result};

use crate::consts::{N_SHARDS, TOMBSTONE};
use crate::hash::shard_of;
use crate::notifier::Notifier;

type Shard = RwLock<Vec<(String, String)>>;

fn new_shard() -> Shard {
    RwLock::new(Vec::new())
}

/// Acquire a read lock, recovering from poisoning rather than propagating
/// a panic across an unrelated session/worker.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

pub struct Store {
    shards: Vec<Shard>,
}

impl Store {
    pub fn new() -> Self {
        let mut shards = Vec::with_capacity(N_SHARDS);
        shards.resize_with(N_SHARDS, new_shard);
        Self { shards }
    }

    /// Insert or overwrite `key`, then publish the new value to subscribers.
    /// Fails only if `key`'s first byte doesn't hash to a valid shard.
    pub fn put(&self, notifier: &Notifier, key: &str, value: &str) -> Result<()> {
        let idx = shard_of(key).ok_or_else(|| anyhow!("invalid key: {key:?}"))?;
        {
            let mut chain = write_lock(&self.shards[idx]);
            if let Some(entry) = chain.iter_mut().find(|(k, _)| k == key) {
                entry.1 = value.to_string();
            } else {
                chain.insert(0, (key.to_string(), value.to_string()));
            }
        }
        notifier.publish(key, value);
        Ok(())
    }

    /// Shared-mode read. Fails only on an invalid key hash.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let idx = shard_of(key).ok_or_else(|| anyhow!("invalid key: {key:?}"))?;
        let chain = read_lock(&self.shards[idx]);
        Ok(chain.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()))
    }

    /// Remove `key` if present, publishing a tombstone notification on
    /// success. Returns whether a removal occurred.
    pub fn delete(&self, notifier: &Notifier, key: &str) -> Result<bool> {
        let idx = shard_of(key).ok_or_else(|| anyhow!("invalid key: {key:?}"))?;
        let removed = {
            let mut chain = write_lock(&self.shards[idx]);
            let before = chain.len();
            chain.retain(|(k, _)| k != key);
            before != chain.len()
        };
        if removed {
            notifier.publish(key, TOMBSTONE);
        }
        Ok(removed)
    }

    pub fn exists(&self, key: &str) -> bool {
        match shard_of(key) {
            Some(idx) => {
                let chain = read_lock(&self.shards[idx]);
                chain.iter().any(|(k, _)| k == key)
            }
            None => false,
        }
    }

    /// Snapshot every live pair to `sink`, one `(k,v)` per shard's natural
    /// order, shards visited in ascending index order. Acquires all shard
    /// locks in shared mode, one at a time — never all at once — to avoid
    /// holding N_SHARDS locks simultaneously while still giving each shard
    /// a consistent view.
    pub fn show<W: Write>(&self, sink: &mut W) -> Result<()> {
        for shard in &self.shards {
            let chain = read_lock(shard);
            for (k, v) in chain.iter() {
                writeln!(sink, "({k},{v})")?;
            }
        }
        Ok(())
    }

    /// Collect every live pair, used by BACKUP to snapshot the store before
    /// handing the copy to a forked child.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let chain = read_lock(shard);
            out.extend(chain.iter().cloned());
        }
        out
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionTable;
    use std::sync::Arc;

    fn notifier() -> Notifier {
        Notifier::new(Arc::new(SessionTable::new()))
    }

    #[test]
    fn put_then_get_roundtrips() {
        let store = Store::new();
        let n = notifier();
        store.put(&n, "alpha", "1").unwrap();
        assert_eq!(store.get("alpha").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn put_overwrites_existing_key() {
        let store = Store::new();
        let n = notifier();
        store.put(&n, "alpha", "1").unwrap();
        store.put(&n, "alpha", "2").unwrap();
        assert_eq!(store.get("alpha").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn delete_is_idempotent_in_final_state() {
        let store = Store::new();
        let n = notifier();
        store.put(&n, "alpha", "1").unwrap();
        assert!(store.delete(&n, "alpha").unwrap());
        assert!(!store.delete(&n, "alpha").unwrap());
        assert_eq!(store.get("alpha").unwrap(), None);
    }

    #[test]
    fn invalid_key_fails_all_ops() {
        let store = Store::new();
        let n = notifier();
        assert!(store.put(&n, "!bad", "1").is_err());
        assert!(store.get("!bad").is_err());
        assert!(store.delete(&n, "!bad").is_err());
        assert!(!store.exists("!bad"));
    }

    #[test]
    fn show_emits_every_live_pair() {
        let store = Store::new();
        let n = notifier();
        store.put(&n, "alpha", "1").unwrap();
        store.put(&n, "beta", "2").unwrap();
        store.delete(&n, "alpha").unwrap();

        let mut buf = Vec::new();
        store.show(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("(beta,2)"));
        assert!(!text.contains("alpha"));
    }
}
