//! Session table: the fixed-capacity slot array shared by the Registrar,
//! every Session, the Notifier, and the admin reaper.
//!
//! A single `RwLock` over the whole slot vector plays the role of the
//! spec's "session-table lock": mutating operations (claim, subscribe,
//! unsubscribe, free) take it exclusively; the Notifier's fan-out scan
//! takes it as a reader, per the "as a reader if the implementation
//! distinguishes" clause.

use std::fs::File;
use std::io::Write as _;
use std::sync::RwLock;

use log::warn;

use crate::consts::MAX_SESSIONS;
use crate::error::{SubscribeOutcome, UnsubscribeOutcome};
use crate::store::Store;

/// Per-client state. Lives in a table slot; absent (`None` slot) means free.
pub struct SessionSlot {
    pub req_path: String,
    pub resp_path: String,
    pub notif_path: String,
    pub subscribed_keys: Vec<String>,
    /// Non-blocking write end of the notification pipe. `None` until the
    /// session's owner thread finishes opening its pipes (OPENING state).
    pub notif_sink: Option<File>,
    /// Set once a notification write has dropped a record for this session.
    pub lossy: bool,
}

impl SessionSlot {
    fn new(req_path: String, resp_path: String, notif_path: String) -> Self {
        Self {
            req_path,
            resp_path,
            notif_path,
            subscribed_keys: Vec::new(),
            notif_sink: None,
            lossy: false,
        }
    }
}

pub struct SessionTable {
    slots: RwLock<Vec<Option<SessionSlot>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_SESSIONS);
        slots.resize_with(MAX_SESSIONS, || None);
        Self {
            slots: RwLock::new(slots),
        }
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Option<SessionSlot>>> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Option<SessionSlot>>> {
        self.slots.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the first free slot for a newly-registering client. Returns
    /// `None` if the table is at `MAX_SESSIONS` capacity.
    pub fn claim(&self, req_path: String, resp_path: String, notif_path: String) -> Option<usize> {
        let mut slots = self.lock_write();
        let idx = slots.iter().position(|s| s.is_none())?;
        slots[idx] = Some(SessionSlot::new(req_path, resp_path, notif_path));
        Some(idx)
    }

    /// Attach the notification sink once the session's owner thread has
    /// opened it, completing the slot's transition out of OPENING.
    pub fn set_notif_sink(&self, id: usize, sink: File) {
        let mut slots = self.lock_write();
        if let Some(slot) = slots[id].as_mut() {
            slot.notif_sink = Some(sink);
        }
    }

    pub fn paths(&self, id: usize) -> Option<(String, String, String)> {
        let slots = self.lock_read();
        slots[id]
            .as_ref()
            .map(|s| (s.req_path.clone(), s.resp_path.clone(), s.notif_path.clone()))
    }

    /// Free the slot. Idempotent: freeing an already-free slot is a no-op.
    pub fn free(&self, id: usize) {
        let mut slots = self.lock_write();
        slots[id] = None;
    }

    pub fn subscribe(&self, id: usize, key: &str, store: &Store) -> SubscribeOutcome {
        let mut slots = self.lock_write();
        let Some(slot) = slots[id].as_mut() else {
            return SubscribeOutcome::NoSuchKey;
        };
        if !store.exists(key) {
            return SubscribeOutcome::NoSuchKey;
        }
        if slot.subscribed_keys.iter().any(|k| k == key) {
            return SubscribeOutcome::AlreadySubscribed;
        }
        if slot.subscribed_keys.len() >= crate::consts::MAX_SUBS_PER_SESSION {
            return SubscribeOutcome::Capacity;
        }
        slot.subscribed_keys.push(key.to_string());
        SubscribeOutcome::Subscribed
    }

    pub fn unsubscribe(&self, id: usize, key: &str) -> UnsubscribeOutcome {
        let mut slots = self.lock_write();
        let Some(slot) = slots[id].as_mut() else {
            return UnsubscribeOutcome::WasNotSubscribed;
        };
        let before = slot.subscribed_keys.len();
        slot.subscribed_keys.retain(|k| k != key);
        if slot.subscribed_keys.len() != before {
            UnsubscribeOutcome::Removed
        } else {
            UnsubscribeOutcome::WasNotSubscribed
        }
    }

    pub fn drop_all(&self, id: usize) {
        let mut slots = self.lock_write();
        if let Some(slot) = slots[id].as_mut() {
            slot.subscribed_keys.clear();
        }
    }

    /// Fan-out scan: write `text` to every active session subscribed to
    /// `key`. Runs under a single read lock for the whole scan so no sink
    /// can be concurrently closed by a `free()` mid-write (see concurrency
    /// notes on notifier fan-out races).
    pub fn notify_subscribers(&self, key: &str, text: &str) {
        let slots = self.lock_read();
        for slot in slots.iter().flatten() {
            if !slot.subscribed_keys.iter().any(|k| k == key) {
                continue;
            }
            let Some(sink) = slot.notif_sink.as_ref() else {
                continue;
            };
            if let Err(e) = (&*sink).write_all(text.as_bytes()) {
                if e.kind() == std::io::ErrorKind::WouldBlock {
                    warn!("notify: dropped record for {key:?}, subscriber not draining");
                } else {
                    warn!("notify: write failed for {key:?}: {e}");
                }
                // `lossy` is diagnostic only; flipping it needs the write
                // lock, which we deliberately don't escalate to mid-scan.
            }
        }
    }

    /// Snapshot every active slot's id and paths, for the admin reaper to
    /// tear down. Does not mutate the table; the reaper calls `free()` per
    /// id after closing/unlinking.
    pub fn active_sessions(&self) -> Vec<(usize, String, String, String)> {
        let slots = self.lock_read();
        slots
            .iter()
            .enumerate()
            .filter_map(|(id, s)| {
                s.as_ref()
                    .map(|s| (id, s.req_path.clone(), s.resp_path.clone(), s.notif_path.clone()))
            })
            .collect()
    }

    pub fn is_active(&self, id: usize) -> bool {
        let slots = self.lock_read();
        slots[id].is_some()
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_until_full_then_reports_full() {
        let table = SessionTable::new();
        for i in 0..MAX_SESSIONS {
            let id = table
                .claim(format!("/tmp/req{i}"), format!("/tmp/resp{i}"), format!("/tmp/notif{i}"))
                .expect("slot available");
            assert_eq!(id, i);
        }
        assert!(table
            .claim("/tmp/reqN".into(), "/tmp/respN".into(), "/tmp/notifN".into())
            .is_none());
    }

    #[test]
    fn freeing_a_slot_makes_it_reclaimable() {
        let table = SessionTable::new();
        let id = table.claim("r".into(), "p".into(), "n".into()).unwrap();
        table.free(id);
        let id2 = table.claim("r2".into(), "p2".into(), "n2".into()).unwrap();
        assert_eq!(id, id2);
    }

    #[test]
    fn subscribe_rejects_missing_key() {
        let table = SessionTable::new();
        let store = Store::new();
        let id = table.claim("r".into(), "p".into(), "n".into()).unwrap();
        assert_eq!(table.subscribe(id, "z", &store), SubscribeOutcome::NoSuchKey);
    }

    #[test]
    fn subscribe_then_duplicate_then_unsubscribe_twice() {
        let table = SessionTable::new();
        let store = Store::new();
        let notifier = crate::notifier::Notifier::new(std::sync::Arc::new(SessionTable::new()));
        store.put(&notifier, "a", "1").unwrap();
        let id = table.claim("r".into(), "p".into(), "n".into()).unwrap();

        assert_eq!(table.subscribe(id, "a", &store), SubscribeOutcome::Subscribed);
        assert_eq!(table.subscribe(id, "a", &store), SubscribeOutcome::AlreadySubscribed);
        assert_eq!(table.unsubscribe(id, "a"), UnsubscribeOutcome::Removed);
        assert_eq!(table.unsubscribe(id, "a"), UnsubscribeOutcome::WasNotSubscribed);
    }

    #[test]
    fn subscription_capacity_is_enforced() {
        let table = SessionTable::new();
        let store = Store::new();
        let notifier = crate::notifier::Notifier::new(std::sync::Arc::new(SessionTable::new()));
        let id = table.claim("r".into(), "p".into(), "n".into()).unwrap();

        for i in 0..crate::consts::MAX_SUBS_PER_SESSION {
            let key = format!("a{i}");
            store.put(&notifier, &key, "v").unwrap();
            assert_eq!(table.subscribe(id, &key, &store), SubscribeOutcome::Subscribed);
        }

        let overflow_key = "a_overflow";
        store.put(&notifier, overflow_key, "v").unwrap();
        assert_eq!(table.subscribe(id, overflow_key, &store), SubscribeOutcome::Capacity);
    }
}
