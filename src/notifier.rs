//! Fan-out notifier: the only component allowed to write to a session's
//! notification pipe on behalf of a mutation.

use std::sync::Arc;

use crate::protocol::format_notification;
use crate::sessions::SessionTable;

pub struct Notifier {
    sessions: Arc<SessionTable>,
}

impl Notifier {
    pub fn new(sessions: Arc<SessionTable>) -> Self {
        Self { sessions }
    }

    /// Publish `(key, value)` — or `(key, DELETED)` for deletes — to every
    /// active session currently subscribed to `key`. Called after the
    /// triggering Store mutation's shard lock has already been released.
    pub fn publish(&self, key: &str, value: &str) {
        let text = format_notification(key, value);
        self.sessions.notify_subscribers(key, &text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn publish_is_a_noop_with_no_subscribers() {
        let sessions = Arc::new(SessionTable::new());
        let notifier = Notifier::new(sessions);
        // Should not panic even though nobody is listening.
        notifier.publish("a", "1");
    }

    #[test]
    fn store_put_triggers_publish_path() {
        let sessions = Arc::new(SessionTable::new());
        let notifier = Notifier::new(sessions);
        let store = Store::new();
        store.put(&notifier, "a", "1").unwrap();
        store.delete(&notifier, "a").unwrap();
    }
}
