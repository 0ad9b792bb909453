//! Wiring between the brain and a persistence adapter

use botbrain_core::{BrainResult, BrainStorage, EventKind, SubscriptionId};
use std::sync::Arc;
use tracing::info;

use crate::brain::Brain;

/// Subscriptions held on behalf of a storage adapter
#[derive(Debug, Clone, Copy)]
pub struct StorageLink {
    pub save: SubscriptionId,
    pub close: SubscriptionId,
}

impl StorageLink {
    /// Stop forwarding brain events to the adapter
    pub fn disconnect(&self, brain: &Brain) {
        brain.unsubscribe(self.save);
        brain.unsubscribe(self.close);
    }
}

/// Load saved data into the brain, then persist every `save` and flush on
/// `close`.
pub fn connect_storage(brain: &Brain, storage: Arc<dyn BrainStorage>) -> BrainResult<StorageLink> {
    if let Some(data) = storage.load()? {
        brain.merge_data(data);
        info!("Loaded brain data from {} storage", storage.name());
    }

    let saver = Arc::clone(&storage);
    let save = brain.subscribe(EventKind::Save, move |event| match event.snapshot() {
        Some(snapshot) => saver.store(snapshot),
        None => Ok(()),
    });

    let flusher = Arc::clone(&storage);
    let close = brain.subscribe(EventKind::Close, move |_| flusher.flush());

    Ok(StorageLink { save, close })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use crate::persistent::SledStorage;
    use botbrain_core::{BrainConfig, BrainSnapshot, UserOptions};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_connect_loads_saved_data() {
        let mut saved = BrainSnapshot::default();
        saved.private.insert("motd".into(), json!("hi"));
        let storage = Arc::new(MemoryStorage::with_snapshot(saved));

        let brain = Brain::new(BrainConfig::default());
        connect_storage(&brain, storage).unwrap();

        assert_eq!(brain.get("motd"), Some(json!("hi")));
    }

    #[test]
    fn test_save_and_close_reach_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let brain = Brain::new(BrainConfig::default());
        connect_storage(&brain, storage.clone()).unwrap();

        brain.user_for_id("1", UserOptions::new().name("Ann"));
        brain.save();
        assert_eq!(storage.store_count(), 1);
        assert!(storage.latest().unwrap().users.contains_key("1"));

        brain.close();
        assert_eq!(storage.store_count(), 2);
        assert_eq!(storage.flush_count(), 1);
    }

    #[test]
    fn test_disconnect_stops_forwarding() {
        let storage = Arc::new(MemoryStorage::new());
        let brain = Brain::new(BrainConfig::default());
        let link = connect_storage(&brain, storage.clone()).unwrap();

        link.disconnect(&brain);
        brain.save();
        assert_eq!(storage.store_count(), 0);
    }

    #[test]
    fn test_sled_round_trip_through_brain() {
        let tmp = TempDir::new().unwrap();

        {
            let storage = Arc::new(SledStorage::open(tmp.path(), "brain").unwrap());
            let brain = Brain::new(BrainConfig::default());
            connect_storage(&brain, storage).unwrap();
            brain.set("count", 3);
            brain.user_for_id("u1", UserOptions::new().name("Lee").room("ops"));
            brain.close();
        }

        let storage = Arc::new(SledStorage::open(tmp.path(), "brain").unwrap());
        let brain = Brain::new(BrainConfig::default());
        connect_storage(&brain, storage).unwrap();

        assert_eq!(brain.get("count"), Some(json!(3)));
        let lee = brain.user_for_name("lee").unwrap().unwrap();
        assert_eq!(lee.read().room(), Some("ops"));
    }
}
