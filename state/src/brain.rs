//! The brain: users, private key/value data and lifecycle notifications

use botbrain_core::{
    BrainConfig, BrainError, BrainEvent, BrainResult, BrainSnapshot, EventKind, RuntimeSignal,
    SharedUser, StoredData, SubscriptionId, UserMap,
};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::autosave::SaveTimer;
use crate::events::{DispatchReport, EventBus};

/// Live brain contents
#[derive(Default)]
pub struct BrainData {
    pub users: UserMap<SharedUser>,
    pub private: Map<String, Value>,
}

impl BrainData {
    /// Deep copy of the current contents
    pub fn snapshot(&self) -> BrainSnapshot {
        let users = self
            .users
            .iter()
            .map(|(id, user)| (id.clone(), user.read().clone()))
            .collect();
        BrainSnapshot {
            users,
            private: self.private.clone(),
        }
    }
}

/// In-process state container for a chat bot.
///
/// All operations run synchronously. No internal lock is held while event
/// handlers run, so handlers may call back into the brain.
pub struct Brain {
    pub(crate) config: BrainConfig,
    pub(crate) data: RwLock<BrainData>,
    pub(crate) events: EventBus,
    pub(crate) auto_save: AtomicBool,
    pub(crate) save_timer: Mutex<Option<SaveTimer>>,
    /// Held by `close` and by each autosave tick so they never interleave
    pub(crate) lifecycle: ReentrantMutex<()>,
    closed: AtomicBool,
}

impl Brain {
    pub fn new(config: BrainConfig) -> Self {
        let auto_save = config.auto_save;
        Self {
            config,
            data: RwLock::new(BrainData::default()),
            events: EventBus::new(),
            auto_save: AtomicBool::new(auto_save),
            save_timer: Mutex::new(None),
            lifecycle: ReentrantMutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Store one key/value pair in the private namespace
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.data.write().private.insert(key.into(), value.into());
        self.emit_loaded();
        self
    }

    /// Shallow-merge a batch of pairs into the private namespace
    pub fn set_many<I>(&self, pairs: I) -> &Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        {
            let mut data = self.data.write();
            for (key, value) in pairs {
                data.private.insert(key, value);
            }
        }
        self.emit_loaded();
        self
    }

    /// Look up a private value.
    ///
    /// Falsy values (`null`, `false`, `0`, `""`) read back as `None`, the
    /// same as a missing key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data
            .read()
            .private
            .get(key)
            .filter(|value| is_truthy(value))
            .cloned()
    }

    /// Delete a private key if present
    pub fn remove(&self, key: &str) -> &Self {
        self.data.write().private.remove(key);
        self
    }

    /// Replace each namespace present in `incoming` wholesale, then emit
    /// `loaded`. Used by persistence adapters after reading saved state.
    pub fn merge_data(&self, incoming: StoredData) {
        {
            let mut data = self.data.write();
            if let Some(users) = incoming.users {
                data.users = users
                    .iter()
                    .map(|(id, user)| (id.clone(), Arc::new(RwLock::new(user.clone()))))
                    .collect();
            }
            if let Some(private) = incoming.private {
                data.private = private;
            }
            debug!(
                "Merged data: {} users, {} private keys",
                data.users.len(),
                data.private.len()
            );
        }
        self.emit_loaded();
    }

    /// Deep copy of the current contents
    pub fn snapshot(&self) -> BrainSnapshot {
        self.data.read().snapshot()
    }

    /// Ask listeners to persist the current contents
    pub fn save(&self) {
        let snapshot = Arc::new(self.snapshot());
        self.emit(BrainEvent::Save(snapshot));
    }

    /// Stop the save timer, save one last time and notify `close`.
    ///
    /// Waits for an autosave tick in progress to finish. The brain should
    /// not be used afterwards.
    pub fn close(&self) {
        let _lifecycle = self.lifecycle.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Brain closed more than once");
        }
        self.cancel_save_interval();
        self.save();
        self.emit(BrainEvent::Close);
        info!("Brain closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Register a closure for one event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&BrainEvent) -> BrainResult<()> + Send + Sync + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    pub fn subscribe_channel(
        &self,
        kind: EventKind,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<BrainEvent>) {
        self.events.subscribe_channel(kind)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Follow host lifecycle signals: start autosave on `Running`, close on
    /// `Shutdown`.
    pub fn attach(
        self: &Arc<Self>,
        mut signals: broadcast::Receiver<RuntimeSignal>,
    ) -> BrainResult<JoinHandle<()>> {
        let handle = Handle::try_current().map_err(|_| BrainError::NoRuntime)?;
        let brain = Arc::downgrade(self);
        let period = self.config.save_interval_secs;

        Ok(handle.spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(RuntimeSignal::Running) => {
                        let Some(brain) = brain.upgrade() else { break };
                        if let Err(e) = brain.reset_save_interval(period) {
                            warn!("Failed to start autosave: {}", e);
                        }
                    }
                    Ok(RuntimeSignal::Shutdown) => {
                        if let Some(brain) = brain.upgrade() {
                            brain.close();
                        }
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Missed {} runtime signals", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Stopped following runtime signals");
        }))
    }

    pub(crate) fn emit(&self, event: BrainEvent) -> DispatchReport {
        let report = self.events.emit(&event);
        if !report.is_clean() {
            warn!(
                "{} of {} {} handlers failed",
                report.failures.len(),
                report.delivered,
                event.kind()
            );
        }
        report
    }

    fn emit_loaded(&self) {
        let snapshot = Arc::new(self.snapshot());
        self.emit(BrainEvent::Loaded(snapshot));
    }
}

impl Default for Brain {
    fn default() -> Self {
        Self::new(BrainConfig::default())
    }
}

/// Shared brain handle
pub type SharedBrain = Arc<Brain>;

/// Create a shared brain
pub fn create_brain(config: BrainConfig) -> SharedBrain {
    Arc::new(Brain::new(config))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
pub(crate) fn user_map<I>(users: I) -> UserMap<botbrain_core::User>
where
    I: IntoIterator<Item = botbrain_core::User>,
{
    users.into_iter().map(|u| (u.id.clone(), u)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use botbrain_core::{User, UserId, UserOptions};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counter(brain: &Brain, kind: EventKind) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        brain.subscribe(kind, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        count
    }

    #[test]
    fn test_set_get_remove() {
        let brain = Brain::default();

        brain.set("greeting", "hello");
        assert_eq!(brain.get("greeting"), Some(json!("hello")));

        brain.remove("greeting");
        assert_eq!(brain.get("greeting"), None);

        // removing a missing key is a no-op
        brain.remove("greeting");
    }

    #[test]
    fn test_set_chains() {
        let brain = Brain::default();
        brain.set("a", 1).set("b", 2).remove("a");
        assert_eq!(brain.get("a"), None);
        assert_eq!(brain.get("b"), Some(json!(2)));
    }

    #[test]
    fn test_set_many_is_shallow_merge() {
        let brain = Brain::default();
        brain.set_many(vec![("a".to_string(), json!(1)), ("b".to_string(), json!(2))]);
        brain.set_many(vec![("b".to_string(), json!(3))]);

        assert_eq!(brain.get("a"), Some(json!(1)));
        assert_eq!(brain.get("b"), Some(json!(3)));
    }

    #[test]
    fn test_set_many_accepts_json_object() {
        let brain = Brain::default();
        let Value::Object(batch) = json!({"x": {"nested": true}, "y": [1, 2]}) else {
            unreachable!()
        };
        brain.set_many(batch);
        assert_eq!(brain.get("x"), Some(json!({"nested": true})));
        assert_eq!(brain.get("y"), Some(json!([1, 2])));
    }

    #[test]
    fn test_falsy_values_read_as_absent() {
        let brain = Brain::default();
        brain.set("zero", 0).set("empty", "").set("no", false).set("nothing", Value::Null);

        assert_eq!(brain.get("zero"), None);
        assert_eq!(brain.get("empty"), None);
        assert_eq!(brain.get("no"), None);
        assert_eq!(brain.get("nothing"), None);

        // still stored
        assert!(brain.snapshot().private.contains_key("zero"));
    }

    #[test]
    fn test_set_emits_loaded_with_snapshot() {
        let brain = Brain::default();
        let (_, mut rx) = brain.subscribe_channel(EventKind::Loaded);

        brain.set("k", "v");

        match rx.try_recv() {
            Ok(BrainEvent::Loaded(snapshot)) => assert_eq!(snapshot.private["k"], "v"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_set_many_emits_one_loaded() {
        let brain = Brain::default();
        let (_, mut rx) = brain.subscribe_channel(EventKind::Loaded);

        brain.set_many(vec![("a".to_string(), json!(1)), ("b".to_string(), json!("two"))]);

        match rx.try_recv() {
            Ok(BrainEvent::Loaded(snapshot)) => {
                assert_eq!(snapshot.private["a"], 1);
                assert_eq!(snapshot.private["b"], "two");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_emits_nothing() {
        let brain = Brain::default();
        brain.set("k", "v");
        let loaded = counter(&brain, EventKind::Loaded);
        brain.remove("k");
        assert_eq!(loaded.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_merge_data_replaces_namespaces() {
        let brain = Brain::default();
        brain.set("old", "value");
        brain.user_for_id("1", UserOptions::new().name("Old"));

        let loaded = counter(&brain, EventKind::Loaded);

        let mut private = Map::new();
        private.insert("new".into(), json!("value"));
        let users = user_map(vec![User::new(UserId::from("2"), UserOptions::new().name("New"))]);
        brain.merge_data(StoredData::default().with_users(users).with_private(private));

        assert_eq!(loaded.load(Ordering::SeqCst), 1);
        assert_eq!(brain.get("old"), None);
        assert_eq!(brain.get("new"), Some(json!("value")));

        let users = brain.users();
        assert!(!users.contains_key("1"));
        assert_eq!(users.get("2").unwrap().read().name(), Some("New"));
    }

    #[test]
    fn test_merge_data_keeps_absent_namespaces() {
        let brain = Brain::default();
        brain.set("kept", "yes");

        brain.merge_data(StoredData::default().with_users(UserMap::new()));
        assert_eq!(brain.get("kept"), Some(json!("yes")));
    }

    #[test]
    fn test_merge_data_is_shallow() {
        let brain = Brain::default();
        brain.set("conf", json!({"a": 1, "b": 2}));

        let mut private = Map::new();
        private.insert("conf".into(), json!({"b": 3}));
        brain.merge_data(StoredData::default().with_private(private));

        assert_eq!(brain.get("conf"), Some(json!({"b": 3})));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let brain = Brain::default();
        let user = brain.user_for_id("1", UserOptions::new().name("Ann"));
        let snapshot = brain.snapshot();

        user.write().name = Some("Changed".into());
        assert_eq!(snapshot.users.get("1").unwrap().name(), Some("Ann"));
    }

    #[test]
    fn test_save_and_close_events() {
        let brain = Brain::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Save, EventKind::Close] {
            let order = order.clone();
            brain.subscribe(kind, move |event| {
                order.lock().push(event.kind());
                Ok(())
            });
        }

        brain.save();
        brain.close();

        assert_eq!(
            *order.lock(),
            vec![EventKind::Save, EventKind::Save, EventKind::Close]
        );
        assert!(brain.is_closed());
    }

    #[test]
    fn test_handler_may_read_brain() {
        let brain = create_brain(BrainConfig::default());
        let seen = Arc::new(Mutex::new(None));
        let (inner, out) = (Arc::downgrade(&brain), seen.clone());
        brain.subscribe(EventKind::Loaded, move |_| {
            if let Some(brain) = inner.upgrade() {
                *out.lock() = brain.get("k");
            }
            Ok(())
        });

        brain.set("k", "v");
        assert_eq!(*seen.lock(), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_attach_follows_runtime_signals() {
        let brain = create_brain(BrainConfig::default());
        let (tx, rx) = broadcast::channel(4);
        let task = brain.attach(rx).unwrap();
        let (_, mut closes) = brain.subscribe_channel(EventKind::Close);

        tx.send(RuntimeSignal::Running).unwrap();
        tokio::task::yield_now().await;
        tx.send(RuntimeSignal::Shutdown).unwrap();
        task.await.unwrap();

        assert!(brain.is_closed());
        assert!(!brain.has_save_timer());
        assert!(matches!(closes.try_recv(), Ok(BrainEvent::Close)));
    }

    #[test]
    fn test_attach_requires_runtime() {
        let brain = create_brain(BrainConfig::default());
        let (_tx, rx) = broadcast::channel(1);
        assert!(matches!(brain.attach(rx), Err(BrainError::NoRuntime)));
    }
}
