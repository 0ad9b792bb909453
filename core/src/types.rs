//! Core types for BOTBRAIN
//!
//! Defines the user records, the stored data shape and the event payloads
//! shared by the brain and its listeners.

use parking_lot::RwLock;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Opaque user identifier.
///
/// Chat adapters hand out both textual and numeric ids; numeric ids are
/// stored in their decimal form so `42` and `"42"` address the same user.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        UserId(id)
    }
}

impl From<&String> for UserId {
    fn from(id: &String) -> Self {
        UserId(id.clone())
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        UserId(id.to_string())
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId(id.to_string())
    }
}

/// Options used to construct a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A chat user known to the brain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Display name. Only absent when loaded that way from saved data.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Any other caller-supplied attributes
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl User {
    /// Build a user from an id and options. The name falls back to the id.
    pub fn new(id: UserId, options: UserOptions) -> Self {
        let name = options.name.unwrap_or_else(|| id.to_string());
        Self {
            id,
            name: Some(name),
            room: options.room,
            fields: options.fields,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }
}

/// Handle to a user owned by the brain
pub type SharedUser = Arc<RwLock<User>>;

/// Map keyed by user id that enumerates in insertion order.
///
/// Replacing the value of an existing id keeps its position.
#[derive(Clone)]
pub struct UserMap<T> {
    entries: Vec<(UserId, T)>,
    index: HashMap<UserId, usize>,
}

impl<T> UserMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key<Q>(&self, id: &Q) -> bool
    where
        UserId: Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        self.index.contains_key(id)
    }

    pub fn get<Q>(&self, id: &Q) -> Option<&T>
    where
        UserId: Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    /// Insert or replace, returning the previous value
    pub fn insert(&mut self, id: UserId, value: T) -> Option<T> {
        if let Some(&i) = self.index.get(&id) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, value));
        None
    }

    pub fn remove<Q>(&mut self, id: &Q) -> Option<T>
    where
        UserId: Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        let i = self.index.remove(id)?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &T)> {
        self.entries.iter().map(|(id, v)| (id, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &UserId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<T> Default for UserMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for UserMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for UserMap<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<T> FromIterator<(UserId, T)> for UserMap<T> {
    fn from_iter<I: IntoIterator<Item = (UserId, T)>>(iter: I) -> Self {
        let mut map = UserMap::new();
        for (id, value) in iter {
            map.insert(id, value);
        }
        map
    }
}

impl<T: Serialize> Serialize for UserMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (id, value) in self.iter() {
            map.serialize_entry(id, value)?;
        }
        map.end()
    }
}

struct UserMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for UserMapVisitor<T> {
    type Value = UserMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of user id to user")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = UserMap::new();
        while let Some((id, value)) = access.next_entry::<UserId, T>()? {
            map.insert(id, value);
        }
        Ok(map)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for UserMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(UserMapVisitor(PhantomData))
    }
}

/// Deep copy of the brain contents at one moment.
///
/// This is the persisted-state schema: storage adapters write it and hand
/// it back as [`StoredData`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrainSnapshot {
    #[serde(default)]
    pub users: UserMap<User>,
    #[serde(rename = "_private", alias = "private", default)]
    pub private: Map<String, Value>,
}

impl BrainSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Data pushed into the brain by a loader. Each present namespace replaces
/// the brain's own wholesale; absent ones are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<UserMap<User>>,
    #[serde(
        rename = "_private",
        alias = "private",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub private: Option<Map<String, Value>>,
}

impl StoredData {
    pub fn with_users(mut self, users: UserMap<User>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn with_private(mut self, private: Map<String, Value>) -> Self {
        self.private = Some(private);
        self
    }
}

impl From<BrainSnapshot> for StoredData {
    fn from(snapshot: BrainSnapshot) -> Self {
        Self {
            users: Some(snapshot.users),
            private: Some(snapshot.private),
        }
    }
}

/// Kinds of notification the brain publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Loaded,
    Save,
    Close,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Loaded => "loaded",
            EventKind::Save => "save",
            EventKind::Close => "close",
        };
        f.write_str(name)
    }
}

/// A notification delivered to subscribers
#[derive(Debug, Clone)]
pub enum BrainEvent {
    /// Data was set or merged in
    Loaded(Arc<BrainSnapshot>),
    /// Contents should be persisted
    Save(Arc<BrainSnapshot>),
    /// The brain closed after its final save
    Close,
}

impl BrainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BrainEvent::Loaded(_) => EventKind::Loaded,
            BrainEvent::Save(_) => EventKind::Save,
            BrainEvent::Close => EventKind::Close,
        }
    }

    pub fn snapshot(&self) -> Option<&BrainSnapshot> {
        match self {
            BrainEvent::Loaded(s) | BrainEvent::Save(s) => Some(s),
            BrainEvent::Close => None,
        }
    }
}

/// Handle returned by a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Lifecycle signals broadcast by the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeSignal {
    /// The host finished starting up
    Running,
    /// The host is going down
    Shutdown,
}
