//! Persistent storage adapter using sled database

use botbrain_core::{BrainError, BrainResult, BrainSnapshot, BrainStorage, StoredData};
use chrono::{DateTime, Utc};
use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const SNAPSHOT_TREE: &str = "snapshots";
const META_TREE: &str = "meta";
const SAVED_AT_KEY: &[u8] = b"saved_at";

/// Storage adapter writing the brain snapshot as JSON under one key
pub struct SledStorage {
    db: Db,
    snapshots: Tree,
    meta: Tree,
    key: String,
}

impl SledStorage {
    pub fn open<P: AsRef<Path>>(path: P, key: impl Into<String>) -> BrainResult<Self> {
        let db = sled::open(path).map_err(storage_err)?;
        let snapshots = db.open_tree(SNAPSHOT_TREE).map_err(storage_err)?;
        let meta = db.open_tree(META_TREE).map_err(storage_err)?;

        Ok(Self {
            db,
            snapshots,
            meta,
            key: key.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw stored JSON, if any
    pub fn raw(&self) -> BrainResult<Option<String>> {
        match self.snapshots.get(self.key.as_bytes()).map_err(storage_err)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| BrainError::Storage(e.to_string())),
            None => Ok(None),
        }
    }

    /// When the snapshot was last written
    pub fn last_saved_at(&self) -> BrainResult<Option<DateTime<Utc>>> {
        let Some(bytes) = self.meta.get(self.saved_at_key()).map_err(storage_err)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        DateTime::parse_from_rfc3339(&text)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| BrainError::Storage(format!("corrupt save timestamp: {}", e)))
    }

    fn saved_at_key(&self) -> Vec<u8> {
        let mut key = SAVED_AT_KEY.to_vec();
        key.push(b':');
        key.extend_from_slice(self.key.as_bytes());
        key
    }
}

impl BrainStorage for SledStorage {
    fn name(&self) -> &str {
        "sled"
    }

    fn load(&self) -> BrainResult<Option<StoredData>> {
        match self.snapshots.get(self.key.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn store(&self, snapshot: &BrainSnapshot) -> BrainResult<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.snapshots
            .insert(self.key.as_bytes(), bytes)
            .map_err(storage_err)?;
        self.meta
            .insert(self.saved_at_key(), Utc::now().to_rfc3339().as_bytes())
            .map_err(storage_err)?;
        debug!("Stored snapshot under '{}' ({} users)", self.key, snapshot.users.len());
        Ok(())
    }

    fn flush(&self) -> BrainResult<()> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}

fn storage_err(err: sled::Error) -> BrainError {
    BrainError::Storage(err.to_string())
}

/// Thread-safe persistent storage wrapper
pub type SharedSledStorage = Arc<SledStorage>;

/// Create a shared persistent storage
pub fn create_sled_storage<P: AsRef<Path>>(path: P, key: &str) -> BrainResult<SharedSledStorage> {
    Ok(Arc::new(SledStorage::open(path, key)?))
}
