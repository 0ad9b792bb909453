//! In-memory storage adapter for testing and short-lived bots

use botbrain_core::{BrainResult, BrainSnapshot, BrainStorage, StoredData};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Keeps the last stored snapshot in memory
pub struct MemoryStorage {
    snapshot: RwLock<Option<BrainSnapshot>>,
    stores: AtomicUsize,
    flushes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
            stores: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        }
    }

    /// Start with previously saved contents
    pub fn with_snapshot(snapshot: BrainSnapshot) -> Self {
        let storage = Self::new();
        *storage.snapshot.write() = Some(snapshot);
        storage
    }

    /// The last stored snapshot
    pub fn latest(&self) -> Option<BrainSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl BrainStorage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self) -> BrainResult<Option<StoredData>> {
        Ok(self.snapshot.read().clone().map(StoredData::from))
    }

    fn store(&self, snapshot: &BrainSnapshot) -> BrainResult<()> {
        *self.snapshot.write() = Some(snapshot.clone());
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&self) -> BrainResult<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
