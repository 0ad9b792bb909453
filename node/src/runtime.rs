//! Host runtime owning the brain and its lifecycle signals

use botbrain_core::{
    BrainError, BrainResult, BrainStorage, EventKind, NodeConfig, RuntimeSignal,
};
use botbrain_state::{connect_storage, create_brain, create_sled_storage, SharedBrain, StorageLink};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Runtime hosting one brain
pub struct BotRuntime {
    config: NodeConfig,
    brain: SharedBrain,
    signals: broadcast::Sender<RuntimeSignal>,
    storage: Option<(Arc<dyn BrainStorage>, StorageLink)>,
    signal_task: Mutex<Option<JoinHandle<()>>>,
    started_at: DateTime<Utc>,
    last_saved_at: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl BotRuntime {
    /// Create a runtime without persistence
    pub fn new(config: NodeConfig) -> Self {
        let brain = create_brain(config.brain.clone());
        let (signals, _) = broadcast::channel(16);

        let last_saved_at = Arc::new(RwLock::new(None));
        let stamp = last_saved_at.clone();
        brain.subscribe(EventKind::Save, move |_| {
            *stamp.write() = Some(Utc::now());
            Ok(())
        });

        Self {
            config,
            brain,
            signals,
            storage: None,
            signal_task: Mutex::new(None),
            started_at: Utc::now(),
            last_saved_at,
        }
    }

    /// Create a runtime persisting through the given adapter
    pub fn with_storage(config: NodeConfig, storage: Arc<dyn BrainStorage>) -> BrainResult<Self> {
        let mut runtime = Self::new(config);
        let link = connect_storage(&runtime.brain, Arc::clone(&storage))?;
        runtime.storage = Some((storage, link));
        Ok(runtime)
    }

    /// Create a runtime persisting to the sled database in the data directory
    pub fn open(config: NodeConfig) -> BrainResult<Self> {
        let path = config.storage_path();
        std::fs::create_dir_all(&path)?;
        let storage = create_sled_storage(&path, &config.storage.snapshot_key)?;
        info!("Opened brain storage at {}", path.display());
        Self::with_storage(config, storage)
    }

    /// Attach the brain to lifecycle signals and announce `Running`
    pub fn start(&self) -> BrainResult<()> {
        let mut task = self.signal_task.lock();
        if task.is_some() {
            debug!("Runtime already started");
            return Ok(());
        }
        *task = Some(self.brain.attach(self.signals.subscribe())?);
        self.signals
            .send(RuntimeSignal::Running)
            .map_err(|_| BrainError::Internal("no brain listening for runtime signals".into()))?;
        info!("Runtime {} running", self.config.name);
        Ok(())
    }

    /// Announce `Shutdown` and wait for the brain to close
    pub async fn shutdown(&self) -> BrainResult<()> {
        let task = self.signal_task.lock().take();
        match task {
            Some(task) => {
                self.signals
                    .send(RuntimeSignal::Shutdown)
                    .map_err(|_| BrainError::Internal("brain stopped listening".into()))?;
                task.await
                    .map_err(|e| BrainError::Internal(format!("signal task failed: {}", e)))?;
            }
            // never started, close directly
            None => self.brain.close(),
        }
        info!("Runtime {} stopped", self.config.name);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.signal_task.lock().is_some()
    }

    pub fn brain(&self) -> &SharedBrain {
        &self.brain
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Name of the attached storage adapter
    pub fn storage_name(&self) -> Option<&str> {
        self.storage.as_ref().map(|(storage, _)| storage.name())
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.last_saved_at.read()
    }
}
