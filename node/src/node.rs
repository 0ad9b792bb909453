//! Bot node: runtime, API server and shutdown handling

use crate::api::start_api_server;
use crate::runtime::BotRuntime;
use botbrain_core::{BrainResult, BrainStorage, NodeConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Full BOTBRAIN node
pub struct BrainNode {
    runtime: Arc<BotRuntime>,
}

impl BrainNode {
    pub fn new(runtime: BotRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }

    /// Run until ctrl-c, then shut the brain down
    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting BOTBRAIN node...");

        self.runtime.start()?;

        let api_handle = if self.runtime.config().api.enabled {
            let api_runtime = self.runtime.clone();
            let api_addr = self.runtime.config().api.listen_addr.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = start_api_server(api_runtime, &api_addr).await {
                    error!("API server error: {}", e);
                }
            }))
        } else {
            None
        };

        info!("Node started successfully");
        info!(
            "Autosave every {}s ({})",
            self.runtime.config().brain.save_interval_secs,
            if self.runtime.brain().auto_save() { "enabled" } else { "disabled" }
        );

        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping node...");
            }
            Err(e) => {
                error!("Error waiting for shutdown signal: {}", e);
            }
        }

        if let Some(handle) = api_handle {
            handle.abort();
        }
        self.runtime.shutdown().await?;

        info!("Node stopped");

        Ok(())
    }

    pub fn runtime(&self) -> &Arc<BotRuntime> {
        &self.runtime
    }
}

/// Node builder for easier configuration
pub struct NodeBuilder {
    config: NodeConfig,
    storage: Option<Arc<dyn BrainStorage>>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
            storage: None,
        }
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist through this adapter instead of the sled database
    pub fn storage(mut self, storage: Arc<dyn BrainStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.config.data_dir = dir;
        self
    }

    pub fn save_interval(mut self, seconds: u64) -> Self {
        self.config.brain.save_interval_secs = seconds;
        self
    }

    pub fn auto_save(mut self, enabled: bool) -> Self {
        self.config.brain.auto_save = enabled;
        self
    }

    pub fn api_addr(mut self, addr: &str) -> Self {
        self.config.api.listen_addr = addr.to_string();
        self
    }

    pub fn without_api(mut self) -> Self {
        self.config.api.enabled = false;
        self
    }

    pub fn build(self) -> BrainResult<BrainNode> {
        let runtime = match self.storage {
            Some(storage) => BotRuntime::with_storage(self.config, storage)?,
            None => BotRuntime::open(self.config)?,
        };
        Ok(BrainNode::new(runtime))
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
