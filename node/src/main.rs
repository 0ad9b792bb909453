//! BOTBRAIN Node Binary

use botbrain_core::NodeConfig;
use botbrain_node::{init_logging, NodeBuilder};
use botbrain_state::SledStorage;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "botbrain-node")]
#[command(about = "BOTBRAIN Node - chat bot state container")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Data directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Autosave period in seconds
        #[arg(long)]
        save_interval: Option<u64>,

        /// Keep the timer running but skip autosaves
        #[arg(long)]
        no_autosave: bool,

        /// API listen address
        #[arg(long)]
        api_addr: Option<String>,

        /// Disable the HTTP API
        #[arg(long)]
        no_api: bool,
    },

    /// Print the stored brain snapshot
    Dump {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Data directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn load_config(path: Option<PathBuf>, data_dir: Option<PathBuf>) -> anyhow::Result<NodeConfig> {
    let mut config = match path {
        Some(path) => NodeConfig::from_json_file(&path)?,
        None => NodeConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            save_interval,
            no_autosave,
            api_addr,
            no_api,
        } => {
            let config = load_config(config, data_dir)?;
            init_logging(&config.log_level)?;

            info!("Starting BOTBRAIN Node...");

            let mut builder = NodeBuilder::new().config(config);
            if let Some(seconds) = save_interval {
                builder = builder.save_interval(seconds);
            }
            if no_autosave {
                builder = builder.auto_save(false);
            }
            if let Some(addr) = api_addr {
                builder = builder.api_addr(&addr);
            }
            if no_api {
                builder = builder.without_api();
            }

            let node = builder.build()?;
            node.start().await?;
        }

        Commands::Dump { config, data_dir } => {
            let config = load_config(config, data_dir)?;
            let storage = SledStorage::open(config.storage_path(), &config.storage.snapshot_key)?;

            match storage.raw()? {
                Some(json) => {
                    let value: serde_json::Value = serde_json::from_str(&json)?;
                    println!("{}", serde_json::to_string_pretty(&value)?);
                    if let Some(saved_at) = storage.last_saved_at()? {
                        eprintln!("Saved at {}", saved_at.to_rfc3339());
                    }
                }
                None => {
                    eprintln!("No brain data stored at {}", config.storage_path().display());
                }
            }
        }

        Commands::InitConfig { output } => {
            let json = NodeConfig::default().to_json()?;
            std::fs::write(&output, json)?;

            println!("Configuration saved to: {}", output.display());
        }
    }

    Ok(())
}
