use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cycle::BATCH_SIZE;

const DEFAULT_CONFIG_DIR: &str = ".robots";
const DEFAULT_CONFIG_FILE: &str = "config.json";

/// One robot: a (collection, pool, blockchain, signer) tuple driven by its own scheduler loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotConfig {
    pub collection_id: String,
    pub signer_keyfile_name: String,
    pub signer_password_file_name: String,
    pub terminus_pool_id: u64,
    pub value_to_claim: u64,
    pub blockchain: String,
}

impl RobotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.collection_id.trim().is_empty() {
            anyhow::bail!("collection_id is empty");
        }
        if self.blockchain.trim().is_empty() {
            anyhow::bail!("blockchain is empty for collection {}", self.collection_id);
        }
        if self.signer_keyfile_name.is_empty() || self.signer_password_file_name.is_empty() {
            anyhow::bail!("signer keyfile and password file must be set for collection {}", self.collection_id);
        }
        if self.value_to_claim == 0 {
            anyhow::bail!("value_to_claim must be positive for collection {}", self.collection_id);
        }
        Ok(())
    }
}

/// Load the JSON array of robot configurations
pub fn load_robot_configs(path: &Path) -> Result<Vec<RobotConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Unable to read robots config {}", path.display()))?;
    let configs: Vec<RobotConfig> = serde_json::from_str(&raw)
        .with_context(|| format!("Unable to parse robots config {}", path.display()))?;

    for config in &configs {
        config.validate()?;
    }

    Ok(configs)
}

/// Where the robots configuration lives and what already exists on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPlacement {
    pub config_dir_path: PathBuf,
    pub config_dir_exists: bool,
    pub config_path: PathBuf,
    pub config_exists: bool,
}

impl ConfigPlacement {
    /// Resolve the provided path, or `~/.robots/config.json` when none is given.
    pub fn prepare(provided: Option<&str>) -> Result<Self> {
        let (config_dir_path, config_path) = match provided.filter(|p| !p.is_empty()) {
            Some(path) => {
                let config_path = PathBuf::from(path.trim_end_matches('/'));
                let config_dir_path = config_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (config_dir_path, config_path)
            }
            None => {
                let home = std::env::var_os("HOME")
                    .context("Unable to find user home directory")?;
                let config_dir_path = PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
                let config_path = config_dir_path.join(DEFAULT_CONFIG_FILE);
                (config_dir_path, config_path)
            }
        };

        // An empty parent means a bare file name in the working directory
        let config_dir_path = if config_dir_path.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            config_dir_path
        };

        Ok(Self {
            config_dir_exists: config_dir_path.exists(),
            config_exists: config_path.exists(),
            config_dir_path,
            config_path,
        })
    }
}

/// Create the config directory and an empty robots list if they are missing.
pub fn generate_default_config(placement: &ConfigPlacement) -> Result<()> {
    if !placement.config_dir_exists {
        std::fs::create_dir_all(&placement.config_dir_path).with_context(|| {
            format!("Unable to create directory {}", placement.config_dir_path.display())
        })?;
        info!("Config directory created at: {}", placement.config_dir_path.display());
    }

    if !placement.config_exists {
        let empty: Vec<RobotConfig> = Vec::new();
        let content = serde_json::to_string(&empty)?;
        std::fs::write(&placement.config_path, content).with_context(|| {
            format!("Unable to write default config to {}", placement.config_path.display())
        })?;
        info!("Created default configuration at {}", placement.config_path.display());
    }

    Ok(())
}

/// Runtime tuning shared by every robot
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub min_sleep_seconds: u64,
    pub max_sleep_seconds: u64,
    pub error_step_seconds: u64,
    pub idle_step_seconds: u64,
    pub productive_step_seconds: u64,
    pub batch_size: usize,
    pub search_timeout_seconds: u64,
    pub touch_timeout_seconds: u64,
    pub cycle_timeout_seconds: u64,
    pub max_restarts: u32,
    pub restart_base_delay_seconds: u64,
    pub pending_tx_limit: usize,
}

impl Settings {
    /// Defaults, then optional `robots.toml`, then `ROBOTS_*` environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenv::dotenv().ok();
        let builder = Self::defaults()?
            .add_source(config::File::with_name("robots").required(false))
            .add_source(
                config::Environment::with_prefix("ROBOTS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overlaid with a single settings file, without environment lookups.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let settings: Settings = Self::defaults()?
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = config::Config::builder()
            .set_default("min_sleep_seconds", 5)?
            .set_default("max_sleep_seconds", 60)?
            .set_default("error_step_seconds", 10)?
            .set_default("idle_step_seconds", 1)?
            .set_default("productive_step_seconds", 10)?
            .set_default("batch_size", BATCH_SIZE as i64)?
            .set_default("search_timeout_seconds", 15)?
            .set_default("touch_timeout_seconds", 10)?
            .set_default("cycle_timeout_seconds", 120)?
            .set_default("max_restarts", 5)?
            .set_default("restart_base_delay_seconds", 5)?
            .set_default("pending_tx_limit", 64)?;
        Ok(builder)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_sleep_seconds == 0 {
            anyhow::bail!("min_sleep_seconds must be positive");
        }
        if self.min_sleep_seconds > self.max_sleep_seconds {
            anyhow::bail!(
                "min_sleep_seconds ({}) must not exceed max_sleep_seconds ({})",
                self.min_sleep_seconds,
                self.max_sleep_seconds
            );
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be positive");
        }
        if self.search_timeout_seconds == 0
            || self.touch_timeout_seconds == 0
            || self.cycle_timeout_seconds == 0
        {
            anyhow::bail!("timeouts must be positive");
        }
        // The cycle bound covers the search request plus the balance check and mint
        if self.cycle_timeout_seconds <= self.search_timeout_seconds {
            anyhow::bail!(
                "cycle_timeout_seconds ({}) must exceed search_timeout_seconds ({})",
                self.cycle_timeout_seconds,
                self.search_timeout_seconds
            );
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_sleep_seconds: 5,
            max_sleep_seconds: 60,
            error_step_seconds: 10,
            idle_step_seconds: 1,
            productive_step_seconds: 10,
            batch_size: BATCH_SIZE,
            search_timeout_seconds: 15,
            touch_timeout_seconds: 10,
            cycle_timeout_seconds: 120,
            max_restarts: 5,
            restart_base_delay_seconds: 5,
            pending_tx_limit: 64,
        }
    }
}
