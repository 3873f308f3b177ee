//! Node configuration

use super::default_data_dir;
use crate::infra::db::entities::ServerRole;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const CONFIG_FILE: &str = "node.json";

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Logging level, used when `RUST_LOG` is not set
	pub log_level: String,

	/// Identity of this node
	pub node: NodeConfig,

	#[serde(default)]
	pub sync: SyncConfig,
}

/// Identity of this node in the topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
	/// Unique node id, e.g. "S1"
	pub node_id: String,

	/// Node type entries are addressed by, e.g. "retail"
	pub node_type: String,

	pub role: ServerRole,

	/// Base URL of the central node, stores only
	#[serde(default)]
	pub central_url: Option<String>,

	/// Address reported to central
	#[serde(default)]
	pub advertised_ip: Option<String>,
}

impl Default for NodeConfig {
	fn default() -> Self {
		Self {
			node_id: "central".to_string(),
			node_type: "central".to_string(),
			role: ServerRole::Central,
			central_url: None,
			advertised_ip: None,
		}
	}
}

/// Sync engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
	/// Seconds between scheduler cycles
	pub interval_secs: u64,

	/// Maximum ledger entries per download or push
	pub page_size: u64,

	/// Tables never written to the ledger
	pub excluded_tables: Vec<String>,

	/// Timeout for requests to central
	pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			interval_secs: 60 * 60,
			page_size: 100,
			excluded_tables: vec![
				"user_credentials".to_string(),
				"device_registrations".to_string(),
				"refresh_tokens".to_string(),
				"local_users".to_string(),
			],
			request_timeout_secs: 30,
		}
	}
}

impl SyncConfig {
	pub fn interval(&self) -> Duration {
		Duration::from_secs(self.interval_secs.max(1))
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs.max(1))
	}
}

impl AppConfig {
	/// Load configuration from the default location
	pub fn load() -> Result<Self> {
		let data_dir = default_data_dir()?;
		Self::load_from(&data_dir)
	}

	/// Load configuration from a specific data directory, creating it if missing
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let mut config: AppConfig = serde_json::from_str(&json)?;
			config.data_dir = data_dir.to_path_buf();

			if config.version < Self::target_version() {
				info!(
					"Upgrading config from v{} to v{}",
					config.version,
					Self::target_version()
				);
				config.version = Self::target_version();
				config.save()?;
			}

			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		}
	}

	/// Create default configuration with specific data directory
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			log_level: "info".to_string(),
			node: NodeConfig::default(),
			sync: SyncConfig::default(),
		}
	}

	pub fn target_version() -> u32 {
		1
	}

	/// Save configuration to disk
	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(())
	}

	/// Reject configurations the node cannot run with
	pub fn validate(&self) -> Result<()> {
		if self.node.node_id.trim().is_empty() {
			bail!("node.node_id must not be empty");
		}
		if self.node.node_type.trim().is_empty() {
			bail!("node.node_type must not be empty");
		}
		if self.sync.page_size == 0 {
			bail!("sync.page_size must be greater than zero");
		}
		Ok(())
	}

	/// Get the path for logs directory
	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	/// Get the path of the node database
	pub fn database_path(&self) -> PathBuf {
		self.data_dir.join("node.db")
	}

	/// Ensure all required directories exist
	pub fn ensure_directories(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;
		fs::create_dir_all(self.logs_dir())?;
		Ok(())
	}
}

impl Default for AppConfig {
	fn default() -> Self {
		let data_dir = default_data_dir().unwrap_or_else(|_| PathBuf::from("."));
		Self::default_with_dir(data_dir)
	}
}
