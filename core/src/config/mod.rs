//! Node configuration management

use anyhow::{anyhow, Result};
use std::path::PathBuf;

pub mod app_config;

pub use app_config::{AppConfig, NodeConfig, SyncConfig};

/// Platform-specific data directory resolution
pub fn default_data_dir() -> Result<PathBuf> {
	#[cfg(target_os = "linux")]
	let dir = dirs::data_local_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("dentshop-sync");

	#[cfg(not(target_os = "linux"))]
	let dir = dirs::data_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("DentshopSync");

	Ok(dir)
}
