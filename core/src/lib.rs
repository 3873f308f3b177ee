//! Dent shop sync core
//!
//! Storage, the change ledger and the store <-> central sync engine shared by
//! every node binary.

pub mod config;
pub mod infra;
pub mod service;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use config::AppConfig;
use infra::db::{entities, Database};
use infra::sync::{NodeIdentity, TransactionManager};
use service::sync::{CentralClient, HttpCentralClient, SyncScheduler, SyncService};
use service::Service;

pub use infra::db::entities::ServerRole;

/// A running node: database, ledger capture and sync engine
pub struct Node {
	pub config: AppConfig,
	pub db: Database,
	pub transactions: Arc<TransactionManager>,
	pub sync: Arc<SyncService>,
	pub scheduler: Arc<SyncScheduler>,
}

impl Node {
	/// Open and migrate the node database and wire up the sync engine
	pub async fn new(config: AppConfig) -> Result<Self> {
		config.validate()?;
		config.ensure_directories()?;

		let db = Database::create(&config.database_path())
			.await
			.context("Failed to open node database")?;
		db.migrate().await.context("Failed to migrate node database")?;

		let transactions = Arc::new(TransactionManager::new(
			db.conn().clone(),
			Arc::new(entities::registry()),
			config.node.node_id.clone(),
			&config.sync.excluded_tables,
		));
		let sync = Arc::new(SyncService::new(
			transactions.clone(),
			config.sync.page_size,
		));

		let client = match config.node.central_url.as_deref() {
			Some(url) if config.node.role == ServerRole::Store && !url.trim().is_empty() => {
				let client = HttpCentralClient::new(url.trim(), config.sync.request_timeout())?;
				Some(Arc::new(client) as Arc<dyn CentralClient>)
			}
			_ => None,
		};

		let identity = NodeIdentity::new(config.node.node_id.clone(), config.node.node_type.clone())
			.with_role(Some(config.node.role))
			.with_address(config.node.advertised_ip.clone());
		let scheduler = Arc::new(SyncScheduler::new(
			sync.clone(),
			client,
			identity,
			config.node.role,
			config.sync.interval(),
		));

		info!(
			node_id = %config.node.node_id,
			node_type = %config.node.node_type,
			role = config.node.role.as_str(),
			"Node initialized"
		);

		Ok(Self {
			config,
			db,
			transactions,
			sync,
			scheduler,
		})
	}

	/// Start background services
	pub async fn start(&self) -> Result<()> {
		if self.scheduler.is_enabled() {
			self.scheduler.start().await?;
			info!(service = self.scheduler.name(), "Service started");
		}
		Ok(())
	}

	/// Stop background services
	pub async fn shutdown(&self) -> Result<()> {
		if self.scheduler.is_running() {
			self.scheduler.stop().await?;
			info!(service = self.scheduler.name(), "Service stopped");
		}
		Ok(())
	}
}
