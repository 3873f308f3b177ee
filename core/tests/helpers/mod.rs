//! Shared fixtures for sync tests
//!
//! Every test node gets its own migrated SQLite database in a temporary
//! directory. [`InProcessCentral`] lets a store's scheduler talk to a central
//! node without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use ds_core::{
	config::SyncConfig,
	infra::{
		db::{
			entities::{self, customer, dent_price_rule, DentSize, ServerRole},
			Database,
		},
		sync::{
			sync_log_entity, NodeIdentity, Result, SyncAction, SyncLogModel, TransactionManager,
		},
	},
	service::sync::{
		CentralClient, ChangeRecord, DownloadQuery, DownloadResponse, SyncService, UploadRequest,
		UploadResponse,
	},
};
use sea_orm::{EntityTrait, QueryOrder};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const STORE_TYPE: &str = "retail";

/// One node with its own database
pub struct TestNode {
	pub node_id: String,
	pub db: Database,
	pub tm: Arc<TransactionManager>,
	pub sync: Arc<SyncService>,
	_dir: TempDir,
}

impl TestNode {
	pub async fn new(node_id: &str) -> anyhow::Result<Self> {
		Self::with_page_size(node_id, 100).await
	}

	pub async fn with_page_size(node_id: &str, page_size: u64) -> anyhow::Result<Self> {
		let dir = TempDir::new()?;
		let db = Database::create(&dir.path().join("node.db")).await?;
		db.migrate().await?;

		let tm = Arc::new(TransactionManager::new(
			db.conn().clone(),
			Arc::new(entities::registry()),
			node_id,
			SyncConfig::default().excluded_tables,
		));
		let sync = Arc::new(SyncService::new(tm.clone(), page_size));

		Ok(Self {
			node_id: node_id.to_string(),
			db,
			tm,
			sync,
			_dir: dir,
		})
	}

	/// Every ledger entry in delivery order
	pub async fn ledger(&self) -> anyhow::Result<Vec<SyncLogModel>> {
		Ok(sync_log_entity::Entity::find()
			.order_by_asc(sync_log_entity::Column::UpdatedAt)
			.order_by_asc(sync_log_entity::Column::Id)
			.all(self.db.conn())
			.await?)
	}

	pub async fn customer(&self, id: Uuid) -> anyhow::Result<Option<customer::Model>> {
		Ok(entities::Customer::find_by_id(id)
			.one(self.db.conn())
			.await?)
	}
}

/// A store of the shared test store type
pub fn store(id: &str) -> NodeIdentity {
	NodeIdentity::new(id, STORE_TYPE).with_role(Some(ServerRole::Store))
}

pub fn new_customer(name: &str) -> customer::Model {
	let now = Utc::now();
	customer::Model {
		id: Uuid::new_v4(),
		full_name: name.to_string(),
		phone: Some("+49 30 1234567".into()),
		email: None,
		created_at: now,
		updated_at: now,
	}
}

pub fn new_price_rule(size: DentSize, panel: &str, price_cents: i64) -> dent_price_rule::Model {
	dent_price_rule::Model {
		dent_size: size,
		panel: panel.to_string(),
		price_cents,
		active: true,
		updated_at: Utc::now(),
	}
}

/// Raw wire change with an arbitrary action string
pub fn change(
	table: &str,
	action: &str,
	record_id: &str,
	payload: Option<serde_json::Value>,
) -> ChangeRecord {
	ChangeRecord {
		table_name: Some(table.to_string()),
		action: Some(action.to_string()),
		record_id: Some(record_id.to_string()),
		updated_at: Some(Utc::now()),
		payload,
	}
}

/// Wire change carrying a full customer snapshot
pub fn customer_change(action: SyncAction, model: &customer::Model) -> ChangeRecord {
	let payload = serde_json::to_value(model).ok();
	ChangeRecord {
		payload: match action {
			SyncAction::Delete => None,
			_ => payload,
		},
		..change("customers", action.as_str(), &model.id.to_string(), None)
	}
}

/// Central reached through direct calls instead of HTTP
pub struct InProcessCentral {
	pub service: Arc<SyncService>,
	pub token: CancellationToken,
}

impl InProcessCentral {
	pub fn new(central: &TestNode) -> Self {
		Self {
			service: central.sync.clone(),
			token: CancellationToken::new(),
		}
	}
}

#[async_trait]
impl CentralClient for InProcessCentral {
	async fn upload(&self, request: &UploadRequest) -> Result<UploadResponse> {
		let node = NodeIdentity::new(
			request.store_id.clone().unwrap_or_default(),
			request.store_type.clone().unwrap_or_default(),
		)
		.with_role(request.server_role.as_deref().and_then(|r| r.parse().ok()))
		.with_address(request.server_ip.clone());

		self.service
			.process_upload(&node, request.changes.clone(), &self.token)
			.await
	}

	async fn download(&self, query: &DownloadQuery) -> Result<DownloadResponse> {
		let node = NodeIdentity::new(
			query.store_id.clone().unwrap_or_default(),
			query.store_type.clone().unwrap_or_default(),
		)
		.with_role(Some(ServerRole::Store));

		self.service
			.get_updates(&node, query.last_sync_time, &self.token)
			.await
	}

	fn endpoint(&self) -> &str {
		"in-process"
	}
}
