//! Store sync state registry
//!
//! Tracks, per remote node, when it last uploaded and downloaded. Rows are
//! created on first contact and never deleted. Concurrent requests from the
//! same node may race on the read-then-write, the last write wins.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, Set};
use tracing::debug;

use super::error::{Result, SyncError};
use crate::infra::db::entities::store_sync_state::{self, ServerRole};

/// The remote node on the other side of an upload or download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
	pub node_id: String,
	pub node_type: String,
	pub role: Option<ServerRole>,
	pub address: Option<String>,
}

impl NodeIdentity {
	pub fn new(node_id: impl Into<String>, node_type: impl Into<String>) -> Self {
		Self {
			node_id: node_id.into(),
			node_type: node_type.into(),
			role: None,
			address: None,
		}
	}

	pub fn with_role(mut self, role: Option<ServerRole>) -> Self {
		self.role = role;
		self
	}

	pub fn with_address(mut self, address: Option<String>) -> Self {
		self.address = address;
		self
	}

	/// Both id and type are required to address a node
	pub fn validate(&self) -> Result<()> {
		if self.node_id.trim().is_empty() {
			return Err(SyncError::Validation("storeId is required".into()));
		}
		if self.node_type.trim().is_empty() {
			return Err(SyncError::Validation("storeType is required".into()));
		}
		Ok(())
	}
}

/// Get or create the state row of a node
///
/// Role and address are replaced only when supplied and non-empty.
pub async fn ensure_state<C: ConnectionTrait>(
	db: &C,
	node: &NodeIdentity,
) -> Result<store_sync_state::Model> {
	node.validate()?;

	let address = node
		.address
		.as_deref()
		.map(str::trim)
		.filter(|a| !a.is_empty());
	let now = Utc::now();

	let existing =
		store_sync_state::Entity::find_by_id((node.node_id.clone(), node.node_type.clone()))
			.one(db)
			.await?;

	match existing {
		Some(state) => {
			let role_changed = node.role.is_some() && node.role != state.server_role;
			let address_changed = address.is_some() && address != state.server_ip.as_deref();
			if !role_changed && !address_changed {
				return Ok(state);
			}

			let mut active: store_sync_state::ActiveModel = state.into();
			if role_changed {
				active.server_role = Set(node.role);
			}
			if let Some(address) = address.filter(|_| address_changed) {
				active.server_ip = Set(Some(address.to_string()));
			}
			active.updated_at = Set(now);

			Ok(active.update(db).await?)
		}
		None => {
			debug!(
				node_id = %node.node_id,
				node_type = %node.node_type,
				"Creating sync state for new node"
			);

			let active = store_sync_state::ActiveModel {
				store_id: Set(node.node_id.clone()),
				store_type: Set(node.node_type.clone()),
				server_role: Set(node.role),
				server_ip: Set(address.map(str::to_string)),
				last_upload_time: Set(None),
				last_download_time: Set(None),
				last_cursor: Set(None),
				created_at: Set(now),
				updated_at: Set(now),
			};

			Ok(active.insert(db).await?)
		}
	}
}

/// Stamp a completed upload
pub async fn record_upload<C: ConnectionTrait>(
	db: &C,
	node: &NodeIdentity,
	at: DateTime<Utc>,
) -> Result<store_sync_state::Model> {
	let state = ensure_state(db, node).await?;

	let mut active: store_sync_state::ActiveModel = state.into();
	active.last_upload_time = Set(Some(at));
	active.updated_at = Set(at);

	Ok(active.update(db).await?)
}

/// Stamp a completed download. The cursor is kept when nothing was delivered.
pub async fn record_download<C: ConnectionTrait>(
	db: &C,
	node: &NodeIdentity,
	cursor: Option<String>,
	at: DateTime<Utc>,
) -> Result<store_sync_state::Model> {
	let state = ensure_state(db, node).await?;

	let mut active: store_sync_state::ActiveModel = state.into();
	active.last_download_time = Set(Some(at));
	if let Some(cursor) = cursor {
		active.last_cursor = Set(Some(cursor));
	}
	active.updated_at = Set(at);

	Ok(active.update(db).await?)
}

pub async fn get_state<C: ConnectionTrait>(
	db: &C,
	node_id: &str,
	node_type: &str,
) -> Result<Option<store_sync_state::Model>> {
	Ok(
		store_sync_state::Entity::find_by_id((node_id.to_string(), node_type.to_string()))
			.one(db)
			.await?,
	)
}

/// Every known node, ordered by id and type
pub async fn list_states<C: ConnectionTrait>(db: &C) -> Result<Vec<store_sync_state::Model>> {
	Ok(store_sync_state::Entity::find()
		.order_by_asc(store_sync_state::Column::StoreId)
		.order_by_asc(store_sync_state::Column::StoreType)
		.all(db)
		.await?)
}
