//! Download distribution
//!
//! Hands out pending ledger entries addressed to the caller's node type and
//! marks them delivered. Selection, the `synced` flips and the caller's sync
//! state commit together before the response is returned, so an entry is
//! delivered at most once per node type. A response lost in transit leaves a
//! gap, never a duplicate.

use chrono::{DateTime, Utc};
use sea_orm::{
	sea_query::{Condition, Expr},
	ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
	TransactionTrait,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::orders;
use super::protocol::{ChangeRecord, DownloadResponse, LegacyOrderView};
use super::SyncService;
use crate::infra::sync::{
	state, sync_log_entity, FieldMap, NodeIdentity, Result, SyncAction, SyncError, SyncLogModel,
};

impl SyncService {
	/// Pending changes for `node`, oldest first
	///
	/// Entries originating from the caller itself are never sent back to it.
	pub async fn get_updates(
		&self,
		node: &NodeIdentity,
		last_sync_time: Option<DateTime<Utc>>,
		token: &CancellationToken,
	) -> Result<DownloadResponse> {
		node.validate()?;

		let _write = self.tm.lock_writes().await;
		let txn = self.db().begin().await?;
		let entries = self.pending_entries(&txn, node, last_sync_time).await?;

		if token.is_cancelled() {
			return Err(SyncError::Cancelled);
		}

		if !entries.is_empty() {
			sync_log_entity::Entity::update_many()
				.col_expr(sync_log_entity::Column::Synced, Expr::value(true))
				.filter(sync_log_entity::Column::Id.is_in(entries.iter().map(|e| e.id)))
				.exec(&txn)
				.await?;
		}

		let mut changes = Vec::with_capacity(entries.len());
		let mut legacy_orders = Vec::new();
		for entry in &entries {
			let payload = match entry.action {
				SyncAction::Delete => None,
				_ => self.outbound_snapshot(&txn, entry).await,
			};

			if entry.action != SyncAction::Delete && orders::is_orders_table(&entry.table_name) {
				legacy_orders.push(LegacyOrderView::from_snapshot(
					&entry.record_id,
					entry.action,
					payload.as_ref(),
				));
			}

			changes.push(ChangeRecord::new(
				entry.table_name.clone(),
				entry.action,
				entry.record_id.clone(),
				entry.updated_at,
				payload.as_ref(),
			));
		}

		let server_time = Utc::now();
		let cursor = entries.last().map(|e| e.id.to_string());
		state::record_download(&txn, node, cursor, server_time).await?;
		txn.commit().await?;

		info!(
			node_id = %node.node_id,
			node_type = %node.node_type,
			delivered = changes.len(),
			"Served download"
		);

		Ok(DownloadResponse {
			store_id: node.node_id.clone(),
			store_type: node.node_type.clone(),
			server_id: Some(self.tm.node_id().to_string()),
			server_time,
			changes,
			orders: legacy_orders,
		})
	}

	async fn pending_entries(
		&self,
		txn: &DatabaseTransaction,
		node: &NodeIdentity,
		last_sync_time: Option<DateTime<Utc>>,
	) -> Result<Vec<SyncLogModel>> {
		use sync_log_entity::Column;

		let addressed = Condition::any()
			.add(Column::StoreType.is_null())
			.add(Column::StoreType.eq(""))
			.add(Column::StoreType.eq(node.node_type.as_str()));

		let mut query = sync_log_entity::Entity::find()
			.filter(addressed)
			.filter(Column::Synced.eq(false))
			.filter(Column::SourceServer.ne(node.node_id.as_str()));

		if let Some(since) = last_sync_time {
			query = query.filter(Column::UpdatedAt.gt(since));
		}

		Ok(query
			.order_by_asc(Column::UpdatedAt)
			.order_by_asc(Column::Id)
			.limit(self.page_size)
			.all(txn)
			.await?)
	}

	/// Stored snapshot of an entry, or the live record when none was stored
	async fn outbound_snapshot(
		&self,
		txn: &DatabaseTransaction,
		entry: &SyncLogModel,
	) -> Option<FieldMap> {
		match entry.snapshot() {
			Ok(Some(snapshot)) => return Some(snapshot),
			Ok(None) => {}
			Err(err) => {
				warn!(
					table = %entry.table_name,
					record_id = %entry.record_id,
					error = %err,
					"Stored payload is unreadable, re-reading record"
				);
			}
		}

		let live = match self.tm.registry().resolve(&entry.table_name) {
			Some(handler) => match handler.parse_key(&entry.record_id) {
				Ok(key) => handler.find(txn, &key).await,
				Err(err) => Err(err),
			},
			None => Err(SyncError::UnknownTable(entry.table_name.clone())),
		};

		match live {
			Ok(Some(snapshot)) => {
				debug!(table = %entry.table_name, record_id = %entry.record_id, "Re-read live record");
				Some(snapshot)
			}
			Ok(None) => {
				warn!(
					table = %entry.table_name,
					record_id = %entry.record_id,
					"Record no longer exists, sending change without payload"
				);
				None
			}
			Err(err) => {
				warn!(
					table = %entry.table_name,
					record_id = %entry.record_id,
					error = %err,
					"Could not re-read record, sending change without payload"
				);
				None
			}
		}
	}
}
