//! Upload ingestion
//!
//! Applies a batch of changes uploaded by another node. Each record runs in
//! its own savepoint: a failing record is rolled back, logged and counted as
//! ignored, and never aborts the batch. Ledger entries for applied records and
//! the uploader's sync state are written in the same commit as the records.
//!
//! Imported entries keep the uploader as `source_server` and carry no
//! `store_type`, so every other node of any type receives them.

use chrono::Utc;
use sea_orm::{DatabaseTransaction, EntityTrait, TransactionTrait};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::orders;
use super::protocol::{ChangeAction, ChangeRecord, UploadResponse};
use super::SyncService;
use crate::infra::sync::{
	state, sync_log_entity, FieldMap, NewSyncLogEntry, NodeIdentity, Result, SyncError,
};

/// A change that was applied and must be recorded in the ledger
struct AppliedRecord {
	table_name: String,
	record_id: String,
	action: ChangeAction,
	snapshot: Option<FieldMap>,
}

impl SyncService {
	/// Apply a batch uploaded by `node`
	///
	/// Only a missing node id or node type fails the call. Cancellation rolls
	/// back the whole batch.
	pub async fn process_upload(
		&self,
		node: &NodeIdentity,
		changes: Vec<ChangeRecord>,
		token: &CancellationToken,
	) -> Result<UploadResponse> {
		node.validate()?;

		let _write = self.tm.lock_writes().await;
		let txn = self.db().begin().await?;
		let mut response = UploadResponse::default();
		let mut staged = Vec::new();

		for change in &changes {
			if token.is_cancelled() {
				warn!(node_id = %node.node_id, "Upload cancelled, rolling back batch");
				return Err(SyncError::Cancelled);
			}

			let savepoint = txn.begin().await?;
			match self.apply_change(&savepoint, node, change).await {
				Ok(applied) => {
					savepoint.commit().await?;
					response.processed_count += 1;
					staged.push(
						NewSyncLogEntry {
							table_name: applied.table_name,
							record_id: applied.record_id,
							action: applied.action.ledger_action(),
							updated_at: Utc::now(),
							source_server: node.node_id.clone(),
							store_type: None,
							payload: applied.snapshot,
						}
						.into_active_model()?,
					);
				}
				Err(err) => {
					savepoint.rollback().await?;
					response.ignored_count += 1;
					warn!(
						node_id = %node.node_id,
						table = change.table_name.as_deref().unwrap_or_default(),
						record_id = change.record_id.as_deref().unwrap_or_default(),
						error = %err,
						"Ignoring uploaded change"
					);
				}
			}
		}

		if !staged.is_empty() {
			sync_log_entity::Entity::insert_many(staged)
				.exec_without_returning(&txn)
				.await?;
		}
		state::record_upload(&txn, node, Utc::now()).await?;
		txn.commit().await?;

		info!(
			node_id = %node.node_id,
			node_type = %node.node_type,
			processed = response.processed_count,
			ignored = response.ignored_count,
			"Processed upload"
		);

		Ok(response)
	}

	async fn apply_change(
		&self,
		txn: &DatabaseTransaction,
		node: &NodeIdentity,
		change: &ChangeRecord,
	) -> Result<AppliedRecord> {
		let table_name = non_empty(change.table_name.as_deref())
			.ok_or_else(|| SyncError::Validation("missing tableName".into()))?;
		let raw_action = non_empty(change.action.as_deref())
			.ok_or_else(|| SyncError::Validation("missing action".into()))?;
		let record_id = non_empty(change.record_id.as_deref())
			.ok_or_else(|| SyncError::Validation("missing recordId".into()))?;
		let action = ChangeAction::from_str(raw_action)
			.map_err(|_| SyncError::Validation(format!("unknown action '{}'", raw_action)))?;

		if self.tm.is_excluded(table_name) {
			return Err(SyncError::Validation(format!(
				"table '{}' is not synchronized",
				table_name
			)));
		}

		if orders::is_orders_table(table_name) && action != ChangeAction::Delete {
			let payload = change.snapshot()?.unwrap_or_default();
			return orders::merge_order(&self.tm, txn, node, record_id, payload)
				.await
				.map(|snapshot| AppliedRecord {
					table_name: orders::ORDERS_TABLE.to_string(),
					record_id: orders::order_uid(&snapshot, record_id),
					action,
					snapshot: Some(snapshot),
				});
		}

		let handler = self
			.tm
			.registry()
			.resolve(table_name)
			.ok_or_else(|| SyncError::UnknownTable(table_name.to_string()))?;
		let key = handler.parse_key(record_id)?;

		let snapshot = match action {
			ChangeAction::Delete => {
				if !handler.delete(txn, &key).await? {
					debug!(table = table_name, record_id, "Deleted record was already absent");
				}
				None
			}
			ChangeAction::Insert | ChangeAction::Update | ChangeAction::Upsert => {
				let mut payload = change
					.snapshot()?
					.filter(|p| !p.is_empty())
					.ok_or_else(|| SyncError::Validation("payload required".into()))?;
				key.fill_missing(handler.key_fields(), &mut payload);

				let stored = match handler.find(txn, &key).await? {
					Some(mut existing) => {
						for (field, value) in payload.iter() {
							existing.insert(field.clone(), value.clone());
						}
						handler.update(txn, &key, &existing).await?
					}
					None => handler.insert(txn, &payload).await?,
				};
				Some(stored)
			}
		};

		Ok(AppliedRecord {
			table_name: handler.table_name().to_string(),
			record_id: key.to_string(),
			action,
			snapshot,
		})
	}
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|v| !v.is_empty())
}
