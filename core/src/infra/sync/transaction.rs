//! Transaction Manager - Sole gatekeeper for syncable database writes
//!
//! Local writes are collected in a [`UnitOfWork`] and committed through the
//! [`TransactionManager`]. In capture mode every qualifying change appends one
//! ledger entry inside the same database transaction as the write itself, so
//! a change and its ledger entry commit or roll back together.
//!
//! Replay mode applies changes without touching the ledger. It is used only
//! while applying changes received from another node.
//!
//! Every write transaction on the node database runs under the manager's write
//! lock. SQLite admits a single writer, and two deferred transactions that both
//! upgrade from a read lock fail with `SQLITE_BUSY` instead of waiting.

use chrono::Utc;
use sea_orm::{DatabaseConnection, DatabaseTransaction, EntityTrait, TransactionTrait};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace};

use super::error::{Result, SyncError};
use super::registry::EntityRegistry;
use super::snapshot::FieldMap;
use super::sync_log_entity::{self as sync_log, NewSyncLogEntry, SyncAction};
use super::Syncable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
	Added,
	Modified,
	Removed,
}

/// A tracked entity waiting for commit
#[derive(Debug, Clone)]
pub struct PendingChange {
	pub table_name: String,
	pub state: EntityState,
	/// Values before the change, absent for additions
	pub original: Option<FieldMap>,
	/// Values after the change, equal to `original` for removals
	pub current: FieldMap,
}

/// Ordered set of pending entity changes committed atomically
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
	changes: Vec<PendingChange>,
}

impl UnitOfWork {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert<M: Syncable>(&mut self, model: &M) -> Result<&mut Self> {
		Ok(self.add(M::SYNC_MODEL, model.to_snapshot()?))
	}

	pub fn update<M: Syncable>(&mut self, original: &M, current: &M) -> Result<&mut Self> {
		Ok(self.modify(M::SYNC_MODEL, original.to_snapshot()?, current.to_snapshot()?))
	}

	pub fn delete<M: Syncable>(&mut self, model: &M) -> Result<&mut Self> {
		Ok(self.remove(M::SYNC_MODEL, model.to_snapshot()?))
	}

	pub fn add(&mut self, table_name: impl Into<String>, fields: FieldMap) -> &mut Self {
		self.changes.push(PendingChange {
			table_name: table_name.into(),
			state: EntityState::Added,
			original: None,
			current: fields,
		});
		self
	}

	pub fn modify(
		&mut self,
		table_name: impl Into<String>,
		original: FieldMap,
		current: FieldMap,
	) -> &mut Self {
		self.changes.push(PendingChange {
			table_name: table_name.into(),
			state: EntityState::Modified,
			original: Some(original),
			current,
		});
		self
	}

	pub fn remove(&mut self, table_name: impl Into<String>, fields: FieldMap) -> &mut Self {
		self.changes.push(PendingChange {
			table_name: table_name.into(),
			state: EntityState::Removed,
			original: Some(fields.clone()),
			current: fields,
		});
		self
	}

	pub fn changes(&self) -> &[PendingChange] {
		&self.changes
	}

	pub fn len(&self) -> usize {
		self.changes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.changes.is_empty()
	}
}

/// How a commit treats the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitMode {
	pub capture_changes: bool,
}

impl CommitMode {
	/// Local writes, ledger entries are appended
	pub const fn capture() -> Self {
		Self {
			capture_changes: true,
		}
	}

	/// Remote changes being applied, ledger untouched
	pub const fn replay() -> Self {
		Self {
			capture_changes: false,
		}
	}
}

impl Default for CommitMode {
	fn default() -> Self {
		Self::capture()
	}
}

/// A change written to the database
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
	pub table_name: String,
	pub record_id: Option<String>,
	pub action: SyncAction,
	/// Stored values, absent for removals
	pub snapshot: Option<FieldMap>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReport {
	pub applied: Vec<AppliedChange>,
	/// Number of ledger entries appended
	pub logged: usize,
}

/// Transaction Manager
///
/// Owns the database handle, the entity registry and the capture policy of
/// this node.
#[derive(Debug, Clone)]
pub struct TransactionManager {
	db: DatabaseConnection,
	registry: Arc<EntityRegistry>,
	node_id: String,
	excluded_tables: HashSet<String>,
	write_lock: Arc<Mutex<()>>,
}

impl TransactionManager {
	pub fn new(
		db: DatabaseConnection,
		registry: Arc<EntityRegistry>,
		node_id: impl Into<String>,
		excluded_tables: impl IntoIterator<Item = impl AsRef<str>>,
	) -> Self {
		Self {
			db,
			registry,
			node_id: node_id.into(),
			excluded_tables: excluded_tables
				.into_iter()
				.map(|t| t.as_ref().trim().to_ascii_lowercase())
				.collect(),
			write_lock: Arc::new(Mutex::new(())),
		}
	}

	pub fn db(&self) -> &DatabaseConnection {
		&self.db
	}

	pub fn registry(&self) -> &Arc<EntityRegistry> {
		&self.registry
	}

	pub fn node_id(&self) -> &str {
		&self.node_id
	}

	/// Deny-listed tables never reach the ledger
	pub fn is_excluded(&self, table_name: &str) -> bool {
		self.excluded_tables
			.contains(&table_name.trim().to_ascii_lowercase())
	}

	/// Wait for exclusive write access, held until the guard drops
	///
	/// Take it before `begin()` and keep it past `commit()`.
	pub async fn lock_writes(&self) -> OwnedMutexGuard<()> {
		self.write_lock.clone().lock_owned().await
	}

	/// Apply a unit of work in its own transaction
	pub async fn commit(&self, unit: UnitOfWork, mode: CommitMode) -> Result<CommitReport> {
		let _write = self.lock_writes().await;
		let txn = self.db.begin().await?;
		let report = self.apply_unit(&txn, unit, mode).await?;
		txn.commit().await?;

		debug!(
			applied = report.applied.len(),
			logged = report.logged,
			capture = mode.capture_changes,
			"Unit of work committed"
		);

		Ok(report)
	}

	/// Apply a unit of work inside a caller owned transaction
	pub async fn apply_unit(
		&self,
		txn: &DatabaseTransaction,
		unit: UnitOfWork,
		mode: CommitMode,
	) -> Result<CommitReport> {
		let mut report = CommitReport::default();
		let mut entries = Vec::new();

		for change in unit.changes {
			let handler = self
				.registry
				.resolve(&change.table_name)
				.ok_or_else(|| SyncError::UnknownTable(change.table_name.clone()))?;

			let (action, snapshot, record_id) = match change.state {
				EntityState::Added => {
					let stored = handler.insert(txn, &change.current).await?;
					let record_id = handler.record_id(&stored);
					(SyncAction::Insert, Some(stored), record_id)
				}
				EntityState::Modified => {
					let original = change.original.as_ref().unwrap_or(&change.current);
					if original.changed_fields(&change.current).is_empty() {
						trace!(table = %change.table_name, "Skipping unchanged entity");
						continue;
					}

					let key = handler.record_key(original)?;
					let stored = handler.update(txn, &key, &change.current).await?;
					let record_id = handler.record_id(&stored);
					(SyncAction::Update, Some(stored), record_id)
				}
				EntityState::Removed => {
					let original = change.original.as_ref().unwrap_or(&change.current);
					let key = handler.record_key(original)?;
					if !handler.delete(txn, &key).await? {
						trace!(table = %change.table_name, record_id = %key, "Skipping delete of absent entity");
						continue;
					}
					(SyncAction::Delete, None, handler.record_id(original))
				}
			};

			if mode.capture_changes && !self.is_excluded(handler.table_name()) {
				match record_id.as_ref() {
					Some(record_id) => {
						if action == SyncAction::Delete {
							debug!(
								table = handler.table_name(),
								record_id = %record_id,
								snapshot = ?change.original,
								"Captured delete"
							);
						}

						entries.push(
							NewSyncLogEntry {
								table_name: handler.table_name().to_string(),
								record_id: record_id.clone(),
								action,
								updated_at: Utc::now(),
								source_server: self.node_id.clone(),
								store_type: None,
								payload: snapshot.clone(),
							}
							.into_active_model()?,
						);
					}
					None => {
						debug!(
							table = handler.table_name(),
							"No key resolved for captured change, skipping ledger entry"
						);
					}
				}
			}

			report.applied.push(AppliedChange {
				table_name: handler.table_name().to_string(),
				record_id,
				action,
				snapshot,
			});
		}

		report.logged = entries.len();
		if !entries.is_empty() {
			sync_log::Entity::insert_many(entries)
				.exec_without_returning(txn)
				.await?;
		}

		Ok(report)
	}
}
