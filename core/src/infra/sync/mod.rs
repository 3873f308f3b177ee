//! Sync infrastructure
//!
//! Building blocks of store <-> central synchronization:
//! - Field snapshots and record keys
//! - Syncable trait and the entity registry
//! - Sync log (ledger) entity
//! - Transaction manager with change capture
//! - Store sync state registry

pub mod error;
pub mod record_key;
pub mod registry;
pub mod snapshot;
pub mod state;
pub mod sync_log_entity;
pub mod syncable;
pub mod transaction;

pub use error::{Result, SyncError};
pub use record_key::{KeyError, KeyField, KeyKind, KeyValue, RecordKey, KEY_DELIMITER};
pub use registry::{EntityHandler, EntityRegistry, ModelHandler};
pub use snapshot::{FieldMap, FieldValue};
pub use state::NodeIdentity;
pub use sync_log_entity::{NewSyncLogEntry, SyncAction, SyncLogEntity, SyncLogModel};
pub use syncable::Syncable;
pub use transaction::{
	AppliedChange, CommitMode, CommitReport, EntityState, PendingChange, TransactionManager,
	UnitOfWork,
};
