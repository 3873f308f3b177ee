//! Syncable trait for database models that participate in synchronization
//!
//! Models implementing `Syncable` can be registered in the
//! [`EntityRegistry`](super::EntityRegistry) and get a ledger entry whenever
//! they are written through the [`TransactionManager`](super::TransactionManager)
//! in capture mode.

use serde::{de::DeserializeOwned, Serialize};

use super::record_key::{KeyField, RecordKey};
use super::snapshot::FieldMap;

/// Trait for database models that can be synchronized between nodes
///
/// Snapshot field names are the serde names of the model, so models are
/// expected to serialize as flat objects.
///
/// # Example
///
/// ```rust,ignore
/// use ds_core::infra::sync::{KeyField, KeyKind, Syncable};
///
/// impl Syncable for Model {
///     const SYNC_MODEL: &'static str = "cars";
///
///     fn key_fields() -> &'static [KeyField] {
///         const KEY: &[KeyField] = &[KeyField::new("id", KeyKind::Uuid)];
///         KEY
///     }
/// }
/// ```
pub trait Syncable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
	/// Logical table name written to the ledger
	///
	/// Must equal the database table name and never change.
	const SYNC_MODEL: &'static str;

	/// Primary key fields in primary key column order
	fn key_fields() -> &'static [KeyField];

	/// Full field snapshot of this record
	fn to_snapshot(&self) -> Result<FieldMap, serde_json::Error> {
		FieldMap::from_record(self)
	}

	/// Encoded record id, `None` if a key field is null
	fn record_id(&self) -> Option<String> {
		let snapshot = self.to_snapshot().ok()?;
		RecordKey::encode_from(&snapshot, Self::key_fields())
	}
}
