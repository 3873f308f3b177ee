//! Order merge
//!
//! Orders are the busiest table and stores often upload partial orders, so
//! incoming order changes are merged field by field instead of replacing the
//! record. Null values never overwrite stored ones.

use chrono::Utc;
use sea_orm::DatabaseTransaction;

use crate::infra::sync::{
	CommitMode, FieldMap, FieldValue, NodeIdentity, Result, SyncError, TransactionManager,
	UnitOfWork,
};

pub(super) const ORDERS_TABLE: &str = "orders";

const ORDER_UID: &str = "orderUid";

pub(super) fn is_orders_table(table_name: &str) -> bool {
	table_name.trim().eq_ignore_ascii_case(ORDERS_TABLE)
}

/// Business key of a merged order, falling back to the uploaded record id
pub(super) fn order_uid(snapshot: &FieldMap, record_id: &str) -> String {
	snapshot
		.get(ORDER_UID)
		.and_then(FieldValue::as_key_segment)
		.filter(|uid| !uid.is_empty())
		.unwrap_or_else(|| record_id.to_string())
}

/// Merge an uploaded order into the stored one, creating it if needed
///
/// Returns the stored snapshot. Writes go through the transaction manager in
/// replay mode so nothing is captured.
pub(super) async fn merge_order(
	tm: &TransactionManager,
	txn: &DatabaseTransaction,
	node: &NodeIdentity,
	record_id: &str,
	payload: FieldMap,
) -> Result<FieldMap> {
	let handler = tm
		.registry()
		.resolve(ORDERS_TABLE)
		.ok_or_else(|| SyncError::UnknownTable(ORDERS_TABLE.to_string()))?;

	let uid = order_uid(&payload, record_id);
	let key = handler.parse_key(&uid)?;

	let existing = handler.find(txn, &key).await?;
	let mut merged = existing.clone().unwrap_or_else(|| {
		let now = Utc::now();
		let mut shell = FieldMap::new();
		shell.insert("createdAt", now);
		shell.insert("updatedAt", now);
		shell.insert("storeId", node.node_id.as_str());
		shell
	});

	for (field, value) in payload.iter() {
		if !value.is_null() {
			merged.insert(field.clone(), value.clone());
		}
	}
	merged.insert(ORDER_UID, uid.as_str());

	let mut unit = UnitOfWork::new();
	match existing {
		Some(original) => unit.modify(ORDERS_TABLE, original, merged),
		None => unit.add(ORDERS_TABLE, merged),
	};

	let report = tm.apply_unit(txn, unit, CommitMode::replay()).await?;
	match report.applied.into_iter().next().and_then(|c| c.snapshot) {
		Some(stored) => Ok(stored),
		// unchanged order, nothing written
		None => Ok(handler
			.find(txn, &key)
			.await?
			.ok_or_else(|| SyncError::Validation(format!("order '{}' vanished", uid)))?),
	}
}
