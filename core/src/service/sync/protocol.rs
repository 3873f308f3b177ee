//! Wire format of the upload and download endpoints
//!
//! Field names are camelCase on the wire. Every request field is optional at
//! the serde level so that a malformed record can be ignored on its own
//! instead of failing the whole batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumString;
use uuid::Uuid;

use crate::infra::sync::{FieldMap, FieldValue, SyncAction};

/// Action of an incoming change. `UPSERT` is accepted on upload only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum ChangeAction {
	Insert,
	Update,
	Upsert,
	Delete,
}

impl ChangeAction {
	/// Action recorded in the ledger
	pub fn ledger_action(&self) -> SyncAction {
		match self {
			ChangeAction::Insert => SyncAction::Insert,
			ChangeAction::Update | ChangeAction::Upsert => SyncAction::Update,
			ChangeAction::Delete => SyncAction::Delete,
		}
	}
}

/// One change on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
	#[serde(default)]
	pub table_name: Option<String>,
	#[serde(default)]
	pub action: Option<String>,
	#[serde(default)]
	pub record_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<DateTime<Utc>>,
	/// Field snapshot, either an object or a string holding one
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<serde_json::Value>,
}

impl ChangeRecord {
	pub fn new(
		table_name: impl Into<String>,
		action: SyncAction,
		record_id: impl Into<String>,
		updated_at: DateTime<Utc>,
		payload: Option<&FieldMap>,
	) -> Self {
		Self {
			table_name: Some(table_name.into()),
			action: Some(action.as_str().to_string()),
			record_id: Some(record_id.into()),
			updated_at: Some(updated_at),
			payload: payload.map(FieldMap::to_json),
		}
	}

	/// Decoded payload. Null and empty-string payloads are absent.
	pub fn snapshot(&self) -> Result<Option<FieldMap>, serde_json::Error> {
		match &self.payload {
			None | Some(serde_json::Value::Null) => Ok(None),
			Some(serde_json::Value::String(raw)) if raw.trim().is_empty() => Ok(None),
			Some(serde_json::Value::String(raw)) => FieldMap::from_payload(raw).map(Some),
			Some(value) => FieldMap::from_json(value.clone()).map(Some),
		}
	}
}

/// Body of `POST /api/sync/upload`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
	#[serde(default)]
	pub store_id: Option<String>,
	#[serde(default)]
	pub store_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub server_role: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub server_ip: Option<String>,
	#[serde(default)]
	pub changes: Vec<ChangeRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
	pub processed_count: usize,
	pub ignored_count: usize,
}

/// Query of `GET /api/sync/download`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
	#[serde(default)]
	pub store_id: Option<String>,
	#[serde(default)]
	pub store_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_sync_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
	pub store_id: String,
	pub store_type: String,
	/// Node id of the answering server
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub server_id: Option<String>,
	pub server_time: DateTime<Utc>,
	pub changes: Vec<ChangeRecord>,
	#[serde(default)]
	pub orders: Vec<LegacyOrderView>,
}

/// Flat projection of an order change for older store clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOrderView {
	pub order_uid: String,
	pub store_id: Option<String>,
	pub customer_id: Option<Uuid>,
	pub car_id: Option<Uuid>,
	pub quotation_id: Option<Uuid>,
	pub status: Option<String>,
	pub technician: Option<String>,
	pub total_cents: Option<i64>,
	pub created_at: Option<DateTime<Utc>>,
	pub updated_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub action: String,
}

impl LegacyOrderView {
	/// Project an order snapshot. Missing or mistyped fields stay empty.
	pub fn from_snapshot(record_id: &str, action: SyncAction, snapshot: Option<&FieldMap>) -> Self {
		let text = |field: &str| -> Option<String> {
			snapshot
				.and_then(|s| s.get(field))
				.and_then(FieldValue::as_key_segment)
		};
		let uuid = |field: &str| text(field).and_then(|v| Uuid::parse_str(&v).ok());
		let timestamp = |field: &str| {
			text(field).and_then(|v| {
				DateTime::parse_from_rfc3339(&v)
					.ok()
					.map(|t| t.with_timezone(&Utc))
			})
		};
		let total_cents = match snapshot.and_then(|s| s.get("totalCents")) {
			Some(FieldValue::Integer(cents)) => Some(*cents),
			Some(FieldValue::Float(cents)) => Some(cents.round() as i64),
			Some(FieldValue::Text(cents)) => cents.trim().parse().ok(),
			_ => None,
		};

		Self {
			order_uid: text("orderUid").unwrap_or_else(|| record_id.to_string()),
			store_id: text("storeId"),
			customer_id: uuid("customerId"),
			car_id: uuid("carId"),
			quotation_id: uuid("quotationId"),
			status: text("status"),
			technician: text("technician"),
			total_cents,
			created_at: timestamp("createdAt"),
			updated_at: timestamp("updatedAt"),
			completed_at: timestamp("completedAt"),
			action: action.as_str().to_string(),
		}
	}
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use serde_json::json;
	use std::str::FromStr;

	#[test]
	fn test_upload_request_is_lenient() {
		let request: UploadRequest = serde_json::from_value(json!({
			"storeId": "S1",
			"changes": [
				{ "tableName": "orders", "action": "upsert", "recordId": "O-1", "payload": { "status": "210" } },
				{ "action": "INSERT" }
			]
		}))
		.unwrap();

		assert_eq!(request.store_id.as_deref(), Some("S1"));
		assert_eq!(request.store_type, None);
		assert_eq!(request.changes.len(), 2);
		assert_eq!(request.changes[1].table_name, None);
		assert_eq!(
			ChangeAction::from_str(request.changes[0].action.as_deref().unwrap()).unwrap(),
			ChangeAction::Upsert
		);
	}

	#[test]
	fn test_payload_as_object_or_string() {
		let object = ChangeRecord {
			payload: Some(json!({ "status": "210" })),
			..Default::default()
		};
		let string = ChangeRecord {
			payload: Some(json!("{\"status\":\"210\"}")),
			..Default::default()
		};
		let empty = ChangeRecord {
			payload: Some(json!("")),
			..Default::default()
		};

		assert_eq!(object.snapshot().unwrap(), string.snapshot().unwrap());
		assert_eq!(empty.snapshot().unwrap(), None);
		assert!(ChangeRecord {
			payload: Some(json!(42)),
			..Default::default()
		}
		.snapshot()
		.is_err());
	}

	#[test]
	fn test_legacy_order_view() {
		let snapshot = FieldMap::from_json(json!({
			"orderUid": "O-1",
			"storeId": "S1",
			"status": "210",
			"totalCents": 12500,
			"customerId": "not-a-uuid",
			"createdAt": "2025-03-01T10:00:00Z"
		}))
		.unwrap();

		let view = LegacyOrderView::from_snapshot("O-1", SyncAction::Update, Some(&snapshot));
		assert_eq!(view.order_uid, "O-1");
		assert_eq!(view.status.as_deref(), Some("210"));
		assert_eq!(view.total_cents, Some(12500));
		assert_eq!(view.customer_id, None);
		assert_eq!(view.action, "UPDATE");
		assert!(view.created_at.is_some());

		let bare = LegacyOrderView::from_snapshot("O-2", SyncAction::Insert, None);
		assert_eq!(bare.order_uid, "O-2");
		assert_eq!(bare.status, None);
	}

	#[test]
	fn test_ledger_action_mapping() {
		assert_eq!(ChangeAction::Upsert.ledger_action(), SyncAction::Update);
		assert_eq!(ChangeAction::Insert.ledger_action(), SyncAction::Insert);
		assert!(ChangeAction::from_str("MERGE").is_err());
	}
}
