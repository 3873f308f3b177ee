//! Sync log entity
//!
//! The sync log (ledger) is an append-only record of every mutation that has
//! to travel to other nodes. Rows are never edited except for the single
//! `synced` false -> true flip done by distribution.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use strum::EnumString;

use super::snapshot::FieldMap;

/// Sync log entry model (SeaORM entity)
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_log")]
pub struct Model {
	/// Time ordered (v7), assigned on creation
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: Uuid,

	pub table_name: String,

	/// Encoded primary key of the changed record
	pub record_id: String,

	pub action: SyncAction,

	/// Time of the originating mutation, ordering key for pulls
	pub updated_at: DateTimeUtc,

	/// Node id where the mutation originated
	pub source_server: String,

	/// Node type the entry is addressed to, empty for every type
	pub store_type: Option<String>,

	pub synced: bool,

	/// JSON field snapshot, never present for deletes
	#[sea_orm(column_type = "Text", nullable)]
	pub payload: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
	pub fn snapshot(&self) -> Result<Option<FieldMap>, serde_json::Error> {
		self.payload.as_deref().map(FieldMap::from_payload).transpose()
	}

	/// Whether the entry is addressed to nodes of `node_type`
	pub fn addressed_to(&self, node_type: &str) -> bool {
		match self.store_type.as_deref() {
			None | Some("") => true,
			Some(store_type) => store_type == node_type,
		}
	}
}

/// Ledger action
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	EnumIter,
	DeriveActiveEnum,
	EnumString,
	Serialize,
	Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum SyncAction {
	#[sea_orm(string_value = "INSERT")]
	Insert,
	#[sea_orm(string_value = "UPDATE")]
	Update,
	#[sea_orm(string_value = "DELETE")]
	Delete,
}

impl SyncAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			SyncAction::Insert => "INSERT",
			SyncAction::Update => "UPDATE",
			SyncAction::Delete => "DELETE",
		}
	}
}

/// A ledger entry about to be appended
#[derive(Debug, Clone)]
pub struct NewSyncLogEntry {
	pub table_name: String,
	pub record_id: String,
	pub action: SyncAction,
	pub updated_at: DateTime<Utc>,
	pub source_server: String,
	pub store_type: Option<String>,
	pub payload: Option<FieldMap>,
}

impl NewSyncLogEntry {
	/// Active model with a fresh id and `synced = false`. Delete payloads are dropped.
	pub fn into_active_model(self) -> Result<ActiveModel, serde_json::Error> {
		let payload = match self.action {
			SyncAction::Delete => None,
			_ => self.payload.as_ref().map(FieldMap::to_payload).transpose()?,
		};

		Ok(ActiveModel {
			id: Set(Uuid::now_v7()),
			table_name: Set(self.table_name),
			record_id: Set(self.record_id),
			action: Set(self.action),
			updated_at: Set(self.updated_at),
			source_server: Set(self.source_server),
			store_type: Set(self.store_type.filter(|t| !t.is_empty())),
			synced: Set(false),
			payload: Set(payload),
		})
	}
}

pub type SyncLogModel = Model;
pub type SyncLogActiveModel = ActiveModel;
pub type SyncLogEntity = Entity;
