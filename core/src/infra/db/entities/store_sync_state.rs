//! Store sync state entity
//!
//! One row per remote node this node has exchanged changes with, keyed by
//! node id and node type.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::EnumString;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_sync_state")]
#[serde(rename_all = "camelCase")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub store_id: String,
	#[sea_orm(primary_key, auto_increment = false)]
	pub store_type: String,
	pub server_role: Option<ServerRole>,
	pub server_ip: Option<String>,
	pub last_upload_time: Option<DateTimeUtc>,
	pub last_download_time: Option<DateTimeUtc>,
	/// Id of the last ledger entry delivered to this node
	pub last_cursor: Option<String>,
	pub created_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
}

/// Role a node plays in the topology
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ServerRole {
	#[sea_orm(string_value = "central")]
	Central,
	#[sea_orm(string_value = "store")]
	Store,
}

impl ServerRole {
	pub fn as_str(&self) -> &'static str {
		match self {
			ServerRole::Central => "central",
			ServerRole::Store => "store",
		}
	}
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
