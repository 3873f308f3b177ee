//! Device registration entity
//!
//! Local to each node. Registered for capture, always deny-listed.

use crate::infra::sync::{KeyField, KeyKind, Syncable};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_registrations")]
#[serde(rename_all = "camelCase")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: Uuid,
	pub device_name: String,
	pub push_token: Option<String>,
	pub registered_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Syncable for Model {
	const SYNC_MODEL: &'static str = "device_registrations";

	fn key_fields() -> &'static [KeyField] {
		const KEY: &[KeyField] = &[KeyField::new("id", KeyKind::Uuid)];
		KEY
	}
}
