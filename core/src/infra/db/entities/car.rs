//! Car entity

use crate::infra::sync::{KeyField, KeyKind, Syncable};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cars")]
#[serde(rename_all = "camelCase")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: Uuid,
	pub customer_id: Uuid,
	pub plate_number: String,
	pub make: Option<String>,
	pub car_model: Option<String>,
	pub color: Option<String>,
	pub created_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::customer::Entity",
		from = "Column::CustomerId",
		to = "super::customer::Column::Id"
	)]
	Customer,
}

impl Related<super::customer::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Customer.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}

impl Syncable for Model {
	const SYNC_MODEL: &'static str = "cars";

	fn key_fields() -> &'static [KeyField] {
		const KEY: &[KeyField] = &[KeyField::new("id", KeyKind::Uuid)];
		KEY
	}
}
