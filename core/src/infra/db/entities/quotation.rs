//! Quotation entity

use crate::infra::sync::{KeyField, KeyKind, Syncable};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quotations")]
#[serde(rename_all = "camelCase")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: Uuid,
	pub customer_id: Uuid,
	pub car_id: Option<Uuid>,
	pub status: String,
	pub total_cents: i64,
	pub valid_until: Option<DateTimeUtc>,
	pub created_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::quotation_item::Entity")]
	Items,
}

impl Related<super::quotation_item::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Items.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}

impl Syncable for Model {
	const SYNC_MODEL: &'static str = "quotations";

	fn key_fields() -> &'static [KeyField] {
		const KEY: &[KeyField] = &[KeyField::new("id", KeyKind::Uuid)];
		KEY
	}
}
