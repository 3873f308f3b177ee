//! Customer entity

use crate::infra::sync::{KeyField, KeyKind, Syncable};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
#[serde(rename_all = "camelCase")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: Uuid,
	pub full_name: String,
	pub phone: Option<String>,
	pub email: Option<String>,
	pub created_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(has_many = "super::car::Entity")]
	Cars,
}

impl Related<super::car::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Cars.def()
	}
}

impl ActiveModelBehavior for ActiveModel {
	fn new() -> Self {
		let now = chrono::Utc::now();
		Self {
			id: Set(Uuid::new_v4()),
			created_at: Set(now),
			updated_at: Set(now),
			..ActiveModelTrait::default()
		}
	}
}

impl Syncable for Model {
	const SYNC_MODEL: &'static str = "customers";

	fn key_fields() -> &'static [KeyField] {
		const KEY: &[KeyField] = &[KeyField::new("id", KeyKind::Uuid)];
		KEY
	}
}
