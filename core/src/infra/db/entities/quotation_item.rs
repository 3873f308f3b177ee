//! Quotation line item
//!
//! Keyed by its quotation and line number.

use super::dent_price_rule::DentSize;
use crate::infra::sync::{KeyField, KeyKind, Syncable};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quotation_items")]
#[serde(rename_all = "camelCase")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub quotation_id: Uuid,
	#[sea_orm(primary_key, auto_increment = false)]
	pub line_no: i32,
	pub panel: String,
	pub dent_size: Option<DentSize>,
	pub description: Option<String>,
	pub price_cents: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
	#[sea_orm(
		belongs_to = "super::quotation::Entity",
		from = "Column::QuotationId",
		to = "super::quotation::Column::Id"
	)]
	Quotation,
}

impl Related<super::quotation::Entity> for Entity {
	fn to() -> RelationDef {
		Relation::Quotation.def()
	}
}

impl ActiveModelBehavior for ActiveModel {}

impl Syncable for Model {
	const SYNC_MODEL: &'static str = "quotation_items";

	fn key_fields() -> &'static [KeyField] {
		const KEY: &[KeyField] = &[
			KeyField::new("quotationId", KeyKind::Uuid),
			KeyField::new("lineNo", KeyKind::Integer),
		];
		KEY
	}
}
