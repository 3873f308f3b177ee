//! Repair order entity
//!
//! Orders are identified by a business uid assigned on the store that opened
//! them. Every column except the uid and creation metadata is nullable, so a
//! partial upload can create an order shell that later uploads fill in.

use crate::infra::sync::{KeyField, KeyKind, Syncable};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
#[serde(rename_all = "camelCase")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub order_uid: String,
	/// Store the order was opened at
	pub store_id: Option<String>,
	pub customer_id: Option<Uuid>,
	pub car_id: Option<Uuid>,
	pub quotation_id: Option<Uuid>,
	/// Workflow status code, e.g. "210"
	pub status: Option<String>,
	pub technician: Option<String>,
	pub total_cents: Option<i64>,
	#[sea_orm(column_type = "Text", nullable)]
	pub notes: Option<String>,
	pub created_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
	pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Syncable for Model {
	const SYNC_MODEL: &'static str = "orders";

	fn key_fields() -> &'static [KeyField] {
		const KEY: &[KeyField] = &[KeyField::new("orderUid", KeyKind::Text)];
		KEY
	}
}
