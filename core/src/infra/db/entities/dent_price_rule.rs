//! Dent price rule entity
//!
//! Price list per dent size and body panel, maintained centrally and pushed to
//! every store.

use crate::infra::sync::{KeyField, KeyKind, Syncable};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{EnumString, VariantNames};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dent_price_rules")]
#[serde(rename_all = "camelCase")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub dent_size: DentSize,
	#[sea_orm(primary_key, auto_increment = false)]
	pub panel: String,
	pub price_cents: i64,
	pub active: bool,
	pub updated_at: DateTimeUtc,
}

/// Dent size classes, stored by name
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	EnumIter,
	DeriveActiveEnum,
	EnumString,
	VariantNames,
	Serialize,
	Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum DentSize {
	#[sea_orm(string_value = "SMALL")]
	Small,
	#[sea_orm(string_value = "MEDIUM")]
	Medium,
	#[sea_orm(string_value = "LARGE")]
	Large,
	#[sea_orm(string_value = "OVERSIZED")]
	Oversized,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Syncable for Model {
	const SYNC_MODEL: &'static str = "dent_price_rules";

	fn key_fields() -> &'static [KeyField] {
		const KEY: &[KeyField] = &[
			KeyField::new("dentSize", KeyKind::Enum(DentSize::VARIANTS)),
			KeyField::new("panel", KeyKind::Text),
		];
		KEY
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	#[test]
	fn test_dent_size_names() {
		assert_eq!(DentSize::VARIANTS, &["SMALL", "MEDIUM", "LARGE", "OVERSIZED"]);
		assert_eq!(DentSize::from_str("large").unwrap(), DentSize::Large);
		assert_eq!(
			serde_json::to_value(DentSize::Oversized).unwrap(),
			serde_json::json!("OVERSIZED")
		);
	}
}
