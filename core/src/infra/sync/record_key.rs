//! Record keys
//!
//! Ledger entries identify a record by a string. Composite keys are joined with
//! [`KEY_DELIMITER`] in primary key column order. Segments are not escaped, so
//! parsing splits from the left into exactly as many parts as the key has
//! fields and only the last segment may contain the delimiter.

use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::snapshot::{FieldMap, FieldValue};

pub const KEY_DELIMITER: char = '|';

/// How a key segment is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
	Text,
	Integer,
	Uuid,
	/// Timestamp with timezone, RFC 3339 on the wire
	DateTime,
	/// String column holding one of the listed variant names
	Enum(&'static [&'static str]),
}

/// A primary key field declared by a syncable model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyField {
	/// Field name as it appears in snapshots
	pub name: &'static str,
	pub kind: KeyKind,
}

impl KeyField {
	pub const fn new(name: &'static str, kind: KeyKind) -> Self {
		Self { name, kind }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
	Text(String),
	Integer(i64),
	Uuid(Uuid),
	DateTime(DateTime<Utc>),
	Enum(&'static str),
}

impl KeyValue {
	/// Convert one raw segment to a typed value
	pub fn parse(raw: &str, kind: KeyKind) -> Result<Self, KeyError> {
		let invalid = |reason: String| KeyError::InvalidSegment {
			segment: raw.to_string(),
			reason,
		};

		match kind {
			KeyKind::Text => Ok(KeyValue::Text(raw.to_string())),
			KeyKind::Integer => raw
				.trim()
				.parse::<i64>()
				.map(KeyValue::Integer)
				.map_err(|e| invalid(e.to_string())),
			KeyKind::Uuid => Uuid::parse_str(raw.trim())
				.map(KeyValue::Uuid)
				.map_err(|e| invalid(e.to_string())),
			KeyKind::DateTime => DateTime::parse_from_rfc3339(raw.trim())
				.map(|dt| KeyValue::DateTime(dt.with_timezone(&Utc)))
				.map_err(|e| invalid(e.to_string())),
			KeyKind::Enum(variants) => variants
				.iter()
				.find(|v| v.eq_ignore_ascii_case(raw.trim()))
				.map(|v| KeyValue::Enum(v))
				.ok_or_else(|| invalid(format!("expected one of {}", variants.join(", ")))),
		}
	}

	fn segment(&self) -> String {
		match self {
			KeyValue::Text(s) => s.clone(),
			KeyValue::Integer(i) => i.to_string(),
			KeyValue::Uuid(u) => u.to_string(),
			KeyValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
			KeyValue::Enum(v) => v.to_string(),
		}
	}
}

impl From<&KeyValue> for FieldValue {
	fn from(value: &KeyValue) -> Self {
		match value {
			KeyValue::Integer(i) => FieldValue::Integer(*i),
			KeyValue::DateTime(dt) => FieldValue::Timestamp(*dt),
			other => FieldValue::Text(other.segment()),
		}
	}
}

impl From<KeyValue> for Value {
	fn from(value: KeyValue) -> Self {
		match value {
			KeyValue::Text(s) => Value::from(s),
			KeyValue::Integer(i) => Value::from(i),
			KeyValue::Uuid(u) => Value::from(u),
			KeyValue::DateTime(dt) => Value::from(dt),
			KeyValue::Enum(v) => Value::from(v.to_string()),
		}
	}
}

/// Typed primary key values in key column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey(Vec<KeyValue>);

impl RecordKey {
	pub fn new(values: Vec<KeyValue>) -> Self {
		Self(values)
	}

	/// Parse a ledger record id against the declared key fields
	pub fn parse(record_id: &str, fields: &[KeyField]) -> Result<Self, KeyError> {
		if fields.is_empty() {
			return Err(KeyError::NoKeyFields);
		}
		if record_id.is_empty() {
			return Err(KeyError::Empty);
		}

		let segments: Vec<&str> = record_id.splitn(fields.len(), KEY_DELIMITER).collect();
		if segments.len() != fields.len() {
			return Err(KeyError::SegmentCount {
				expected: fields.len(),
				found: segments.len(),
			});
		}

		segments
			.into_iter()
			.zip(fields)
			.map(|(segment, field)| KeyValue::parse(segment, field.kind))
			.collect::<Result<Vec<_>, _>>()
			.map(Self)
	}

	/// Encoded key of a snapshot. `None` when a key field is missing or null.
	pub fn encode_from(fields: &FieldMap, key_fields: &[KeyField]) -> Option<String> {
		if key_fields.is_empty() {
			return None;
		}

		let segments = key_fields
			.iter()
			.map(|field| fields.get(field.name).and_then(|v| v.as_key_segment()))
			.collect::<Option<Vec<_>>>()?;

		if segments.iter().any(|s| s.is_empty()) {
			return None;
		}

		Some(segments.join(&KEY_DELIMITER.to_string()))
	}

	/// Set key fields that are missing or null in `fields` from this key
	pub fn fill_missing(&self, key_fields: &[KeyField], fields: &mut FieldMap) {
		for (field, value) in key_fields.iter().zip(&self.0) {
			if fields.get(field.name).map_or(true, FieldValue::is_null) {
				fields.insert(field.name, FieldValue::from(value));
			}
		}
	}

	pub fn values(&self) -> &[KeyValue] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for RecordKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let segments: Vec<String> = self.0.iter().map(KeyValue::segment).collect();
		f.write_str(&segments.join(&KEY_DELIMITER.to_string()))
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
	#[error("record id is empty")]
	Empty,

	#[error("model declares no key fields")]
	NoKeyFields,

	#[error("expected {expected} key segments, found {found}")]
	SegmentCount { expected: usize, found: usize },

	#[error("invalid key segment '{segment}': {reason}")]
	InvalidSegment { segment: String, reason: String },
}
