//! Field snapshots
//!
//! A snapshot is the set of field values of a record at the moment it changed.
//! Instead of passing arbitrary JSON around, snapshots are a flat, ordered map
//! from field name to a small value variant. On the wire they are plain JSON
//! objects.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single field value inside a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	Null,
	Bool(bool),
	Integer(i64),
	Float(f64),
	Text(String),
	/// Only produced from typed values, text on the wire always stays `Text`
	Timestamp(DateTime<Utc>),
	/// Nested arrays and objects (JSON columns)
	Json(serde_json::Value),
}

impl Serialize for FieldValue {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.to_json().serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for FieldValue {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		serde_json::Value::deserialize(deserializer).map(FieldValue::from_json)
	}
}

impl FieldValue {
	pub fn is_null(&self) -> bool {
		matches!(self, FieldValue::Null)
	}

	/// Render the value as a key segment. `None` for null and nested values.
	pub fn as_key_segment(&self) -> Option<String> {
		match self {
			FieldValue::Null | FieldValue::Json(_) => None,
			FieldValue::Bool(b) => Some(b.to_string()),
			FieldValue::Integer(i) => Some(i.to_string()),
			FieldValue::Float(f) => Some(f.to_string()),
			FieldValue::Text(s) => Some(s.clone()),
			FieldValue::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			FieldValue::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn to_json(&self) -> serde_json::Value {
		match self {
			FieldValue::Null => serde_json::Value::Null,
			FieldValue::Bool(b) => serde_json::Value::Bool(*b),
			FieldValue::Integer(i) => serde_json::Value::from(*i),
			FieldValue::Float(f) => serde_json::Number::from_f64(*f)
				.map(serde_json::Value::Number)
				.unwrap_or(serde_json::Value::Null),
			FieldValue::Text(s) => serde_json::Value::String(s.clone()),
			FieldValue::Timestamp(ts) => {
				serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
			}
			FieldValue::Json(v) => v.clone(),
		}
	}

	pub fn from_json(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => FieldValue::Null,
			serde_json::Value::Bool(b) => FieldValue::Bool(b),
			serde_json::Value::Number(n) => match n.as_i64() {
				Some(i) => FieldValue::Integer(i),
				None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
			},
			serde_json::Value::String(s) => FieldValue::Text(s),
			other => FieldValue::Json(other),
		}
	}
}

impl From<DateTime<Utc>> for FieldValue {
	fn from(value: DateTime<Utc>) -> Self {
		FieldValue::Timestamp(value)
	}
}

impl From<String> for FieldValue {
	fn from(value: String) -> Self {
		FieldValue::Text(value)
	}
}

impl From<&str> for FieldValue {
	fn from(value: &str) -> Self {
		FieldValue::Text(value.to_string())
	}
}

impl From<i64> for FieldValue {
	fn from(value: i64) -> Self {
		FieldValue::Integer(value)
	}
}

impl From<bool> for FieldValue {
	fn from(value: bool) -> Self {
		FieldValue::Bool(value)
	}
}

/// Ordered field name -> value map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, FieldValue>);

impl FieldMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot any serializable record. The record must serialize to an object.
	pub fn from_record<T: Serialize>(record: &T) -> Result<Self, serde_json::Error> {
		Self::from_json(serde_json::to_value(record)?)
	}

	pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
		match value {
			serde_json::Value::Object(object) => Ok(Self(
				object
					.into_iter()
					.map(|(k, v)| (k, FieldValue::from_json(v)))
					.collect(),
			)),
			other => Err(serde::de::Error::custom(format!(
				"snapshot must be a JSON object, got {other}"
			))),
		}
	}

	pub fn to_json(&self) -> serde_json::Value {
		serde_json::Value::Object(
			self.0
				.iter()
				.map(|(k, v)| (k.clone(), v.to_json()))
				.collect(),
		)
	}

	/// Rebuild a typed record from the snapshot
	pub fn to_record<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		serde_json::from_value(self.to_json())
	}

	pub fn get(&self, field: &str) -> Option<&FieldValue> {
		self.0.get(field)
	}

	pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
		self.0.insert(field.into(), value.into());
	}

	pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
		self.0.remove(field)
	}

	pub fn contains(&self, field: &str) -> bool {
		self.0.contains_key(field)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Names of fields whose value differs between `self` and `other`
	pub fn changed_fields(&self, other: &FieldMap) -> Vec<String> {
		let mut changed: Vec<String> = self
			.0
			.iter()
			.filter(|(k, v)| other.0.get(*k) != Some(*v))
			.map(|(k, _)| k.clone())
			.collect();

		changed.extend(
			other
				.0
				.keys()
				.filter(|k| !self.0.contains_key(*k))
				.cloned(),
		);

		changed
	}

	/// Serialize for the `payload` column
	pub fn to_payload(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
		Self::from_json(serde_json::from_str(payload)?)
	}
}

impl FromIterator<(String, FieldValue)> for FieldMap {
	fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}
