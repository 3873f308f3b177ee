//! Syncable model registry
//!
//! Maps table names to handlers that can read and write records of that table
//! from field snapshots. This lets ingestion and distribution apply and re-read
//! changes without knowing the concrete model type at compile time. The
//! registry is built once at startup by explicit registration.

use async_trait::async_trait;
use sea_orm::{
	sea_query::Condition, ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait,
	IntoActiveModel, Iterable, PrimaryKeyToColumn, QueryFilter, Value,
};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::error::{Result, SyncError};
use super::record_key::{KeyError, KeyField, RecordKey};
use super::snapshot::FieldMap;
use super::Syncable;

/// Table-level operations used by the sync pipelines
#[async_trait]
pub trait EntityHandler: Send + Sync {
	fn table_name(&self) -> &'static str;

	fn key_fields(&self) -> &'static [KeyField];

	fn parse_key(&self, record_id: &str) -> Result<RecordKey> {
		Ok(RecordKey::parse(record_id, self.key_fields())?)
	}

	/// Encoded record id of a snapshot
	fn record_id(&self, fields: &FieldMap) -> Option<String> {
		RecordKey::encode_from(fields, self.key_fields())
	}

	/// Typed key of a snapshot
	fn record_key(&self, fields: &FieldMap) -> Result<RecordKey> {
		let record_id = self
			.record_id(fields)
			.ok_or(SyncError::InvalidKey(KeyError::Empty))?;
		self.parse_key(&record_id)
	}

	async fn find(&self, txn: &DatabaseTransaction, key: &RecordKey) -> Result<Option<FieldMap>>;

	/// Insert a record, returning the stored snapshot
	async fn insert(&self, txn: &DatabaseTransaction, fields: &FieldMap) -> Result<FieldMap>;

	/// Overwrite every column of the record at `key`, returning the stored snapshot
	///
	/// Fails with [`SyncError::RecordNotFound`] when no record has that key.
	async fn update(
		&self,
		txn: &DatabaseTransaction,
		key: &RecordKey,
		fields: &FieldMap,
	) -> Result<FieldMap>;

	/// Insert when absent, overwrite when present
	async fn upsert(&self, txn: &DatabaseTransaction, fields: &FieldMap) -> Result<FieldMap> {
		let key = self.record_key(fields)?;
		match self.find(txn, &key).await? {
			Some(_) => self.update(txn, &key, fields).await,
			None => self.insert(txn, fields).await,
		}
	}

	/// Returns whether a record was removed
	async fn delete(&self, txn: &DatabaseTransaction, key: &RecordKey) -> Result<bool>;
}

/// [`EntityHandler`] for any SeaORM entity whose model is [`Syncable`]
pub struct ModelHandler<E>(PhantomData<fn() -> E>);

impl<E> ModelHandler<E> {
	pub fn new() -> Self {
		Self(PhantomData)
	}
}

impl<E> Default for ModelHandler<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E> ModelHandler<E>
where
	E: EntityTrait,
	E::Model: Syncable + IntoActiveModel<E::ActiveModel>,
	E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
{
	fn key_condition(key: &RecordKey) -> Result<Condition> {
		let columns: Vec<E::Column> = E::PrimaryKey::iter().map(|pk| pk.into_column()).collect();
		if columns.len() != key.len() {
			return Err(KeyError::SegmentCount {
				expected: columns.len(),
				found: key.len(),
			}
			.into());
		}

		Ok(columns
			.into_iter()
			.zip(key.values().iter().cloned())
			.fold(Condition::all(), |cond, (column, value)| {
				cond.add(column.eq(Value::from(value)))
			}))
	}

	/// Build a model from the snapshot and mark every column as set
	fn active_model(fields: &FieldMap) -> Result<(E::Model, E::ActiveModel)> {
		let model: E::Model = fields.to_record()?;
		let mut active = model.clone().into_active_model();
		for column in E::Column::iter() {
			if let Some(value) = active.get(column).into_value() {
				active.set(column, value);
			}
		}
		Ok((model, active))
	}
}

#[async_trait]
impl<E> EntityHandler for ModelHandler<E>
where
	E: EntityTrait + Send + Sync + 'static,
	E::Model: Syncable + IntoActiveModel<E::ActiveModel>,
	E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
{
	fn table_name(&self) -> &'static str {
		<E::Model as Syncable>::SYNC_MODEL
	}

	fn key_fields(&self) -> &'static [KeyField] {
		<E::Model as Syncable>::key_fields()
	}

	async fn find(&self, txn: &DatabaseTransaction, key: &RecordKey) -> Result<Option<FieldMap>> {
		let condition = Self::key_condition(key)?;
		let model = E::find().filter(condition).one(txn).await?;

		Ok(model.map(|m| m.to_snapshot()).transpose()?)
	}

	async fn insert(&self, txn: &DatabaseTransaction, fields: &FieldMap) -> Result<FieldMap> {
		let (model, active) = Self::active_model(fields)?;
		E::insert(active).exec_without_returning(txn).await?;

		Ok(model.to_snapshot()?)
	}

	async fn update(
		&self,
		txn: &DatabaseTransaction,
		key: &RecordKey,
		fields: &FieldMap,
	) -> Result<FieldMap> {
		let condition = Self::key_condition(key)?;
		let (model, active) = Self::active_model(fields)?;
		let result = E::update_many()
			.set(active)
			.filter(condition)
			.exec(txn)
			.await?;

		if result.rows_affected == 0 {
			return Err(SyncError::RecordNotFound {
				table: self.table_name().to_string(),
				record_id: key.to_string(),
			});
		}

		Ok(model.to_snapshot()?)
	}

	async fn delete(&self, txn: &DatabaseTransaction, key: &RecordKey) -> Result<bool> {
		let condition = Self::key_condition(key)?;
		let result = E::delete_many().filter(condition).exec(txn).await?;

		Ok(result.rows_affected > 0)
	}
}

/// Registry of syncable tables
#[derive(Clone, Default)]
pub struct EntityRegistry {
	handlers: HashMap<String, Arc<dyn EntityHandler>>,
}

impl EntityRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a SeaORM entity under its model's table name
	pub fn register<E>(&mut self) -> &mut Self
	where
		E: EntityTrait + Send + Sync + 'static,
		E::Model: Syncable + IntoActiveModel<E::ActiveModel>,
		E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
	{
		self.register_handler(Arc::new(ModelHandler::<E>::new()))
	}

	pub fn register_handler(&mut self, handler: Arc<dyn EntityHandler>) -> &mut Self {
		self.handlers
			.insert(handler.table_name().to_ascii_lowercase(), handler);
		self
	}

	/// Handler for a table name, case-insensitive
	pub fn resolve(&self, table_name: &str) -> Option<Arc<dyn EntityHandler>> {
		self.handlers
			.get(&table_name.trim().to_ascii_lowercase())
			.cloned()
	}

	pub fn contains(&self, table_name: &str) -> bool {
		self.resolve(table_name).is_some()
	}

	pub fn tables(&self) -> Vec<&'static str> {
		let mut tables: Vec<_> = self.handlers.values().map(|h| h.table_name()).collect();
		tables.sort_unstable();
		tables
	}
}

impl fmt::Debug for EntityRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EntityRegistry")
			.field("tables", &self.tables())
			.finish()
	}
}
