use sea_orm::DbErr;
use thiserror::Error;

use super::record_key::KeyError;

/// Errors raised by the sync engine
#[derive(Debug, Error)]
pub enum SyncError {
	/// The request envelope is unusable as a whole
	#[error("Validation error: {0}")]
	Validation(String),

	#[error("Database error: {0}")]
	Database(#[from] DbErr),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Unknown table: {0}")]
	UnknownTable(String),

	#[error("Record not found: {table}/{record_id}")]
	RecordNotFound { table: String, record_id: String },

	#[error("Invalid record key: {0}")]
	InvalidKey(#[from] KeyError),

	#[error("Operation cancelled")]
	Cancelled,

	#[error("Transport error: {0}")]
	Transport(String),
}

impl From<reqwest::Error> for SyncError {
	fn from(err: reqwest::Error) -> Self {
		SyncError::Transport(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, SyncError>;
