//! Sync service - store <-> central change exchange
//!
//! Central and store nodes both run a [`SyncService`]. It ingests uploaded
//! change batches and hands out pending ledger entries to downloading nodes.
//! Stores additionally run the [`SyncScheduler`], which pushes local changes
//! to central and pulls central's changes on a fixed interval.

pub mod client;
pub mod distribute;
pub mod ingest;
mod orders;
pub mod protocol;
pub mod scheduler;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::infra::db::entities::store_sync_state;
use crate::infra::sync::{state, Result, TransactionManager};

pub use client::{CentralClient, HttpCentralClient};
pub use protocol::{
	ChangeAction, ChangeRecord, DownloadQuery, DownloadResponse, ErrorResponse, LegacyOrderView,
	UploadRequest, UploadResponse,
};
pub use scheduler::{CycleReport, SyncScheduler};

/// Default maximum number of ledger entries per download
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Upload ingestion and download distribution for one node
#[derive(Debug, Clone)]
pub struct SyncService {
	tm: Arc<TransactionManager>,
	page_size: u64,
}

impl SyncService {
	pub fn new(tm: Arc<TransactionManager>, page_size: u64) -> Self {
		Self {
			tm,
			page_size: if page_size == 0 {
				DEFAULT_PAGE_SIZE
			} else {
				page_size
			},
		}
	}

	pub fn transaction_manager(&self) -> &Arc<TransactionManager> {
		&self.tm
	}

	pub fn db(&self) -> &DatabaseConnection {
		self.tm.db()
	}

	pub fn page_size(&self) -> u64 {
		self.page_size
	}

	/// Sync state of every node this node has talked to
	pub async fn states(&self) -> Result<Vec<store_sync_state::Model>> {
		state::list_states(self.db()).await
	}
}
