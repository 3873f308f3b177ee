//! Background sync scheduler
//!
//! Runs on store nodes only. Every interval it pushes this node's own pending
//! ledger entries to central, pulls central's changes and applies them
//! locally. Cycles never overlap, and a stop signal during the sleep ends the
//! loop without starting another cycle.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
	sea_query::Expr, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
	QuerySelect, TransactionTrait,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::CentralClient;
use super::protocol::{ChangeRecord, DownloadQuery, UploadRequest};
use super::SyncService;
use crate::infra::db::entities::ServerRole;
use crate::infra::sync::{state, sync_log_entity, NodeIdentity, Result, SyncError};
use crate::service::Service;

/// Upper bound on pages pulled from central in one cycle
const MAX_PULL_PAGES: usize = 50;

/// Outcome of one scheduler cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
	/// Local entries accepted by central
	pub pushed: usize,
	/// Central changes applied locally
	pub pulled: usize,
	/// Central changes ignored locally
	pub ignored: usize,
	/// Local entries not yet accepted by central
	pub pending: u64,
}

/// Periodic push/pull against central
pub struct SyncScheduler {
	worker: Arc<SyncWorker>,
	is_running: Arc<AtomicBool>,
	shutdown: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl SyncScheduler {
	pub fn new(
		service: Arc<SyncService>,
		client: Option<Arc<dyn CentralClient>>,
		node: NodeIdentity,
		role: ServerRole,
		interval: Duration,
	) -> Self {
		Self {
			worker: Arc::new(SyncWorker {
				service,
				client,
				node,
				role,
				interval,
			}),
			is_running: Arc::new(AtomicBool::new(false)),
			shutdown: Mutex::new(None),
		}
	}

	/// Whether this node is configured to run the scheduler at all
	pub fn is_enabled(&self) -> bool {
		self.worker.is_enabled()
	}

	/// One push, pull and bookkeeping pass, outside the timer
	pub async fn run_cycle(&self, token: &CancellationToken) -> Result<CycleReport> {
		self.worker.run_cycle(token).await
	}
}

struct SyncWorker {
	service: Arc<SyncService>,
	client: Option<Arc<dyn CentralClient>>,
	node: NodeIdentity,
	role: ServerRole,
	interval: Duration,
}

impl SyncWorker {
	fn is_enabled(&self) -> bool {
		self.role == ServerRole::Store && self.node.validate().is_ok()
	}

	/// Sleep, cycle, repeat until `token` is cancelled
	async fn run(&self, token: CancellationToken) {
		if !self.is_enabled() {
			info!(
				role = self.role.as_str(),
				node_id = %self.node.node_id,
				"Sync scheduler disabled for this node"
			);
			return;
		}

		info!(
			node_id = %self.node.node_id,
			interval_secs = self.interval.as_secs(),
			"Starting sync scheduler"
		);

		loop {
			tokio::select! {
				_ = token.cancelled() => {
					info!("Sync scheduler shutdown signal received");
					break;
				}
				_ = tokio::time::sleep(self.interval) => {}
			}

			match self.run_cycle(&token).await {
				Ok(report) => info!(
					pushed = report.pushed,
					pulled = report.pulled,
					ignored = report.ignored,
					pending = report.pending,
					"Sync cycle completed"
				),
				Err(SyncError::Cancelled) => {
					info!("Sync cycle cancelled");
					break;
				}
				Err(e) => warn!(error = %e, "Sync cycle failed"),
			}
		}

		info!("Sync scheduler stopped");
	}

	async fn run_cycle(&self, token: &CancellationToken) -> Result<CycleReport> {
		let mut report = CycleReport::default();

		if let Some(client) = &self.client {
			report.pushed = self.push(client.as_ref(), token).await?;

			let (pulled, ignored) = self.pull(client.as_ref(), token).await?;
			report.pulled = pulled;
			report.ignored = ignored;
		} else {
			debug!("No central configured, skipping push and pull");
		}

		{
			let _write = self.service.transaction_manager().lock_writes().await;
			let txn = self.service.db().begin().await?;
			let now = Utc::now();
			state::record_upload(&txn, &self.node, now).await?;
			state::record_download(&txn, &self.node, None, now).await?;
			txn.commit().await?;
		}

		report.pending = self.pending_count().await?;

		Ok(report)
	}

	/// Send this node's own unsynced entries, oldest first, a page at a time
	async fn push(&self, client: &dyn CentralClient, token: &CancellationToken) -> Result<usize> {
		use sync_log_entity::Column;

		let db = self.service.db();
		let page_size = self.service.page_size();
		let mut pushed = 0;

		loop {
			if token.is_cancelled() {
				return Err(SyncError::Cancelled);
			}

			let entries = sync_log_entity::Entity::find()
				.filter(Column::SourceServer.eq(self.node.node_id.as_str()))
				.filter(Column::Synced.eq(false))
				.order_by_asc(Column::UpdatedAt)
				.order_by_asc(Column::Id)
				.limit(page_size)
				.all(db)
				.await?;
			if entries.is_empty() {
				break;
			}

			let changes = entries
				.iter()
				.map(|entry| {
					Ok(ChangeRecord::new(
						entry.table_name.clone(),
						entry.action,
						entry.record_id.clone(),
						entry.updated_at,
						entry.snapshot()?.as_ref(),
					))
				})
				.collect::<Result<Vec<_>>>()?;

			let request = UploadRequest {
				store_id: Some(self.node.node_id.clone()),
				store_type: Some(self.node.node_type.clone()),
				server_role: Some(self.role.as_str().to_string()),
				server_ip: self.node.address.clone(),
				changes,
			};
			let response = client.upload(&request).await?;

			{
				let _write = self.service.transaction_manager().lock_writes().await;
				sync_log_entity::Entity::update_many()
					.col_expr(Column::Synced, Expr::value(true))
					.filter(Column::Id.is_in(entries.iter().map(|e| e.id)))
					.exec(db)
					.await?;
			}

			debug!(
				sent = entries.len(),
				processed = response.processed_count,
				ignored = response.ignored_count,
				"Pushed page to central"
			);
			pushed += entries.len();

			if (entries.len() as u64) < page_size {
				break;
			}
		}

		Ok(pushed)
	}

	/// Pull central's changes and apply them with central as the remote node
	async fn pull(
		&self,
		client: &dyn CentralClient,
		token: &CancellationToken,
	) -> Result<(usize, usize)> {
		let query = DownloadQuery {
			store_id: Some(self.node.node_id.clone()),
			store_type: Some(self.node.node_type.clone()),
			last_sync_time: None,
		};
		let (mut pulled, mut ignored) = (0, 0);

		for _ in 0..MAX_PULL_PAGES {
			if token.is_cancelled() {
				return Err(SyncError::Cancelled);
			}

			let response = client.download(&query).await?;
			if response.changes.is_empty() {
				break;
			}

			// servers that do not report their id are known by their address
			let central_id = response
				.server_id
				.as_deref()
				.map(str::trim)
				.filter(|id| !id.is_empty())
				.unwrap_or_else(|| client.endpoint());
			let central = NodeIdentity::new(central_id, ServerRole::Central.as_str())
				.with_role(Some(ServerRole::Central))
				.with_address(Some(client.endpoint().to_string()));
			let applied = self
				.service
				.process_upload(&central, response.changes, token)
				.await?;

			pulled += applied.processed_count;
			ignored += applied.ignored_count;
		}

		Ok((pulled, ignored))
	}

	/// This node's own ledger entries still waiting to be pushed
	async fn pending_count(&self) -> Result<u64> {
		use sync_log_entity::Column;

		Ok(sync_log_entity::Entity::find()
			.filter(Column::SourceServer.eq(self.node.node_id.as_str()))
			.filter(Column::Synced.eq(false))
			.count(self.service.db())
			.await?)
	}
}

#[async_trait]
impl Service for SyncScheduler {
	fn name(&self) -> &'static str {
		"sync_scheduler"
	}

	fn is_running(&self) -> bool {
		self.is_running.load(Ordering::SeqCst)
	}

	async fn start(&self) -> AnyResult<()> {
		let mut shutdown = self.shutdown.lock().await;
		if shutdown.is_some() {
			warn!("Sync scheduler already running");
			return Ok(());
		}

		let token = CancellationToken::new();
		let is_running = self.is_running.clone();
		is_running.store(true, Ordering::SeqCst);

		let worker = self.worker.clone();
		let child = token.clone();
		let handle = tokio::spawn(async move {
			worker.run(child).await;
			is_running.store(false, Ordering::SeqCst);
		});

		*shutdown = Some((token, handle));
		Ok(())
	}

	async fn stop(&self) -> AnyResult<()> {
		let Some((token, handle)) = self.shutdown.lock().await.take() else {
			return Ok(());
		};

		info!("Stopping sync scheduler");
		token.cancel();
		handle.await?;
		self.is_running.store(false, Ordering::SeqCst);

		Ok(())
	}
}
