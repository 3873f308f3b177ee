//! HTTP surface of a sync node

use axum::{
	extract::{ConnectInfo, Query, State},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use ds_core::{
	infra::{
		db::entities::{store_sync_state, ServerRole},
		sync::{NodeIdentity, SyncError},
	},
	service::sync::{
		client::SERVER_ROLE_HEADER, DownloadQuery, DownloadResponse, ErrorResponse, SyncService,
		UploadRequest, UploadResponse,
	},
};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
	pub sync: Arc<SyncService>,
	/// Cancelled on shutdown, aborts in-flight uploads and downloads
	pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(|| async { "OK" }))
		.route("/api/sync/upload", post(upload))
		.route("/api/sync/download", get(download))
		.route("/api/sync/states", get(states))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Sync errors as JSON error bodies
pub struct ApiError(SyncError);

impl From<SyncError> for ApiError {
	fn from(err: SyncError) -> Self {
		Self(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, message) = match self.0 {
			SyncError::Validation(message) => (StatusCode::BAD_REQUEST, message),
			other => {
				error!(error = %other, "Sync request failed");
				(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
			}
		};

		(status, Json(ErrorResponse { error: message })).into_response()
	}
}

async fn upload(
	State(state): State<AppState>,
	peer: Option<ConnectInfo<SocketAddr>>,
	headers: HeaderMap,
	Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
	let role = request.server_role.as_deref().and_then(parse_role);
	let address = request
		.server_ip
		.clone()
		.filter(|ip| !ip.trim().is_empty())
		.or_else(|| remote_address(&headers, peer.as_ref()));

	let node = NodeIdentity::new(
		request.store_id.unwrap_or_default(),
		request.store_type.unwrap_or_default(),
	)
	.with_role(role)
	.with_address(address);

	let response = state
		.sync
		.process_upload(&node, request.changes, &state.shutdown.child_token())
		.await?;

	Ok(Json(response))
}

async fn download(
	State(state): State<AppState>,
	peer: Option<ConnectInfo<SocketAddr>>,
	headers: HeaderMap,
	Query(query): Query<DownloadQuery>,
) -> Result<Json<DownloadResponse>, ApiError> {
	let role = headers
		.get(SERVER_ROLE_HEADER)
		.and_then(|v| v.to_str().ok())
		.and_then(parse_role);

	let node = NodeIdentity::new(
		query.store_id.unwrap_or_default(),
		query.store_type.unwrap_or_default(),
	)
	.with_role(role)
	.with_address(remote_address(&headers, peer.as_ref()));

	let response = state
		.sync
		.get_updates(&node, query.last_sync_time, &state.shutdown.child_token())
		.await?;

	Ok(Json(response))
}

async fn states(
	State(state): State<AppState>,
) -> Result<Json<Vec<store_sync_state::Model>>, ApiError> {
	Ok(Json(state.sync.states().await?))
}

fn parse_role(raw: &str) -> Option<ServerRole> {
	raw.trim().parse().ok()
}

/// First `X-Forwarded-For` hop, else the socket peer
fn remote_address(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
	headers
		.get("x-forwarded-for")
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.split(',').next())
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(str::to_string)
		.or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
}
