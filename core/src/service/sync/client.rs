//! Client for a store talking to central

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::protocol::{DownloadQuery, DownloadResponse, UploadRequest, UploadResponse};
use crate::infra::db::entities::ServerRole;
use crate::infra::sync::{Result, SyncError};

/// Header carrying the caller's role on download requests
pub const SERVER_ROLE_HEADER: &str = "X-Server-Role";

/// Transport to the central node
#[async_trait]
pub trait CentralClient: Send + Sync {
	async fn upload(&self, request: &UploadRequest) -> Result<UploadResponse>;

	async fn download(&self, query: &DownloadQuery) -> Result<DownloadResponse>;

	/// Address of central, for logs and sync state
	fn endpoint(&self) -> &str;
}

/// [`CentralClient`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpCentralClient {
	client: reqwest::Client,
	base_url: String,
	role: ServerRole,
}

impl HttpCentralClient {
	pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
		let base_url = base_url.into().trim_end_matches('/').to_string();
		if base_url.is_empty() {
			return Err(SyncError::Validation("central url is empty".into()));
		}

		let client = reqwest::Client::builder().timeout(timeout).build()?;

		Ok(Self {
			client,
			base_url,
			role: ServerRole::Store,
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}
}

#[async_trait]
impl CentralClient for HttpCentralClient {
	async fn upload(&self, request: &UploadRequest) -> Result<UploadResponse> {
		debug!(changes = request.changes.len(), url = %self.base_url, "Uploading to central");

		let response = self
			.client
			.post(self.url("/api/sync/upload"))
			.header(SERVER_ROLE_HEADER, self.role.as_str())
			.json(request)
			.send()
			.await?
			.error_for_status()?;

		Ok(response.json().await?)
	}

	async fn download(&self, query: &DownloadQuery) -> Result<DownloadResponse> {
		debug!(url = %self.base_url, "Downloading from central");

		let response = self
			.client
			.get(self.url("/api/sync/download"))
			.header(SERVER_ROLE_HEADER, self.role.as_str())
			.query(query)
			.send()
			.await?
			.error_for_status()?;

		Ok(response.json().await?)
	}

	fn endpoint(&self) -> &str {
		&self.base_url
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_rejects_empty_url() {
		assert!(matches!(
			HttpCentralClient::new("  ".trim(), Duration::from_secs(1)),
			Err(SyncError::Validation(_))
		));
	}

	#[test]
	fn test_trailing_slash_is_trimmed() {
		let client = HttpCentralClient::new("http://central:8080/", Duration::from_secs(1)).unwrap();
		assert_eq!(client.endpoint(), "http://central:8080");
		assert_eq!(
			client.url("/api/sync/upload"),
			"http://central:8080/api/sync/upload"
		);
	}
}
