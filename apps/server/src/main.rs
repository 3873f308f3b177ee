use std::{
	net::{Ipv4Addr, SocketAddr},
	path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use ds_core::{
	config::{default_data_dir, AppConfig},
	infra::logging::init_logging,
	Node, ServerRole,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod routes;
mod utils;

/// Dent shop sync node
#[derive(Parser, Debug)]
#[command(name = "ds-server", version, about)]
struct Args {
	/// Data directory holding node.json, node.db and logs
	#[arg(long, env = "DS_DATA_DIR")]
	data_dir: Option<PathBuf>,

	#[arg(long, env = "DS_PORT", default_value_t = 8080)]
	port: u16,

	#[arg(long, env = "DS_NODE_ID")]
	node_id: Option<String>,

	#[arg(long, env = "DS_NODE_TYPE")]
	node_type: Option<String>,

	/// `central` or `store`
	#[arg(long, env = "DS_ROLE")]
	role: Option<ServerRole>,

	/// Base url of central, stores only
	#[arg(long, env = "DS_CENTRAL_URL")]
	central_url: Option<String>,
}

impl Args {
	fn apply(&self, config: &mut AppConfig) {
		if let Some(node_id) = &self.node_id {
			config.node.node_id = node_id.clone();
		}
		if let Some(node_type) = &self.node_type {
			config.node.node_type = node_type.clone();
		}
		if let Some(role) = self.role {
			config.node.role = role;
		}
		if let Some(url) = &self.central_url {
			config.node.central_url = Some(url.clone());
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let data_dir = match &args.data_dir {
		Some(dir) => dir.clone(),
		None => default_data_dir()?,
	};

	let mut config = AppConfig::load_from(&data_dir).context("Failed to load node config")?;
	args.apply(&mut config);

	let _log_guard = init_logging(&config.logs_dir(), &config.log_level)?;

	let node = Node::new(config).await?;
	node.start().await?;

	let shutdown = CancellationToken::new();
	let app = routes::router(routes::AppState {
		sync: node.sync.clone(),
		shutdown: shutdown.clone(),
	});

	let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port));
	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("Failed to bind {}", addr))?;
	info!("Listening on http://localhost:{}", args.port);

	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.with_graceful_shutdown(utils::axum_shutdown_signal(shutdown))
	.await
	.context("HTTP server error")?;

	node.shutdown().await?;
	info!("Server stopped");

	Ok(())
}
