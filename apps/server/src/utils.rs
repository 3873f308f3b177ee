use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Resolves on Ctrl-C or SIGTERM and cancels `token` so in-flight sync work stops
pub async fn axum_shutdown_signal(token: CancellationToken) {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			tracing::error!("Failed to install Ctrl+C handler: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				tracing::error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	info!("Shutdown signal received, stopping server");
	token.cancel();
}
