//! Tracing setup for node binaries

use std::path::Path;
use tracing_appender::{
	non_blocking::WorkerGuard,
	rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log to stdout and to a daily rotated `node.log` under `logs_dir`
///
/// `RUST_LOG` wins over `default_level`. Keep the returned guard alive for as
/// long as file logging is wanted, dropping it flushes the file writer.
pub fn init_logging(logs_dir: &Path, default_level: &str) -> anyhow::Result<WorkerGuard> {
	std::fs::create_dir_all(logs_dir)?;

	let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "node.log");
	let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_filter(default_level)));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(fmt::layer().with_target(true).with_writer(std::io::stdout))
		.with(
			fmt::layer()
				.with_target(true)
				.with_thread_ids(true)
				.with_ansi(false)
				.with_writer(file_writer),
		)
		.try_init()
		.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

	Ok(guard)
}

fn default_filter(level: &str) -> String {
	let level = match level.trim() {
		"" => "info",
		other => other,
	};
	format!("warn,ds_core={level},ds_server={level}")
}
