//! Database infrastructure using SeaORM

use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migration;

/// Database wrapper for a node
#[derive(Debug, Clone)]
pub struct Database {
	/// SeaORM database connection
	conn: DatabaseConnection,
}

impl Database {
	/// Create the database at the specified path, or open it if it exists
	pub async fn create(path: &Path) -> Result<Self, DbErr> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)
				.map_err(|e| DbErr::Custom(format!("Failed to create directory: {}", e)))?;
		}

		let conn = Self::connect(format!("sqlite://{}?mode=rwc", path.display())).await?;

		info!("Created database at {:?}", path);

		Ok(Self { conn })
	}

	/// Open an existing database
	pub async fn open(path: &Path) -> Result<Self, DbErr> {
		if !path.exists() {
			return Err(DbErr::Custom(format!(
				"Database does not exist: {}",
				path.display()
			)));
		}

		let conn = Self::connect(format!("sqlite://{}", path.display())).await?;

		info!("Opened database at {:?}", path);

		Ok(Self { conn })
	}

	async fn connect(url: String) -> Result<DatabaseConnection, DbErr> {
		let mut opt = ConnectOptions::new(url);
		opt.max_connections(5)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.idle_timeout(Duration::from_secs(300))
			.sqlx_logging(false);

		SeaDatabase::connect(opt).await
	}

	/// Run migrations
	pub async fn migrate(&self) -> Result<(), DbErr> {
		migration::Migrator::up(&self.conn, None).await?;
		info!("Database migrations completed successfully");
		Ok(())
	}

	/// Get the database connection
	pub fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}
}
