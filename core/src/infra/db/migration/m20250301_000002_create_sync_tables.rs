use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		// Create sync_log table
		manager
			.create_table(
				Table::create()
					.table(SyncLog::Table)
					.if_not_exists()
					.col(ColumnDef::new(SyncLog::Id).uuid().not_null().primary_key())
					.col(ColumnDef::new(SyncLog::TableName).string().not_null())
					.col(ColumnDef::new(SyncLog::RecordId).string().not_null())
					.col(ColumnDef::new(SyncLog::Action).string().not_null())
					.col(
						ColumnDef::new(SyncLog::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(ColumnDef::new(SyncLog::SourceServer).string().not_null())
					.col(ColumnDef::new(SyncLog::StoreType).string())
					.col(
						ColumnDef::new(SyncLog::Synced)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(ColumnDef::new(SyncLog::Payload).text())
					.to_owned(),
			)
			.await?;

		// Pull query: unsynced entries for a node type in time order
		manager
			.create_index(
				Index::create()
					.name("idx_sync_log_pending")
					.table(SyncLog::Table)
					.col(SyncLog::Synced)
					.col(SyncLog::StoreType)
					.col(SyncLog::UpdatedAt)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_sync_log_record")
					.table(SyncLog::Table)
					.col(SyncLog::TableName)
					.col(SyncLog::RecordId)
					.to_owned(),
			)
			.await?;

		// Create store_sync_state table
		manager
			.create_table(
				Table::create()
					.table(StoreSyncState::Table)
					.if_not_exists()
					.col(ColumnDef::new(StoreSyncState::StoreId).string().not_null())
					.col(ColumnDef::new(StoreSyncState::StoreType).string().not_null())
					.col(ColumnDef::new(StoreSyncState::ServerRole).string())
					.col(ColumnDef::new(StoreSyncState::ServerIp).string())
					.col(ColumnDef::new(StoreSyncState::LastUploadTime).timestamp_with_time_zone())
					.col(ColumnDef::new(StoreSyncState::LastDownloadTime).timestamp_with_time_zone())
					.col(ColumnDef::new(StoreSyncState::LastCursor).string())
					.col(
						ColumnDef::new(StoreSyncState::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(StoreSyncState::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.primary_key(
						Index::create()
							.col(StoreSyncState::StoreId)
							.col(StoreSyncState::StoreType),
					)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(StoreSyncState::Table).to_owned())
			.await?;

		manager
			.drop_table(Table::drop().table(SyncLog::Table).to_owned())
			.await?;

		Ok(())
	}
}

#[derive(DeriveIden)]
enum SyncLog {
	Table,
	Id,
	TableName,
	RecordId,
	Action,
	UpdatedAt,
	SourceServer,
	StoreType,
	Synced,
	Payload,
}

#[derive(DeriveIden)]
enum StoreSyncState {
	Table,
	StoreId,
	StoreType,
	ServerRole,
	ServerIp,
	LastUploadTime,
	LastDownloadTime,
	LastCursor,
	CreatedAt,
	UpdatedAt,
}
