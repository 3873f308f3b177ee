//! Shop schema
//!
//! Business tables replicated between nodes. Foreign keys are not enforced at
//! the database level because replicated records may arrive out of order.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(Customers::Table)
					.if_not_exists()
					.col(ColumnDef::new(Customers::Id).uuid().not_null().primary_key())
					.col(ColumnDef::new(Customers::FullName).string().not_null())
					.col(ColumnDef::new(Customers::Phone).string())
					.col(ColumnDef::new(Customers::Email).string())
					.col(
						ColumnDef::new(Customers::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Customers::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Cars::Table)
					.if_not_exists()
					.col(ColumnDef::new(Cars::Id).uuid().not_null().primary_key())
					.col(ColumnDef::new(Cars::CustomerId).uuid().not_null())
					.col(ColumnDef::new(Cars::PlateNumber).string().not_null())
					.col(ColumnDef::new(Cars::Make).string())
					.col(ColumnDef::new(Cars::CarModel).string())
					.col(ColumnDef::new(Cars::Color).string())
					.col(
						ColumnDef::new(Cars::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Cars::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_cars_customer")
					.table(Cars::Table)
					.col(Cars::CustomerId)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Quotations::Table)
					.if_not_exists()
					.col(ColumnDef::new(Quotations::Id).uuid().not_null().primary_key())
					.col(ColumnDef::new(Quotations::CustomerId).uuid().not_null())
					.col(ColumnDef::new(Quotations::CarId).uuid())
					.col(ColumnDef::new(Quotations::Status).string().not_null())
					.col(
						ColumnDef::new(Quotations::TotalCents)
							.big_integer()
							.not_null()
							.default(0),
					)
					.col(ColumnDef::new(Quotations::ValidUntil).timestamp_with_time_zone())
					.col(
						ColumnDef::new(Quotations::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Quotations::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(QuotationItems::Table)
					.if_not_exists()
					.col(ColumnDef::new(QuotationItems::QuotationId).uuid().not_null())
					.col(ColumnDef::new(QuotationItems::LineNo).integer().not_null())
					.col(ColumnDef::new(QuotationItems::Panel).string().not_null())
					.col(ColumnDef::new(QuotationItems::DentSize).string())
					.col(ColumnDef::new(QuotationItems::Description).string())
					.col(
						ColumnDef::new(QuotationItems::PriceCents)
							.big_integer()
							.not_null()
							.default(0),
					)
					.primary_key(
						Index::create()
							.col(QuotationItems::QuotationId)
							.col(QuotationItems::LineNo),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(DentPriceRules::Table)
					.if_not_exists()
					.col(ColumnDef::new(DentPriceRules::DentSize).string().not_null())
					.col(ColumnDef::new(DentPriceRules::Panel).string().not_null())
					.col(
						ColumnDef::new(DentPriceRules::PriceCents)
							.big_integer()
							.not_null(),
					)
					.col(
						ColumnDef::new(DentPriceRules::Active)
							.boolean()
							.not_null()
							.default(true),
					)
					.col(
						ColumnDef::new(DentPriceRules::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.primary_key(
						Index::create()
							.col(DentPriceRules::DentSize)
							.col(DentPriceRules::Panel),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Orders::Table)
					.if_not_exists()
					.col(ColumnDef::new(Orders::OrderUid).string().not_null().primary_key())
					.col(ColumnDef::new(Orders::StoreId).string())
					.col(ColumnDef::new(Orders::CustomerId).uuid())
					.col(ColumnDef::new(Orders::CarId).uuid())
					.col(ColumnDef::new(Orders::QuotationId).uuid())
					.col(ColumnDef::new(Orders::Status).string())
					.col(ColumnDef::new(Orders::Technician).string())
					.col(ColumnDef::new(Orders::TotalCents).big_integer())
					.col(ColumnDef::new(Orders::Notes).text())
					.col(
						ColumnDef::new(Orders::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Orders::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(ColumnDef::new(Orders::CompletedAt).timestamp_with_time_zone())
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_orders_store")
					.table(Orders::Table)
					.col(Orders::StoreId)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(RefreshTokens::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(RefreshTokens::TokenId)
							.string()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(RefreshTokens::UserId).string().not_null())
					.col(ColumnDef::new(RefreshTokens::TokenHash).string().not_null())
					.col(
						ColumnDef::new(RefreshTokens::ExpiresAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(RefreshTokens::Revoked)
							.boolean()
							.not_null()
							.default(false),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(DeviceRegistrations::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(DeviceRegistrations::Id)
							.uuid()
							.not_null()
							.primary_key(),
					)
					.col(
						ColumnDef::new(DeviceRegistrations::DeviceName)
							.string()
							.not_null(),
					)
					.col(ColumnDef::new(DeviceRegistrations::PushToken).string())
					.col(
						ColumnDef::new(DeviceRegistrations::RegisteredAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		Ok(())
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(DeviceRegistrations::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(RefreshTokens::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Orders::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(DentPriceRules::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(QuotationItems::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Quotations::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Cars::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(Customers::Table).to_owned())
			.await?;

		Ok(())
	}
}

#[derive(DeriveIden)]
enum Customers {
	Table,
	Id,
	FullName,
	Phone,
	Email,
	CreatedAt,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum Cars {
	Table,
	Id,
	CustomerId,
	PlateNumber,
	Make,
	CarModel,
	Color,
	CreatedAt,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum Quotations {
	Table,
	Id,
	CustomerId,
	CarId,
	Status,
	TotalCents,
	ValidUntil,
	CreatedAt,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum QuotationItems {
	Table,
	QuotationId,
	LineNo,
	Panel,
	DentSize,
	Description,
	PriceCents,
}

#[derive(DeriveIden)]
enum DentPriceRules {
	Table,
	DentSize,
	Panel,
	PriceCents,
	Active,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum Orders {
	Table,
	OrderUid,
	StoreId,
	CustomerId,
	CarId,
	QuotationId,
	Status,
	Technician,
	TotalCents,
	Notes,
	CreatedAt,
	UpdatedAt,
	CompletedAt,
}

#[derive(DeriveIden)]
enum RefreshTokens {
	Table,
	TokenId,
	UserId,
	TokenHash,
	ExpiresAt,
	Revoked,
}

#[derive(DeriveIden)]
enum DeviceRegistrations {
	Table,
	Id,
	DeviceName,
	PushToken,
	RegisteredAt,
}
