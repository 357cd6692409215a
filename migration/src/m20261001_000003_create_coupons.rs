use sea_orm_migration::prelude::*;

use super::{
  m20261001_000001_create_users::Users,
  m20261001_000002_create_listings::Listings,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Coupons::Table)
          .if_not_exists()
          .col(ColumnDef::new(Coupons::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(Coupons::VendorId).uuid().not_null())
          .col(ColumnDef::new(Coupons::Code).string_len(20).not_null())
          .col(ColumnDef::new(Coupons::DiscountType).string().not_null())
          .col(ColumnDef::new(Coupons::DiscountValue).double().not_null())
          .col(ColumnDef::new(Coupons::MaxUses).integer().null())
          .col(
            ColumnDef::new(Coupons::UsedCount).integer().not_null().default(0),
          )
          .col(ColumnDef::new(Coupons::StartDate).date_time().not_null())
          .col(ColumnDef::new(Coupons::EndDate).date_time().not_null())
          .col(
            ColumnDef::new(Coupons::IsActive)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(ColumnDef::new(Coupons::ListingId).uuid().null())
          .col(
            ColumnDef::new(Coupons::IsRecurring)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Coupons::RecurrencePattern).string().null())
          .col(ColumnDef::new(Coupons::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Coupons::UpdatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_coupons_vendor")
              .from(Coupons::Table, Coupons::VendorId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_coupons_listing")
              .from(Coupons::Table, Coupons::ListingId)
              .to(Listings::Table, Listings::Id)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_coupons_vendor_code")
          .table(Coupons::Table)
          .col(Coupons::VendorId)
          .col(Coupons::Code)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_coupons_active_end")
          .table(Coupons::Table)
          .col(Coupons::IsActive)
          .col(Coupons::EndDate)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Coupons::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Coupons {
  Table,
  Id,
  VendorId,
  Code,
  DiscountType,
  DiscountValue,
  MaxUses,
  UsedCount,
  StartDate,
  EndDate,
  IsActive,
  ListingId,
  IsRecurring,
  RecurrencePattern,
  CreatedAt,
  UpdatedAt,
}
