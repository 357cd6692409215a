use sea_orm_migration::prelude::*;

use super::m20261001_000001_create_users::Users;

// Shares count against the monthly quota even after the coupon is gone, so
// there is no foreign key to coupons.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(CouponShares::Table)
          .if_not_exists()
          .col(ColumnDef::new(CouponShares::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(CouponShares::CouponId).uuid().not_null())
          .col(ColumnDef::new(CouponShares::VendorId).uuid().not_null())
          .col(ColumnDef::new(CouponShares::ShopperId).uuid().not_null())
          .col(ColumnDef::new(CouponShares::SharedAt).date_time().not_null())
          .col(
            ColumnDef::new(CouponShares::Viewed)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(CouponShares::ViewedAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_coupon_shares_shopper")
              .from(CouponShares::Table, CouponShares::ShopperId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_coupon_shares_vendor_month")
          .table(CouponShares::Table)
          .col(CouponShares::VendorId)
          .col(CouponShares::SharedAt)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_coupon_shares_pair")
          .table(CouponShares::Table)
          .col(CouponShares::CouponId)
          .col(CouponShares::ShopperId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(CouponShares::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum CouponShares {
  Table,
  Id,
  CouponId,
  VendorId,
  ShopperId,
  SharedAt,
  Viewed,
  ViewedAt,
}
