use sea_orm_migration::prelude::*;

// No foreign key to coupons: the log is kept after a coupon is deleted.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(CouponRedemptions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(CouponRedemptions::Id)
              .uuid()
              .not_null()
              .primary_key(),
          )
          .col(ColumnDef::new(CouponRedemptions::CouponId).uuid().not_null())
          .col(ColumnDef::new(CouponRedemptions::UserId).uuid().null())
          .col(
            ColumnDef::new(CouponRedemptions::DeviceFingerprint)
              .string()
              .null(),
          )
          .col(ColumnDef::new(CouponRedemptions::ListingId).uuid().null())
          .col(
            ColumnDef::new(CouponRedemptions::RedeemedAt)
              .date_time()
              .not_null(),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_coupon_redemptions_coupon")
          .table(CouponRedemptions::Table)
          .col(CouponRedemptions::CouponId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(CouponRedemptions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum CouponRedemptions {
  Table,
  Id,
  CouponId,
  UserId,
  DeviceFingerprint,
  ListingId,
  RedeemedAt,
}
