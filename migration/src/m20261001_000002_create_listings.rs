use sea_orm_migration::prelude::*;

use super::m20261001_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Listings::Table)
          .if_not_exists()
          .col(ColumnDef::new(Listings::Id).uuid().not_null().primary_key())
          .col(ColumnDef::new(Listings::VendorId).uuid().not_null())
          .col(ColumnDef::new(Listings::Title).string().not_null())
          .col(ColumnDef::new(Listings::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_listings_vendor")
              .from(Listings::Table, Listings::VendorId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_listings_vendor")
          .table(Listings::Table)
          .col(Listings::VendorId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Listings::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Listings {
  Table,
  Id,
  VendorId,
  Title,
  CreatedAt,
}
