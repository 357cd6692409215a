pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_users;
mod m20261001_000002_create_listings;
mod m20261001_000003_create_coupons;
mod m20261001_000004_create_coupon_redemptions;
mod m20261001_000005_create_coupon_shares;
mod m20261012_000006_create_rate_limits;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20261001_000001_create_users::Migration),
      Box::new(m20261001_000002_create_listings::Migration),
      Box::new(m20261001_000003_create_coupons::Migration),
      Box::new(m20261001_000004_create_coupon_redemptions::Migration),
      Box::new(m20261001_000005_create_coupon_shares::Migration),
      Box::new(m20261012_000006_create_rate_limits::Migration),
    ]
  }
}
