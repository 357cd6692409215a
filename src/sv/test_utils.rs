//! Shared test utilities for database setup

#[cfg(test)]
pub mod test_db {
  use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    Schema, Set,
  };
  use uuid::Uuid;

  use crate::{
    entity::*,
    prelude::now,
    sv::validation::CouponDraft,
  };

  /// Creates an in-memory SQLite database with all required tables
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    let stmt = schema.create_table_from_entity(user::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(listing::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(coupon::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(redemption::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(share::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(rate_limit::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db
  }

  pub async fn user(db: &DatabaseConnection, role: UserRole) -> user::Model {
    let id = Uuid::new_v4();
    user::ActiveModel {
      id: Set(id),
      email: Set(Some(format!("{id}@example.com"))),
      role: Set(role),
      business_name: Set(None),
      vendor_status: Set(None),
      reg_date: Set(now()),
    }
    .insert(db)
    .await
    .unwrap()
  }

  /// An approved vendor.
  pub async fn vendor(db: &DatabaseConnection) -> user::Model {
    let id = Uuid::new_v4();
    user::ActiveModel {
      id: Set(id),
      email: Set(Some(format!("{id}@shop.example.com"))),
      role: Set(UserRole::Vendor),
      business_name: Set(Some("Corner Bakery".into())),
      vendor_status: Set(Some(VendorStatus::Approved)),
      reg_date: Set(now()),
    }
    .insert(db)
    .await
    .unwrap()
  }

  /// `SAVE20`: 20% off, five uses, valid for the next 30 days.
  pub fn draft() -> CouponDraft {
    let start = now() - chrono::TimeDelta::minutes(1);
    CouponDraft {
      code: "SAVE20".into(),
      discount_type: DiscountType::Percentage,
      discount_value: 20.0,
      max_uses: Some(5),
      start_date: start,
      end_date: start + chrono::TimeDelta::days(30),
      listing_id: None,
      is_recurring: false,
      recurrence_pattern: None,
    }
  }
}
