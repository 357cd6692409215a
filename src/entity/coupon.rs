use chrono::{Months, TimeDelta};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
  #[sea_orm(string_value = "percentage")]
  Percentage,
  #[sea_orm(string_value = "fixed_amount")]
  FixedAmount,
  #[sea_orm(string_value = "free_shipping")]
  FreeShipping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
  #[sea_orm(string_value = "weekly")]
  Weekly,
  #[sea_orm(string_value = "monthly")]
  Monthly,
  #[sea_orm(string_value = "quarterly")]
  Quarterly,
  #[sea_orm(string_value = "yearly")]
  Yearly,
}

impl RecurrencePattern {
  /// Moves `date` forward by exactly one period. Month-based periods clamp
  /// to the last day of a shorter month (Jan 31 + 1 month = Feb 28/29).
  pub fn advance(&self, date: DateTime) -> Option<DateTime> {
    match self {
      RecurrencePattern::Weekly => date.checked_add_signed(TimeDelta::weeks(1)),
      RecurrencePattern::Monthly => date.checked_add_months(Months::new(1)),
      RecurrencePattern::Quarterly => date.checked_add_months(Months::new(3)),
      RecurrencePattern::Yearly => date.checked_add_months(Months::new(12)),
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub vendor_id: Uuid,
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: f64,
  pub max_uses: Option<i32>,
  pub used_count: i32,
  pub start_date: DateTime,
  pub end_date: DateTime,
  pub is_active: bool,
  pub listing_id: Option<Uuid>,
  pub is_recurring: bool,
  pub recurrence_pattern: Option<RecurrencePattern>,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

impl Model {
  pub fn is_exhausted(&self) -> bool {
    self.max_uses.is_some_and(|max| self.used_count >= max)
  }

  pub fn is_live_at(&self, now: DateTime) -> bool {
    self.is_active && self.start_date <= now && now < self.end_date
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::VendorId",
    to = "user::Column::Id"
  )]
  Vendor,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Vendor.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
