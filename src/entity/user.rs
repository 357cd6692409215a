use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{coupon, listing};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
  #[sea_orm(string_value = "shopper")]
  #[default]
  Shopper,
  #[sea_orm(string_value = "vendor")]
  Vendor,
  #[sea_orm(string_value = "admin")]
  Admin,
}

impl UserRole {
  pub fn as_str(&self) -> &'static str {
    match self {
      UserRole::Shopper => "shopper",
      UserRole::Vendor => "vendor",
      UserRole::Admin => "admin",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "shopper" => Some(UserRole::Shopper),
      "vendor" => Some(UserRole::Vendor),
      "admin" => Some(UserRole::Admin),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum VendorStatus {
  #[sea_orm(string_value = "pending")]
  Pending,
  #[sea_orm(string_value = "approved")]
  Approved,
  #[sea_orm(string_value = "rejected")]
  Rejected,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub email: Option<String>,
  pub role: UserRole,
  pub business_name: Option<String>,
  pub vendor_status: Option<VendorStatus>,
  pub reg_date: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "coupon::Entity")]
  Coupons,
  #[sea_orm(has_many = "listing::Entity")]
  Listings,
}

impl Related<coupon::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Coupons.def()
  }
}

impl Related<listing::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Listings.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
