use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only log of successful claims. Rows outlive their coupon.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupon_redemptions")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub coupon_id: Uuid,
  pub user_id: Option<Uuid>,
  pub device_fingerprint: Option<String>,
  pub listing_id: Option<Uuid>,
  pub redeemed_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
