use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Directed share. Kept after its coupon is deleted and still counted
/// against the vendor's monthly quota.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupon_shares")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub coupon_id: Uuid,
  pub vendor_id: Uuid,
  pub shopper_id: Uuid,
  pub shared_at: DateTime,
  pub viewed: bool,
  pub viewed_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
