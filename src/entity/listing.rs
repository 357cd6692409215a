use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "listings")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: Uuid,
  pub vendor_id: Uuid,
  pub title: String,
  pub created_at: DateTime,
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
