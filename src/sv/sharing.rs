use chrono::{Datelike, NaiveTime};
use sea_orm::QuerySelect;
use serde::Serialize;

use crate::{
  entity::{coupon, share, user},
  prelude::*,
  sv::{Coupon, User},
};

pub const DEFAULT_MONTHLY_LIMIT: u64 = 20;

/// Same coupon to the same shopper is refused inside this window.
pub fn duplicate_window() -> TimeDelta {
  TimeDelta::hours(24)
}

/// Midnight on the first day of `now`'s calendar month.
pub fn month_start(now: DateTime) -> DateTime {
  let date = now.date();
  date.with_day(1).unwrap_or(date).and_time(NaiveTime::MIN)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedShare {
  #[serde(flatten)]
  pub share: share::Model,
  pub coupon: Option<coupon::Model>,
}

pub struct Sharing<'a> {
  db: &'a DatabaseConnection,
  monthly_limit: u64,
}

impl<'a> Sharing<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db, monthly_limit: DEFAULT_MONTHLY_LIMIT }
  }

  pub fn with_limit(self, monthly_limit: u64) -> Self {
    Self { monthly_limit, ..self }
  }

  pub async fn share(
    &self,
    vendor_id: Uuid,
    coupon_id: Uuid,
    shopper_id: Uuid,
  ) -> Result<share::Model> {
    let coupon = Coupon::new(self.db).owned(vendor_id, coupon_id).await?;

    let now = now();
    if !coupon.is_active || coupon.end_date <= now {
      return Err(Claim::Expired.into());
    }

    User::new(self.db)
      .by_id(shopper_id)
      .await?
      .ok_or(Error::NotFound("Shopper"))?;

    let txn = self.db.begin().await?;

    // the vendor row lock serializes one vendor's shares, so the duplicate
    // and quota counts below hold until the insert commits
    user::Entity::find_by_id(vendor_id).lock_exclusive().one(&txn).await?;

    let recent = share::Entity::find()
      .filter(share::Column::CouponId.eq(coupon_id))
      .filter(share::Column::ShopperId.eq(shopper_id))
      .filter(share::Column::SharedAt.gt(now - duplicate_window()))
      .count(&txn)
      .await?;
    if recent > 0 {
      return Err(Error::DuplicateShare);
    }

    if shared_since(&txn, vendor_id, month_start(now)).await? >= self.monthly_limit {
      return Err(Error::QuotaExceeded { limit: self.monthly_limit });
    }

    let share = share::ActiveModel {
      id: Set(Uuid::new_v4()),
      coupon_id: Set(coupon_id),
      vendor_id: Set(vendor_id),
      shopper_id: Set(shopper_id),
      shared_at: Set(now),
      viewed: Set(false),
      viewed_at: Set(None),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
      vendor = %vendor_id,
      coupon = %coupon_id,
      shopper = %shopper_id,
      "coupon shared"
    );

    Ok(share)
  }

  pub async fn used_this_month(&self, vendor_id: Uuid) -> Result<u64> {
    self.used_this_month_at(vendor_id, now()).await
  }

  pub fn remaining(&self, used: u64) -> u64 {
    self.monthly_limit.saturating_sub(used)
  }

  async fn used_this_month_at(&self, vendor_id: Uuid, now: DateTime) -> Result<u64> {
    shared_since(self.db, vendor_id, month_start(now)).await
  }

  /// One-way `viewed` flip. Marking an already viewed share is a no-op.
  pub async fn mark_viewed(
    &self,
    shopper_id: Uuid,
    share_id: Uuid,
  ) -> Result<share::Model> {
    let share = self.received_one(shopper_id, share_id).await?;
    if share.viewed {
      return Ok(share);
    }

    share::Entity::update_many()
      .set(share::ActiveModel {
        viewed: Set(true),
        viewed_at: Set(Some(now())),
        ..Default::default()
      })
      .filter(share::Column::Id.eq(share_id))
      .filter(share::Column::Viewed.eq(false))
      .exec(self.db)
      .await?;

    self.received_one(shopper_id, share_id).await
  }

  pub async fn received(&self, shopper_id: Uuid) -> Result<Vec<ReceivedShare>> {
    let shares = share::Entity::find()
      .filter(share::Column::ShopperId.eq(shopper_id))
      .order_by_desc(share::Column::SharedAt)
      .all(self.db)
      .await?;

    let ids: HashSet<Uuid> = shares.iter().map(|s| s.coupon_id).collect();
    let coupons: HashMap<Uuid, coupon::Model> = coupon::Entity::find()
      .filter(coupon::Column::Id.is_in(ids))
      .all(self.db)
      .await?
      .into_iter()
      .map(|c| (c.id, c))
      .collect();

    Ok(
      shares
        .into_iter()
        .map(|share| {
          let coupon = coupons.get(&share.coupon_id).cloned();
          ReceivedShare { share, coupon }
        })
        .collect(),
    )
  }

  async fn received_one(
    &self,
    shopper_id: Uuid,
    share_id: Uuid,
  ) -> Result<share::Model> {
    share::Entity::find_by_id(share_id)
      .filter(share::Column::ShopperId.eq(shopper_id))
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("Share"))
  }
}

async fn shared_since<C: ConnectionTrait>(
  conn: &C,
  vendor_id: Uuid,
  since: DateTime,
) -> Result<u64> {
  Ok(
    share::Entity::find()
      .filter(share::Column::VendorId.eq(vendor_id))
      .filter(share::Column::SharedAt.gte(since))
      .count(conn)
      .await?,
  )
}
