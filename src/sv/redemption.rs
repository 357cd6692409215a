use sea_orm::{Condition, sea_query::Expr};
use serde::Serialize;

use crate::{
  entity::{coupon, redemption},
  prelude::*,
  sv::{Coupon, validation},
};

const FINGERPRINT_MAX_LEN: usize = 128;

/// Who is claiming and where from. `user_id` comes from the authenticated
/// actor, never from the request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimContext {
  pub user_id: Option<Uuid>,
  pub device_fingerprint: Option<String>,
  pub listing_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimOutcome {
  pub redemption_id: Uuid,
  pub coupon_id: Uuid,
  pub used_count: i32,
  pub max_uses: Option<i32>,
  pub remaining: Option<i32>,
}

pub struct Redemption<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Redemption<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn claim(
    &self,
    code: &str,
    vendor_id: Uuid,
    ctx: ClaimContext,
  ) -> Result<ClaimOutcome> {
    // a malformed code cannot match any stored coupon
    let code = validation::normalize_code(code)
      .map_err(|_| Error::NotFound("Coupon"))?;

    let coupon = Coupon::new(self.db)
      .by_code(vendor_id, &code)
      .await?
      .ok_or(Error::NotFound("Coupon"))?;

    let now = now();
    if !coupon.is_live_at(now) {
      return Err(Claim::Expired.into());
    }
    if coupon.is_exhausted() {
      return Err(Claim::Exhausted.into());
    }

    let fingerprint = ctx
      .device_fingerprint
      .map(|fp| fp.trim().chars().take(FINGERPRINT_MAX_LEN).collect::<String>())
      .filter(|fp| !fp.is_empty());

    let txn = self.db.begin().await?;

    // increment-if-below-cap; the row lock taken here serializes claims
    let result = coupon::Entity::update_many()
      .col_expr(
        coupon::Column::UsedCount,
        Expr::col(coupon::Column::UsedCount).add(1),
      )
      .col_expr(coupon::Column::UpdatedAt, Expr::value(now))
      .filter(coupon::Column::Id.eq(coupon.id))
      .filter(coupon::Column::IsActive.eq(true))
      .filter(coupon::Column::StartDate.lte(now))
      .filter(coupon::Column::EndDate.gt(now))
      .filter(
        Condition::any().add(coupon::Column::MaxUses.is_null()).add(
          Expr::col(coupon::Column::UsedCount)
            .lt(Expr::col(coupon::Column::MaxUses)),
        ),
      )
      .exec(&txn)
      .await?;

    if result.rows_affected == 0 {
      txn.rollback().await?;
      return Err(self.refusal(coupon.id, now).await?.into());
    }

    let redemption = redemption::ActiveModel {
      id: Set(Uuid::new_v4()),
      coupon_id: Set(coupon.id),
      user_id: Set(ctx.user_id),
      device_fingerprint: Set(fingerprint),
      listing_id: Set(ctx.listing_id),
      redeemed_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let coupon = coupon::Entity::find_by_id(coupon.id)
      .one(&txn)
      .await?
      .ok_or(Error::NotFound("Coupon"))?;

    txn.commit().await?;

    debug!(
      coupon = %coupon.id,
      used = coupon.used_count,
      max = ?coupon.max_uses,
      "coupon claimed"
    );

    Ok(ClaimOutcome {
      redemption_id: redemption.id,
      coupon_id: coupon.id,
      used_count: coupon.used_count,
      max_uses: coupon.max_uses,
      remaining: coupon.max_uses.map(|max| (max - coupon.used_count).max(0)),
    })
  }

  /// Why the conditional increment matched nothing.
  async fn refusal(&self, coupon_id: Uuid, now: DateTime) -> Result<Claim> {
    let coupon = coupon::Entity::find_by_id(coupon_id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("Coupon"))?;

    if coupon.is_live_at(now) && coupon.is_exhausted() {
      Ok(Claim::Exhausted)
    } else if coupon.is_live_at(now) {
      Err(Error::Internal(format!("claim on {coupon_id} matched no row")))
    } else {
      Ok(Claim::Expired)
    }
  }

  pub async fn history(
    &self,
    vendor_id: Uuid,
    coupon_id: Uuid,
  ) -> Result<Vec<redemption::Model>> {
    Coupon::new(self.db).owned(vendor_id, coupon_id).await?;

    Ok(
      redemption::Entity::find()
        .filter(redemption::Column::CouponId.eq(coupon_id))
        .order_by_desc(redemption::Column::RedeemedAt)
        .all(self.db)
        .await?,
    )
  }
}
