use sea_orm::Condition;
use serde::Serialize;

use crate::{entity::coupon, prelude::*, sv::Coupon};

pub fn expiring_horizon() -> TimeDelta {
  TimeDelta::days(7)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpireReport {
  pub expired_now: u64,
  pub expiring_within_7_days: u64,
  pub failed: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenewReport {
  pub renewed: Vec<Uuid>,
  /// Left inactive because their listing already has an active coupon.
  pub listing_taken: Vec<Uuid>,
  pub failed: Vec<Uuid>,
}

/// Batch jobs over all coupons. Each coupon is written on its own, so one
/// failure is reported and the rest of the batch still runs.
pub struct Lifecycle<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Lifecycle<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn expire_lapsed(&self) -> Result<ExpireReport> {
    self.expire_lapsed_at(now()).await
  }

  pub async fn expire_lapsed_at(&self, now: DateTime) -> Result<ExpireReport> {
    let lapsed = coupon::Entity::find()
      .filter(coupon::Column::IsActive.eq(true))
      .filter(coupon::Column::EndDate.lte(now))
      .all(self.db)
      .await?;

    let mut report = ExpireReport::default();

    for coupon in lapsed {
      // the state filter makes a second run (or a racing one) count nothing
      let result = coupon::Entity::update_many()
        .set(coupon::ActiveModel {
          is_active: Set(false),
          updated_at: Set(now),
          ..Default::default()
        })
        .filter(coupon::Column::Id.eq(coupon.id))
        .filter(coupon::Column::IsActive.eq(true))
        .filter(coupon::Column::EndDate.lte(now))
        .exec(self.db)
        .await;

      match result {
        Ok(res) => report.expired_now += res.rows_affected,
        Err(err) => {
          error!(coupon = %coupon.id, "failed to expire coupon: {err}");
          report.failed.push(coupon.id);
        }
      }
    }

    report.expiring_within_7_days = coupon::Entity::find()
      .filter(coupon::Column::IsActive.eq(true))
      .filter(coupon::Column::EndDate.gt(now))
      .filter(coupon::Column::EndDate.lte(now + expiring_horizon()))
      .count(self.db)
      .await?;

    Ok(report)
  }

  pub async fn renew_recurring(&self) -> Result<RenewReport> {
    self.renew_recurring_at(now()).await
  }

  /// Rolls each due recurring coupon forward by exactly one period from its
  /// previous end date, even when several periods have elapsed.
  pub async fn renew_recurring_at(&self, now: DateTime) -> Result<RenewReport> {
    let due = coupon::Entity::find()
      .filter(coupon::Column::IsRecurring.eq(true))
      .filter(coupon::Column::RecurrencePattern.is_not_null())
      .filter(
        Condition::any()
          .add(coupon::Column::IsActive.eq(false))
          .add(coupon::Column::EndDate.lte(now)),
      )
      .all(self.db)
      .await?;

    let mut report = RenewReport::default();

    for coupon in due {
      match self.renew_one(&coupon, now).await {
        Ok(true) => report.renewed.push(coupon.id),
        Ok(false) => {
          debug!(coupon = %coupon.id, "coupon changed before renewal, skipped")
        }
        Err(Error::ListingTaken) => {
          info!(coupon = %coupon.id, "listing has another active coupon, renewal held");
          report.listing_taken.push(coupon.id);
        }
        Err(err) => {
          error!(coupon = %coupon.id, "failed to renew coupon: {err}");
          report.failed.push(coupon.id);
        }
      }
    }

    Ok(report)
  }

  async fn renew_one(&self, coupon: &coupon::Model, now: DateTime) -> Result<bool> {
    let pattern = coupon
      .recurrence_pattern
      .ok_or_else(|| Error::Internal("recurring coupon without pattern".into()))?;

    let start_date = coupon.end_date;
    let end_date = pattern
      .advance(start_date)
      .ok_or_else(|| Error::Internal("recurrence overflows the calendar".into()))?;

    if let Some(listing_id) = coupon.listing_id {
      Coupon::new(self.db)
        .ensure_listing_free(listing_id, Some(coupon.id))
        .await?;
    }

    // matching on the old end date renews a coupon at most once per state
    let result = coupon::Entity::update_many()
      .set(coupon::ActiveModel {
        start_date: Set(start_date),
        end_date: Set(end_date),
        used_count: Set(0),
        is_active: Set(true),
        updated_at: Set(now),
        ..Default::default()
      })
      .filter(coupon::Column::Id.eq(coupon.id))
      .filter(coupon::Column::IsRecurring.eq(true))
      .filter(coupon::Column::EndDate.eq(coupon.end_date))
      .exec(self.db)
      .await?;

    Ok(result.rows_affected > 0)
  }
}
