use serde::Serialize;

use crate::{
  entity::{RecurrencePattern, coupon},
  prelude::*,
  sv::{
    Listing,
    validation::{self, CouponDraft},
  },
};

/// Mutable subset of a coupon. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouponChanges {
  pub discount_value: Option<f64>,
  pub max_uses: Option<i32>,
  pub end_date: Option<DateTime>,
  pub is_recurring: Option<bool>,
  pub recurrence_pattern: Option<RecurrencePattern>,
}

impl CouponChanges {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouponView {
  #[serde(flatten)]
  pub coupon: coupon::Model,
  pub usage_percentage: Option<f64>,
}

impl From<coupon::Model> for CouponView {
  fn from(coupon: coupon::Model) -> Self {
    let usage_percentage = usage_percentage(&coupon);
    Self { coupon, usage_percentage }
  }
}

/// `used_count / max_uses` as a percentage, only for capped coupons.
pub fn usage_percentage(coupon: &coupon::Model) -> Option<f64> {
  coupon
    .max_uses
    .filter(|&max| max > 0)
    .map(|max| f64::from(coupon.used_count) * 100.0 / f64::from(max))
}

pub struct Coupon<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Coupon<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn create(
    &self,
    vendor_id: Uuid,
    draft: CouponDraft,
  ) -> Result<coupon::Model> {
    let draft = validation::validate(draft)?;

    if let Some(listing_id) = draft.listing_id {
      Listing::owned(self.db, vendor_id, listing_id).await?;
      self.ensure_listing_free(listing_id, None).await?;
    }

    if self.by_code(vendor_id, &draft.code).await?.is_some() {
      return Err(Error::DuplicateCode);
    }

    let now = now();
    let coupon = coupon::ActiveModel {
      id: Set(Uuid::new_v4()),
      vendor_id: Set(vendor_id),
      code: Set(draft.code),
      discount_type: Set(draft.discount_type),
      discount_value: Set(draft.discount_value),
      max_uses: Set(draft.max_uses),
      used_count: Set(0),
      start_date: Set(draft.start_date),
      end_date: Set(draft.end_date),
      is_active: Set(true),
      listing_id: Set(draft.listing_id),
      is_recurring: Set(draft.is_recurring),
      recurrence_pattern: Set(draft.recurrence_pattern),
      created_at: Set(now),
      updated_at: Set(now),
    };

    // a concurrent create may win the unique index after our lookup
    coupon
      .insert(self.db)
      .await
      .map_err(|err| Error::or_conflict(err, Error::DuplicateCode))
  }

  pub async fn update(
    &self,
    vendor_id: Uuid,
    coupon_id: Uuid,
    changes: CouponChanges,
  ) -> Result<coupon::Model> {
    let current = self.owned(vendor_id, coupon_id).await?;

    if changes.is_empty() {
      return Ok(current);
    }

    let value = changes.discount_value.unwrap_or(current.discount_value);
    validation::check_discount(current.discount_type, value)?;

    let end_date = changes.end_date.unwrap_or(current.end_date);
    validation::check_window(current.start_date, end_date)?;

    let is_recurring = changes.is_recurring.unwrap_or(current.is_recurring);
    let pattern = changes.recurrence_pattern.or(current.recurrence_pattern);
    validation::check_recurrence(is_recurring, pattern)?;

    if let Some(max) = changes.max_uses {
      validation::check_max_uses(Some(max))?;
      if max < current.used_count {
        return Err(Error::InvalidCap { used: current.used_count });
      }
    }

    // only expiry clears `is_active`, so an end date moved past now revives
    // the coupon
    let now = now();
    let revive = !current.is_active && changes.end_date.is_some() && end_date > now;
    if revive && let Some(listing_id) = current.listing_id {
      self.ensure_listing_free(listing_id, Some(coupon_id)).await?;
    }

    let mut model = coupon::ActiveModel {
      discount_value: Set(value),
      end_date: Set(end_date),
      is_recurring: Set(is_recurring),
      recurrence_pattern: Set(pattern),
      updated_at: Set(now),
      ..Default::default()
    };
    if revive {
      model.is_active = Set(true);
    }

    let mut update = coupon::Entity::update_many()
      .filter(coupon::Column::Id.eq(coupon_id))
      .filter(coupon::Column::VendorId.eq(vendor_id));

    // claims may land between the read above and this write, so the cap is
    // re-checked against the stored count
    if let Some(max) = changes.max_uses {
      model.max_uses = Set(Some(max));
      update = update.filter(coupon::Column::UsedCount.lte(max));
    }

    let result = update.set(model).exec(self.db).await?;

    let updated = self.owned(vendor_id, coupon_id).await?;
    if result.rows_affected == 0 {
      return Err(Error::InvalidCap { used: updated.used_count });
    }

    Ok(updated)
  }

  pub async fn delete(&self, vendor_id: Uuid, coupon_id: Uuid) -> Result<()> {
    let result = coupon::Entity::delete_many()
      .filter(coupon::Column::Id.eq(coupon_id))
      .filter(coupon::Column::VendorId.eq(vendor_id))
      .exec(self.db)
      .await?;

    if result.rows_affected == 0 {
      return Err(Error::NotFound("Coupon"));
    }

    Ok(())
  }

  pub async fn get(&self, vendor_id: Uuid, coupon_id: Uuid) -> Result<CouponView> {
    Ok(self.owned(vendor_id, coupon_id).await?.into())
  }

  pub async fn list(&self, vendor_id: Uuid) -> Result<Vec<CouponView>> {
    let coupons = coupon::Entity::find()
      .filter(coupon::Column::VendorId.eq(vendor_id))
      .order_by_desc(coupon::Column::CreatedAt)
      .all(self.db)
      .await?;

    Ok(coupons.into_iter().map(CouponView::from).collect())
  }

  pub async fn owned(
    &self,
    vendor_id: Uuid,
    coupon_id: Uuid,
  ) -> Result<coupon::Model> {
    coupon::Entity::find_by_id(coupon_id)
      .filter(coupon::Column::VendorId.eq(vendor_id))
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("Coupon"))
  }

  pub async fn by_code(
    &self,
    vendor_id: Uuid,
    code: &str,
  ) -> Result<Option<coupon::Model>> {
    Ok(
      coupon::Entity::find()
        .filter(coupon::Column::VendorId.eq(vendor_id))
        .filter(coupon::Column::Code.eq(code))
        .one(self.db)
        .await?,
    )
  }

  /// Fails with `ListingTaken` when another active coupon (other than
  /// `except`) targets the listing.
  pub async fn ensure_listing_free(
    &self,
    listing_id: Uuid,
    except: Option<Uuid>,
  ) -> Result<()> {
    let mut query = coupon::Entity::find()
      .filter(coupon::Column::ListingId.eq(listing_id))
      .filter(coupon::Column::IsActive.eq(true));

    if let Some(id) = except {
      query = query.filter(coupon::Column::Id.ne(id));
    }

    if query.count(self.db).await? > 0 {
      return Err(Error::ListingTaken);
    }

    Ok(())
  }
}
