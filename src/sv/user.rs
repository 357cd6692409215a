use crate::{
  entity::{UserRole, VendorStatus, user},
  prelude::*,
};

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Mirrors an authenticated actor into `users`. The header role seeds new
  /// rows; afterwards vendor approval owns the role and only an admin grant
  /// from the identity provider overrides it.
  pub async fn get_or_create(
    &self,
    id: Uuid,
    role: UserRole,
    email: Option<String>,
  ) -> Result<user::Model> {
    if let Some(user) = user::Entity::find_by_id(id).one(self.db).await? {
      let email_changed = email.is_some() && email != user.email;
      let promote = role == UserRole::Admin && user.role != UserRole::Admin;
      if !email_changed && !promote {
        return Ok(user);
      }

      let email = if email_changed { email } else { user.email.clone() };
      let role = if promote { UserRole::Admin } else { user.role };
      let user =
        user::ActiveModel { role: Set(role), email: Set(email), ..user.into() }
          .update(self.db)
          .await?;
      return Ok(user);
    }

    let user = user::ActiveModel {
      id: Set(id),
      email: Set(email),
      role: Set(role),
      business_name: Set(None),
      vendor_status: Set(None),
      reg_date: Set(now()),
    };

    Ok(user.insert(self.db).await?)
  }

  pub async fn by_id(&self, id: Uuid) -> Result<Option<user::Model>> {
    let user = user::Entity::find_by_id(id).one(self.db).await?;
    Ok(user)
  }

  /// Files a vendor application. Re-applying after a rejection puts the
  /// application back into review.
  pub async fn apply_vendor(
    &self,
    id: Uuid,
    business_name: &str,
  ) -> Result<user::Model> {
    let business_name = business_name.trim();
    if business_name.is_empty() {
      let err = FieldError::new("business_name", "Business name is required");
      return Err(err.into());
    }

    let user = user::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("User"))?;

    if user.vendor_status == Some(VendorStatus::Approved) {
      return Err(Error::InvalidArgs("Vendor is already approved".into()));
    }

    let user = user::ActiveModel {
      business_name: Set(Some(business_name.to_string())),
      vendor_status: Set(Some(VendorStatus::Pending)),
      ..user.into()
    }
    .update(self.db)
    .await?;

    Ok(user)
  }

  pub async fn review_vendor(
    &self,
    vendor_id: Uuid,
    approve: bool,
  ) -> Result<user::Model> {
    let user = user::Entity::find_by_id(vendor_id)
      .one(self.db)
      .await?
      .ok_or(Error::NotFound("Vendor"))?;

    if user.vendor_status.is_none() {
      return Err(Error::NotFound("Vendor application"));
    }

    let (status, role) = match (approve, user.role) {
      (true, UserRole::Admin) => (VendorStatus::Approved, UserRole::Admin),
      (true, _) => (VendorStatus::Approved, UserRole::Vendor),
      (false, role) => (VendorStatus::Rejected, role),
    };

    let user = user::ActiveModel {
      vendor_status: Set(Some(status)),
      role: Set(role),
      ..user.into()
    }
    .update(self.db)
    .await?;

    Ok(user)
  }

  pub async fn pending_vendors(&self) -> Result<Vec<user::Model>> {
    let users = user::Entity::find()
      .filter(user::Column::VendorStatus.eq(VendorStatus::Pending))
      .order_by_asc(user::Column::RegDate)
      .all(self.db)
      .await?;
    Ok(users)
  }
}

/// Coupon management is open to approved vendors only.
pub fn ensure_vendor(user: &user::Model) -> Result<()> {
  let approved = user.vendor_status == Some(VendorStatus::Approved);
  if user.role == UserRole::Vendor && approved {
    Ok(())
  } else {
    Err(Error::Forbidden)
  }
}

pub fn ensure_admin(user: &user::Model) -> Result<()> {
  if user.role == UserRole::Admin { Ok(()) } else { Err(Error::Forbidden) }
}
