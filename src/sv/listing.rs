use crate::{entity::listing, prelude::*};

pub struct Listing<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Listing<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn create(
    &self,
    vendor_id: Uuid,
    title: &str,
  ) -> Result<listing::Model> {
    let title = title.trim();
    if title.is_empty() {
      return Err(FieldError::new("title", "Title is required").into());
    }

    let listing = listing::ActiveModel {
      id: Set(Uuid::new_v4()),
      vendor_id: Set(vendor_id),
      title: Set(title.to_string()),
      created_at: Set(now()),
    };

    Ok(listing.insert(self.db).await?)
  }

  pub async fn by_vendor(&self, vendor_id: Uuid) -> Result<Vec<listing::Model>> {
    Ok(
      listing::Entity::find()
        .filter(listing::Column::VendorId.eq(vendor_id))
        .order_by_desc(listing::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  /// The listing, if `vendor_id` owns it.
  pub async fn owned<C: ConnectionTrait>(
    conn: &C,
    vendor_id: Uuid,
    listing_id: Uuid,
  ) -> Result<listing::Model> {
    listing::Entity::find_by_id(listing_id)
      .filter(listing::Column::VendorId.eq(vendor_id))
      .one(conn)
      .await?
      .ok_or(Error::NotFound("Listing"))
  }
}
