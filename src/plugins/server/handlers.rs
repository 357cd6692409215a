use std::{net::SocketAddr, sync::Arc};

use axum::{
  Json,
  extract::{ConnectInfo, State},
  http::StatusCode,
  response::Response,
};
use serde::Deserialize;

use super::{
  auth::Actor,
  reply::{Payload, Traced, ok, success},
};
use crate::{
  entity::{DiscountType, RecurrencePattern, VendorStatus, user},
  plugins::cron,
  prelude::*,
  state::AppState,
  sv::{
    contact::ContactMessage,
    coupon::{CouponChanges, CouponView},
    notify::Notification,
    redemption::ClaimContext,
    validation::CouponDraft,
  },
};

type UtcDateTime = chrono::DateTime<Utc>;

#[derive(Debug, Deserialize)]
pub struct NewCoupon {
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: f64,
  pub max_uses: Option<i32>,
  /// Defaults to now.
  pub start_date: Option<UtcDateTime>,
  pub end_date: UtcDateTime,
  pub listing_id: Option<Uuid>,
  #[serde(default)]
  pub is_recurring: bool,
  pub recurrence_pattern: Option<RecurrencePattern>,
}

impl NewCoupon {
  fn into_draft(self) -> CouponDraft {
    CouponDraft {
      code: self.code,
      discount_type: self.discount_type,
      discount_value: self.discount_value,
      max_uses: self.max_uses,
      start_date: self.start_date.map_or_else(now, |d| d.naive_utc()),
      end_date: self.end_date.naive_utc(),
      listing_id: self.listing_id,
      is_recurring: self.is_recurring,
      recurrence_pattern: self.recurrence_pattern,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CouponPatch {
  pub coupon_id: Uuid,
  pub discount_value: Option<f64>,
  pub max_uses: Option<i32>,
  pub end_date: Option<UtcDateTime>,
  pub is_recurring: Option<bool>,
  pub recurrence_pattern: Option<RecurrencePattern>,
}

impl From<CouponPatch> for CouponChanges {
  fn from(patch: CouponPatch) -> Self {
    Self {
      discount_value: patch.discount_value,
      max_uses: patch.max_uses,
      end_date: patch.end_date.map(|d| d.naive_utc()),
      is_recurring: patch.is_recurring,
      recurrence_pattern: patch.recurrence_pattern,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CouponRequest {
  Create(NewCoupon),
  Update(CouponPatch),
  Delete { coupon_id: Uuid },
  Get { coupon_id: Uuid },
  List,
  Redemptions { coupon_id: Uuid },
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
  pub code: String,
  pub vendor_id: Uuid,
  pub device_fingerprint: Option<String>,
  pub listing_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
  pub coupon_id: Uuid,
  pub shopper_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SharesRequest {
  Received,
  Viewed { share_id: Uuid },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ListingRequest {
  Create { title: String },
  List,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
  pub business_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VendorReview {
  Pending,
  Approve { vendor_id: Uuid },
  Reject { vendor_id: Uuid, reason: Option<String> },
}

pub async fn health() -> Json<json::Value> {
  Json(json::json!({ "status": "ok" }))
}

pub async fn coupons(
  State(app): State<Arc<AppState>>,
  actor: Actor,
  Payload(req): Payload<CouponRequest>,
) -> Result<Response> {
  let vendor = actor.vendor()?.id;
  let sv = app.sv();
  let who = Some(vendor);

  match req {
    CouponRequest::Create(new) => {
      let coupon = sv
        .coupon
        .create(vendor, new.into_draft())
        .await
        .traced("coupon.create", who, None)?;
      info!(vendor = %vendor, coupon = %coupon.id, "created coupon {}", coupon.code);
      success(
        StatusCode::CREATED,
        json::json!({ "coupon": CouponView::from(coupon) }),
      )
    }
    CouponRequest::Update(patch) => {
      let id = patch.coupon_id;
      let coupon = sv
        .coupon
        .update(vendor, id, patch.into())
        .await
        .traced("coupon.update", who, Some(id))?;
      ok(json::json!({ "coupon": CouponView::from(coupon) }))
    }
    CouponRequest::Delete { coupon_id } => {
      sv.coupon
        .delete(vendor, coupon_id)
        .await
        .traced("coupon.delete", who, Some(coupon_id))?;
      info!(vendor = %vendor, coupon = %coupon_id, "deleted coupon");
      ok(json::json!({ "deleted": coupon_id }))
    }
    CouponRequest::Get { coupon_id } => {
      let coupon = sv
        .coupon
        .get(vendor, coupon_id)
        .await
        .traced("coupon.get", who, Some(coupon_id))?;
      ok(json::json!({ "coupon": coupon }))
    }
    CouponRequest::List => {
      let coupons =
        sv.coupon.list(vendor).await.traced("coupon.list", who, None)?;
      ok(json::json!({ "coupons": coupons }))
    }
    CouponRequest::Redemptions { coupon_id } => {
      let redemptions = sv
        .redemption
        .history(vendor, coupon_id)
        .await
        .traced("coupon.redemptions", who, Some(coupon_id))?;
      ok(json::json!({ "redemptions": redemptions }))
    }
  }
}

/// Anonymous claims are allowed; a signed-in claimant is recorded.
pub async fn claim(
  State(app): State<Arc<AppState>>,
  actor: Option<Actor>,
  Payload(req): Payload<ClaimRequest>,
) -> Result<Response> {
  let user_id = actor.as_ref().map(Actor::id);
  let ctx = ClaimContext {
    user_id,
    device_fingerprint: req.device_fingerprint,
    listing_id: req.listing_id,
  };

  let outcome = app
    .sv()
    .redemption
    .claim(&req.code, req.vendor_id, ctx)
    .await
    .traced("coupon.claim", user_id, Some(req.vendor_id))?;

  ok(outcome)
}

pub async fn share(
  State(app): State<Arc<AppState>>,
  actor: Actor,
  Payload(req): Payload<ShareRequest>,
) -> Result<Response> {
  let vendor = actor.vendor()?.id;
  let sharing = app.sv().sharing;

  let share = sharing
    .share(vendor, req.coupon_id, req.shopper_id)
    .await
    .traced("coupon.share", Some(vendor), Some(req.coupon_id))?;
  let used = sharing
    .used_this_month(vendor)
    .await
    .traced("coupon.share", Some(vendor), Some(req.coupon_id))?;

  success(
    StatusCode::CREATED,
    json::json!({
      "share": share,
      "shares_used": used,
      "shares_remaining": sharing.remaining(used),
    }),
  )
}

pub async fn shares(
  State(app): State<Arc<AppState>>,
  actor: Actor,
  Payload(req): Payload<SharesRequest>,
) -> Result<Response> {
  let shopper = actor.id();
  let sharing = app.sv().sharing;

  match req {
    SharesRequest::Received => {
      let shares = sharing
        .received(shopper)
        .await
        .traced("shares.received", Some(shopper), None)?;
      ok(json::json!({ "shares": shares }))
    }
    SharesRequest::Viewed { share_id } => {
      let share = sharing
        .mark_viewed(shopper, share_id)
        .await
        .traced("shares.viewed", Some(shopper), Some(share_id))?;
      ok(json::json!({ "share": share }))
    }
  }
}

pub async fn listings(
  State(app): State<Arc<AppState>>,
  actor: Actor,
  Payload(req): Payload<ListingRequest>,
) -> Result<Response> {
  let vendor = actor.vendor()?.id;
  let listing = app.sv().listing;

  match req {
    ListingRequest::Create { title } => {
      let created = listing
        .create(vendor, &title)
        .await
        .traced("listing.create", Some(vendor), None)?;
      success(StatusCode::CREATED, json::json!({ "listing": created }))
    }
    ListingRequest::List => {
      let listings = listing
        .by_vendor(vendor)
        .await
        .traced("listing.list", Some(vendor), None)?;
      ok(json::json!({ "listings": listings }))
    }
  }
}

pub async fn apply_vendor(
  State(app): State<Arc<AppState>>,
  actor: Actor,
  Payload(req): Payload<ApplyRequest>,
) -> Result<Response> {
  let id = actor.id();
  let user = app
    .sv()
    .user
    .apply_vendor(id, &req.business_name)
    .await
    .traced("vendor.apply", Some(id), None)?;

  info!(user = %id, "vendor application filed");
  ok(json::json!({ "user": user }))
}

pub async fn review_vendor(
  State(app): State<Arc<AppState>>,
  actor: Actor,
  Payload(req): Payload<VendorReview>,
) -> Result<Response> {
  let admin = actor.admin()?.id;
  let users = app.sv().user;

  let (vendor, reason) = match req {
    VendorReview::Pending => {
      let pending = users
        .pending_vendors()
        .await
        .traced("vendor.pending", Some(admin), None)?;
      return ok(json::json!({ "vendors": pending }));
    }
    VendorReview::Approve { vendor_id } => {
      let vendor = users
        .review_vendor(vendor_id, true)
        .await
        .traced("vendor.approve", Some(admin), Some(vendor_id))?;
      (vendor, None)
    }
    VendorReview::Reject { vendor_id, reason } => {
      let vendor = users
        .review_vendor(vendor_id, false)
        .await
        .traced("vendor.reject", Some(admin), Some(vendor_id))?;
      (vendor, reason)
    }
  };

  info!(
    admin = %admin,
    vendor = %vendor.id,
    "vendor application {:?}",
    vendor.vendor_status
  );
  notify_review(&app, &vendor, reason);

  ok(json::json!({ "vendor": vendor }))
}

fn notify_review(app: &AppState, vendor: &user::Model, reason: Option<String>) {
  let Some(email) = vendor.email.clone() else {
    debug!(vendor = %vendor.id, "vendor has no email, skipping review notice");
    return;
  };

  let business = vendor.business_name.clone().unwrap_or_default();
  let notification = if vendor.vendor_status == Some(VendorStatus::Approved) {
    Notification::template(email, "vendor_approved", [("business_name", business)])
  } else {
    Notification::template(
      email,
      "vendor_rejected",
      [("business_name", business), ("reason", reason.unwrap_or_default())],
    )
  };
  app.notify(notification);
}

pub async fn run_expire(
  State(app): State<Arc<AppState>>,
  actor: Actor,
) -> Result<Response> {
  let admin = actor.admin()?.id;
  let report =
    cron::run_expire(&app).await.traced("jobs.expire", Some(admin), None)?;
  ok(report)
}

pub async fn run_renew(
  State(app): State<Arc<AppState>>,
  actor: Actor,
) -> Result<Response> {
  let admin = actor.admin()?.id;
  let report =
    cron::run_renew(&app).await.traced("jobs.renew", Some(admin), None)?;
  ok(report)
}

pub async fn contact(
  State(app): State<Arc<AppState>>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  Payload(msg): Payload<ContactMessage>,
) -> Result<Response> {
  let config = &app.config;
  let client = addr.ip().to_string();

  let msg = app
    .sv()
    .contact
    .accept(&client, msg, config.contact_limit, config.contact_window)
    .await
    .traced("contact", None, None)?;

  match &config.contact_inbox {
    Some(inbox) => {
      app.notify(msg.into_notification(inbox));
    }
    None => info!(from = %msg.email, "contact message (no inbox configured)"),
  }

  ok(json::json!({ "message": "Message received" }))
}
