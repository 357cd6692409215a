pub mod auth;
mod handlers;
pub mod reply;

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
  Router,
  routing::{get, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub fn router(app: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    .route("/api/coupons", post(handlers::coupons))
    .route("/api/coupons/claim", post(handlers::claim))
    .route("/api/coupons/share", post(handlers::share))
    .route("/api/shares", post(handlers::shares))
    .route("/api/listings", post(handlers::listings))
    .route("/api/vendors/apply", post(handlers::apply_vendor))
    .route("/api/admin/vendors", post(handlers::review_vendor))
    .route("/api/jobs/expire", post(handlers::run_expire))
    .route("/api/jobs/renew", post(handlers::run_renew))
    .route("/api/contact", post(handlers::contact))
    .with_state(app)
}

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let governor_limiter = governor_conf.limiter().clone();

    tokio::spawn(async move {
      loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        governor_limiter.retain_recent();
      }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));

    let router = router(app)
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP Server listening on {addr}");

    axum::serve(listener, router).await.context("HTTP server error")
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
  };
  use tower::ServiceExt;

  use super::*;
  use crate::{
    entity::{UserRole, user},
    state::testing::{self, SECRET},
    sv::{notify::testing::Recorder, test_utils::test_db},
  };

  struct Harness {
    app: Arc<AppState>,
    recorder: Arc<Recorder>,
  }

  impl Harness {
    async fn new() -> Self {
      let recorder = Arc::new(Recorder::default());
      Self { app: testing::app(recorder.clone()).await, recorder }
    }

    async fn call(
      &self,
      path: &str,
      actor: Option<&user::Model>,
      body: json::Value,
    ) -> (StatusCode, json::Value) {
      let mut request = Request::post(path).header("content-type", "application/json");
      if let Some(actor) = actor {
        let signature = auth::sign(SECRET, actor.id, actor.role).unwrap();
        request = request
          .header(auth::ACTOR_ID, actor.id.to_string())
          .header(auth::ACTOR_ROLE, actor.role.as_str())
          .header(auth::ACTOR_SIGNATURE, signature);
      }
      let request = request.body(Body::from(body.to_string())).unwrap();

      let response = router(self.app.clone())
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
        .oneshot(request)
        .await
        .unwrap();

      let status = response.status();
      let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
      (status, json::from_slice(&bytes).unwrap())
    }

    async fn settle(&self, expected: usize) -> Vec<String> {
      for _ in 0..100 {
        if self.recorder.sent.lock().unwrap().len() >= expected {
          break;
        }
        tokio::task::yield_now().await;
      }
      self.recorder.names()
    }
  }

  fn new_coupon() -> json::Value {
    json::json!({
      "action": "create",
      "code": " save20 ",
      "discount_type": "percentage",
      "discount_value": 20,
      "max_uses": 2,
      "end_date": (Utc::now() + TimeDelta::days(30)).to_rfc3339(),
    })
  }

  #[tokio::test]
  async fn test_coupon_lifecycle_over_http() {
    let h = Harness::new().await;
    let vendor = test_db::vendor(&h.app.db).await;
    let shopper = test_db::user(&h.app.db, UserRole::Shopper).await;

    let (status, body) = h.call("/api/coupons", Some(&vendor), new_coupon()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["coupon"]["code"], "SAVE20");
    assert_eq!(body["coupon"]["usage_percentage"], 0.0);

    let claim = json::json!({ "code": "save20", "vendor_id": vendor.id });
    let (status, body) = h.call("/api/coupons/claim", Some(&shopper), claim.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["used_count"], 1);
    assert_eq!(body["remaining"], 1);

    // anonymous claims count too
    let (status, _) = h.call("/api/coupons/claim", None, claim.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h.call("/api/coupons/claim", None, claim).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Coupon has reached its usage limit");

    let (status, body) =
      h.call("/api/coupons", Some(&vendor), json::json!({ "action": "list" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["coupons"][0]["used_count"], 2);
    assert_eq!(body["coupons"][0]["usage_percentage"], 100.0);
  }

  #[tokio::test]
  async fn test_errors_use_the_envelope() {
    let h = Harness::new().await;
    let vendor = test_db::vendor(&h.app.db).await;
    let shopper = test_db::user(&h.app.db, UserRole::Shopper).await;

    let (status, body) = h.call("/api/coupons", None, new_coupon()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let (status, _) = h.call("/api/coupons", Some(&shopper), new_coupon()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut bad = new_coupon();
    bad["discount_value"] = json::json!(150);
    let (status, body) = h.call("/api/coupons", Some(&vendor), bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "discount_value");

    let (status, body) =
      h.call("/api/coupons", Some(&vendor), json::json!({ "action": "explode" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let missing = json::json!({ "action": "get", "coupon_id": Uuid::new_v4() });
    let (status, body) = h.call("/api/coupons", Some(&vendor), missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Coupon not found");
  }

  #[tokio::test]
  async fn test_vendor_onboarding_notifies() {
    let h = Harness::new().await;
    let admin = test_db::user(&h.app.db, UserRole::Admin).await;
    let applicant = test_db::user(&h.app.db, UserRole::Shopper).await;

    let apply = json::json!({ "business_name": "Night Market" });
    let (status, body) = h.call("/api/vendors/apply", Some(&applicant), apply).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["vendor_status"], "pending");

    let (status, _) = h
      .call("/api/admin/vendors", Some(&applicant), json::json!({ "action": "pending" }))
      .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let approve = json::json!({ "action": "approve", "vendor_id": applicant.id });
    let (status, body) = h.call("/api/admin/vendors", Some(&admin), approve).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vendor"]["role"], "vendor");
    assert_eq!(h.settle(1).await, vec!["vendor_approved".to_string()]);

    // the stored role now authorizes coupon management
    let vendor = h.app.sv().user.by_id(applicant.id).await.unwrap().unwrap();
    let (status, _) = h.call("/api/coupons", Some(&vendor), new_coupon()).await;
    assert_eq!(status, StatusCode::CREATED);
  }

  #[tokio::test]
  async fn test_share_reports_quota() {
    let h = Harness::new().await;
    let vendor = test_db::vendor(&h.app.db).await;
    let shopper = test_db::user(&h.app.db, UserRole::Shopper).await;

    let (_, body) = h.call("/api/coupons", Some(&vendor), new_coupon()).await;
    let coupon_id = body["coupon"]["id"].clone();

    let share = json::json!({ "coupon_id": coupon_id, "shopper_id": shopper.id });
    let (status, body) = h.call("/api/coupons/share", Some(&vendor), share.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["shares_used"], 1);
    assert_eq!(body["shares_remaining"], 19);

    let (status, _) = h.call("/api/coupons/share", Some(&vendor), share).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = h
      .call("/api/shares", Some(&shopper), json::json!({ "action": "received" }))
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shares"][0]["coupon"]["code"], "SAVE20");
  }

  #[tokio::test]
  async fn test_contact_is_rate_limited() {
    let h = Harness::new().await;
    let message = json::json!({
      "name": "Ada",
      "email": "ada@example.com",
      "message": "Hello there",
    });

    for _ in 0..h.app.config.contact_limit {
      let (status, _) = h.call("/api/contact", None, message.clone()).await;
      assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = h.call("/api/contact", None, message).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Too many requests, try again later");
  }

  #[tokio::test]
  async fn test_jobs_are_admin_only() {
    let h = Harness::new().await;
    let admin = test_db::user(&h.app.db, UserRole::Admin).await;
    let vendor = test_db::vendor(&h.app.db).await;

    let (status, _) = h.call("/api/jobs/expire", Some(&vendor), json::json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.call("/api/jobs/renew", Some(&admin), json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["renewed"], json::json!([]));
  }
}
