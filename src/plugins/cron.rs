use std::sync::Arc;

use async_trait::async_trait;
use tokio::time;

use crate::{
  entity::{coupon, user},
  plugins::Plugin,
  prelude::*,
  state::AppState,
  sv::{
    lifecycle::{ExpireReport, RenewReport},
    notify::Notification,
  },
  utils::format_date,
};

/// Ticks immediately, then every `period`. `None` when the job is disabled.
fn schedule(name: &str, period: Duration) -> Option<time::Interval> {
  if period.is_zero() {
    info!("{name} disabled via config (0 interval)");
    return None;
  }
  info!("{name} started (interval: {})", humantime::format_duration(period));

  let mut interval = time::interval(period);
  interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
  Some(interval)
}

pub struct Expire;

#[async_trait]
impl Plugin for Expire {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let Some(mut interval) = schedule("Expire", app.config.expire_interval)
    else {
      return Ok(());
    };

    loop {
      interval.tick().await;
      if let Err(err) = run_expire(&app).await {
        error!("Expire job failed: {err}");
      }
    }
  }
}

pub struct Renew;

#[async_trait]
impl Plugin for Renew {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let Some(mut interval) = schedule("Renew", app.config.renew_interval)
    else {
      return Ok(());
    };

    loop {
      interval.tick().await;
      if let Err(err) = run_renew(&app).await {
        error!("Renew job failed: {err}");
      }
    }
  }
}

/// Drops ended rate-limit windows.
pub struct GC;

#[async_trait]
impl Plugin for GC {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let Some(mut interval) = schedule("GC", app.config.gc_interval) else {
      return Ok(());
    };

    loop {
      interval.tick().await;
      match app.sv().rate_limit.gc().await {
        Ok(0) => {}
        Ok(n) => debug!("GC: removed {n} rate limit window(s)"),
        Err(err) => error!("GC failed: {err}"),
      }
    }
  }
}

pub async fn run_expire(app: &AppState) -> Result<ExpireReport> {
  let report = app.sv().lifecycle.expire_lapsed().await?;

  if report.failed.is_empty() {
    info!(
      "Expired {} coupon(s), {} expiring within 7 days",
      report.expired_now, report.expiring_within_7_days
    );
  } else {
    warn!(
      "Expired {} coupon(s), {} failed: {:?}",
      report.expired_now, report.failed.len(), report.failed
    );
  }

  Ok(report)
}

/// Renews due recurring coupons and tells each vendor about the reset.
pub async fn run_renew(app: &AppState) -> Result<RenewReport> {
  let report = app.sv().lifecycle.renew_recurring().await?;

  if !report.failed.is_empty() {
    warn!("Failed to renew {} coupon(s): {:?}", report.failed.len(), report.failed);
  }
  if !report.listing_taken.is_empty() {
    info!(
      "Held {} renewal(s) on taken listings: {:?}",
      report.listing_taken.len(),
      report.listing_taken
    );
  }
  if report.renewed.is_empty() {
    return Ok(report);
  }
  info!("Renewed {} recurring coupon(s)", report.renewed.len());

  // the renewal itself already committed
  let renewed = coupon::Entity::find()
    .filter(coupon::Column::Id.is_in(report.renewed.clone()))
    .find_also_related(user::Entity)
    .all(&app.db)
    .await;

  match renewed {
    Ok(rows) => {
      for (coupon, vendor) in rows {
        let Some(email) = vendor.and_then(|v| v.email) else {
          debug!(coupon = %coupon.id, "vendor has no email, skipping reset notice");
          continue;
        };
        app.notify(Notification::template(
          email,
          "coupon_reset",
          [
            ("code", coupon.code),
            ("start_date", format_date(coupon.start_date)),
            ("end_date", format_date(coupon.end_date)),
          ],
        ));
      }
    }
    Err(err) => warn!("Could not load renewed coupons for notices: {err}"),
  }

  Ok(report)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::RecurrencePattern,
    state::testing,
    sv::{notify::testing::Recorder, test_utils::test_db},
  };

  async fn settle(recorder: &Recorder, expected: usize) {
    for _ in 0..100 {
      if recorder.sent.lock().unwrap().len() >= expected {
        return;
      }
      tokio::task::yield_now().await;
    }
  }

  #[tokio::test]
  async fn test_renew_notifies_vendor() {
    let recorder = Arc::new(Recorder::default());
    let app = testing::app(recorder.clone()).await;
    let vendor = test_db::vendor(&app.db).await;

    let mut draft = test_db::draft();
    draft.is_recurring = true;
    draft.recurrence_pattern = Some(RecurrencePattern::Weekly);
    draft.start_date = now() - TimeDelta::days(8);
    draft.end_date = now() - TimeDelta::days(1);
    let created = app.sv().coupon.create(vendor.id, draft).await.unwrap();

    let report = run_renew(&app).await.unwrap();
    assert_eq!(report.renewed, vec![created.id]);

    settle(&recorder, 1).await;
    let sent = recorder.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name(), "coupon_reset");
    assert_eq!(Some(sent[0].to.clone()), vendor.email);
  }

  #[tokio::test]
  async fn test_expire_job_reports() {
    let app = testing::app(Arc::new(Recorder::default())).await;
    let vendor = test_db::vendor(&app.db).await;

    let created =
      app.sv().coupon.create(vendor.id, test_db::draft()).await.unwrap();
    coupon::ActiveModel {
      end_date: Set(now() - TimeDelta::minutes(1)),
      ..created.into()
    }
    .update(&app.db)
    .await
    .unwrap();

    let report = run_expire(&app).await.unwrap();
    assert_eq!(report.expired_now, 1);
    assert!(report.failed.is_empty());

    let again = run_expire(&app).await.unwrap();
    assert_eq!(again.expired_now, 0);
  }

  #[tokio::test]
  async fn test_disabled_jobs_return() {
    let recorder = Arc::new(Recorder::default());
    let db = test_db::setup().await;
    let mut config = testing::config();
    config.expire_interval = Duration::ZERO;
    config.gc_interval = Duration::ZERO;
    let app = Arc::new(AppState::with_parts(db, config, recorder));

    Expire.start(app.clone()).await.unwrap();
    GC.start(app).await.unwrap();
  }
}
