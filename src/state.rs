use tokio::task::JoinHandle;

use crate::{
  config::Config,
  prelude::*,
  sv::{
    self,
    notify::{LogNotifier, Mailer, Notification, Notifier},
  },
};

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub notifier: Arc<dyn Notifier>,
}

/// Per-request view over the services, all borrowing the same connection.
pub struct Services<'a> {
  pub user: sv::User<'a>,
  pub listing: sv::Listing<'a>,
  pub coupon: sv::Coupon<'a>,
  pub redemption: sv::Redemption<'a>,
  pub sharing: sv::Sharing<'a>,
  pub lifecycle: sv::Lifecycle<'a>,
  pub contact: sv::Contact<'a>,
  pub rate_limit: sv::RateLimit<'a>,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    let db = Database::connect(&config.database_url)
      .await
      .context("Failed to connect to database")?;

    migration::Migrator::up(&db, None)
      .await
      .context("Failed to run migrations")?;

    let notifier: Arc<dyn Notifier> = match &config.mail_api_url {
      Some(url) => Arc::new(Mailer::new(
        url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
      )),
      None => {
        warn!("MAIL_API_URL not set, notifications are only logged");
        Arc::new(LogNotifier)
      }
    };

    Ok(Self::with_parts(db, config, notifier))
  }

  pub fn with_parts(
    db: DatabaseConnection,
    config: Config,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    Self { db, config, notifier }
  }

  pub fn sv(&self) -> Services<'_> {
    let db = &self.db;
    Services {
      user: sv::User::new(db),
      listing: sv::Listing::new(db),
      coupon: sv::Coupon::new(db),
      redemption: sv::Redemption::new(db),
      sharing: sv::Sharing::new(db).with_limit(self.config.share_monthly_limit),
      lifecycle: sv::Lifecycle::new(db),
      contact: sv::Contact::new(db),
      rate_limit: sv::RateLimit::new(db),
    }
  }

  /// Sends in the background. Failures are logged, never returned.
  pub fn notify(&self, notification: Notification) -> JoinHandle<()> {
    let notifier = self.notifier.clone();
    tokio::spawn(async move {
      if let Err(err) = notifier.send(&notification).await {
        warn!(
          to = %notification.to,
          "failed to send `{}`: {err}",
          notification.name()
        );
      }
    })
  }
}

#[cfg(test)]
pub mod testing {
  use super::*;
  use crate::sv::{notify::testing::Recorder, test_utils::test_db};

  pub const SECRET: &str = "test-secret-0123456789";

  pub fn config() -> Config {
    Config::from_lookup(|key| (key == "SERVER_SECRET").then(|| SECRET.into()))
      .unwrap()
  }

  pub async fn app(recorder: Arc<Recorder>) -> Arc<AppState> {
    let db = test_db::setup().await;
    Arc::new(AppState::with_parts(db, config(), recorder))
  }
}

#[cfg(test)]
mod tests {
  use super::{testing, *};
  use crate::sv::notify::testing::Recorder;

  #[tokio::test]
  async fn test_notify_swallows_failures() {
    let recorder = Arc::new(Recorder { failing: true, ..Default::default() });
    let app = testing::app(recorder.clone()).await;

    app
      .notify(Notification::html("a@example.com", "Hi", "<p>hi</p>"))
      .await
      .unwrap();

    assert_eq!(recorder.names(), vec!["Hi".to_string()]);
  }
}
