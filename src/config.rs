use std::env;

use anyhow::{Context, bail};

use crate::{prelude::Duration, sv::sharing::DEFAULT_MONTHLY_LIMIT};

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub port: u16,
  /// HMAC key shared with the identity gateway.
  pub secret: String,
  pub mail_api_url: Option<String>,
  pub mail_api_key: Option<String>,
  pub mail_from: String,
  pub contact_inbox: Option<String>,
  /// Zero disables the job.
  pub expire_interval: Duration,
  pub renew_interval: Duration,
  pub gc_interval: Duration,
  pub share_monthly_limit: u64,
  pub contact_limit: u32,
  pub contact_window: Duration,
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  pub fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
  ) -> anyhow::Result<Self> {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let duration = |key: &str, default: &str| -> anyhow::Result<Duration> {
      let raw = var(key).unwrap_or_else(|| default.into());
      humantime::parse_duration(raw.trim())
        .with_context(|| format!("{key}: invalid duration `{raw}`"))
    };

    let secret = var("SERVER_SECRET").context("SERVER_SECRET not set")?;
    if secret.len() < 16 {
      bail!("SERVER_SECRET must be at least 16 characters");
    }

    Ok(Self {
      database_url: var("DATABASE_URL")
        .unwrap_or_else(|| "sqlite:coupons.db?mode=rwc".into()),
      port: match var("PORT") {
        Some(port) => port.parse().context("PORT must be a port number")?,
        None => 3000,
      },
      secret,
      mail_api_url: var("MAIL_API_URL"),
      mail_api_key: var("MAIL_API_KEY"),
      mail_from: var("MAIL_FROM")
        .unwrap_or_else(|| "That's Good Too <noreply@thatsgoodtoo.com>".into()),
      contact_inbox: var("CONTACT_INBOX"),
      expire_interval: duration("EXPIRE_INTERVAL", "1h")?,
      renew_interval: duration("RENEW_INTERVAL", "1h")?,
      gc_interval: duration("GC_INTERVAL", "10m")?,
      share_monthly_limit: match var("SHARE_MONTHLY_LIMIT") {
        Some(n) => n.parse().context("SHARE_MONTHLY_LIMIT must be a number")?,
        None => DEFAULT_MONTHLY_LIMIT,
      },
      contact_limit: match var("CONTACT_LIMIT") {
        Some(n) => n.parse().context("CONTACT_LIMIT must be a number")?,
        None => 5,
      },
      contact_window: duration("CONTACT_WINDOW", "1h")?,
    })
  }
}
