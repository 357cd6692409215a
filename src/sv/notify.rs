//! Outgoing email. Delivery is fire-and-forget: callers go through
//! `AppState::notify`, which logs failures instead of returning them.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Body {
  Template { name: String, vars: HashMap<String, String> },
  Html { subject: String, html: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
  pub to: String,
  #[serde(flatten)]
  pub body: Body,
}

impl Notification {
  pub fn template<'v>(
    to: impl Into<String>,
    name: &str,
    vars: impl IntoIterator<Item = (&'v str, String)>,
  ) -> Self {
    let vars = vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Self { to: to.into(), body: Body::Template { name: name.to_string(), vars } }
  }

  pub fn html(
    to: impl Into<String>,
    subject: impl Into<String>,
    html: impl Into<String>,
  ) -> Self {
    Self {
      to: to.into(),
      body: Body::Html { subject: subject.into(), html: html.into() },
    }
  }

  pub fn name(&self) -> &str {
    match &self.body {
      Body::Template { name, .. } => name,
      Body::Html { subject, .. } => subject,
    }
  }
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Posts notifications as JSON to an email delivery service.
#[derive(Clone)]
pub struct Mailer {
  client: Client,
  url: String,
  api_key: Option<String>,
  from: String,
}

impl Mailer {
  pub fn new(url: String, api_key: Option<String>, from: String) -> Self {
    Self { client: Client::new(), url, api_key, from }
  }
}

#[derive(Serialize)]
struct Envelope<'a> {
  from: &'a str,
  #[serde(flatten)]
  notification: &'a Notification,
}

#[async_trait]
impl Notifier for Mailer {
  async fn send(&self, notification: &Notification) -> Result<()> {
    let mut request = self
      .client
      .post(&self.url)
      .timeout(Duration::from_secs(10))
      .json(&Envelope { from: &self.from, notification });

    if let Some(key) = &self.api_key {
      request = request.bearer_auth(key);
    }

    let response = request
      .send()
      .await
      .map_err(|e| Error::Mail(format!("Request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Mail(format!("{status}: {body}")));
    }

    Ok(())
  }
}

/// Used when no mail service is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
  async fn send(&self, notification: &Notification) -> Result<()> {
    info!(to = %notification.to, "notification `{}` (mail disabled)", notification.name());
    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_serializes_for_the_mail_api() {
    let n = Notification::template(
      "vendor@example.com",
      "coupon_reset",
      [("code", "SAVE20".to_string())],
    );

    let value = json::to_value(&Envelope { from: "noreply@example.com", notification: &n })
      .unwrap();
    assert_eq!(value["from"], "noreply@example.com");
    assert_eq!(value["to"], "vendor@example.com");
    assert_eq!(value["kind"], "template");
    assert_eq!(value["name"], "coupon_reset");
    assert_eq!(value["vars"]["code"], "SAVE20");
  }

  #[test]
  fn html_body() {
    let n = Notification::html("a@example.com", "Hello", "<p>hi</p>");
    assert_eq!(n.name(), "Hello");
    let value = json::to_value(&n).unwrap();
    assert_eq!(value["kind"], "html");
    assert_eq!(value["html"], "<p>hi</p>");
  }
}
