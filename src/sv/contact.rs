use serde::Deserialize;

use crate::{
  prelude::*,
  sv::{RateLimit, notify::Notification},
  utils::escape_html,
};

const MESSAGE_MAX_LEN: usize = 5000;

#[derive(Debug, Clone, Deserialize)]
pub struct ContactMessage {
  pub name: String,
  pub email: String,
  pub message: String,
}

impl ContactMessage {
  pub fn validate(self) -> Result<Self, FieldError> {
    let name = self.name.trim().to_string();
    let email = self.email.trim().to_string();
    let message = self.message.trim().to_string();

    if name.is_empty() {
      return Err(FieldError::new("name", "Name is required"));
    }
    let looks_like_email = email
      .split_once('@')
      .is_some_and(|(user, host)| !user.is_empty() && host.contains('.'));
    if !looks_like_email {
      return Err(FieldError::new("email", "A valid email is required"));
    }
    if message.is_empty() {
      return Err(FieldError::new("message", "Message is required"));
    }
    if message.chars().count() > MESSAGE_MAX_LEN {
      return Err(FieldError::new(
        "message",
        format!("Message must be at most {MESSAGE_MAX_LEN} characters"),
      ));
    }

    Ok(Self { name, email, message })
  }

  /// Forwards the message as raw HTML; user text is escaped.
  pub fn into_notification(self, inbox: &str) -> Notification {
    let html = format!(
      "<p><b>From:</b> {} &lt;{}&gt;</p><p>{}</p>",
      escape_html(&self.name),
      escape_html(&self.email),
      escape_html(&self.message).replace('\n', "<br>"),
    );
    Notification::html(inbox, format!("Contact form: {}", self.name), html)
  }
}

pub struct Contact<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Contact<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Validates and rate-limits a contact form submission from `client`.
  pub async fn accept(
    &self,
    client: &str,
    message: ContactMessage,
    limit: u32,
    window: Duration,
  ) -> Result<ContactMessage> {
    let message = message.validate()?;

    let key = format!("contact:{client}");
    if !RateLimit::new(self.db).hit(&key, limit, window).await? {
      warn!(client, "contact form rate limited");
      return Err(Error::RateLimited);
    }

    Ok(message)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{notify::Body, test_utils::test_db};

  fn message() -> ContactMessage {
    ContactMessage {
      name: " Ada ".into(),
      email: "ada@example.com".into(),
      message: "Do you ship to the valley?".into(),
    }
  }

  #[test]
  fn test_validation() {
    assert_eq!(message().validate().unwrap().name, "Ada");

    let bad = ContactMessage { email: "nope".into(), ..message() };
    assert_eq!(bad.validate().unwrap_err().field, "email");

    let bad = ContactMessage { message: " ".into(), ..message() };
    assert_eq!(bad.validate().unwrap_err().field, "message");

    let bad = ContactMessage { message: "x".repeat(5001), ..message() };
    assert_eq!(bad.validate().unwrap_err().field, "message");
  }

  #[test]
  fn test_notification_escapes_user_text() {
    let msg = ContactMessage {
      message: "<script>alert(1)</script>\nthanks".into(),
      ..message()
    };
    let notification =
      msg.validate().unwrap().into_notification("inbox@example.com");

    assert_eq!(notification.to, "inbox@example.com");
    assert_eq!(notification.name(), "Contact form: Ada");
    let Body::Html { html, .. } = notification.body else {
      panic!("contact messages are sent as html");
    };
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;<br>thanks"));
    assert!(!html.contains("<script>"));
  }

  #[tokio::test]
  async fn test_accept_is_rate_limited_per_client() {
    let db = test_db::setup().await;
    let sv = Contact::new(&db);
    let window = Duration::from_secs(3600);

    for _ in 0..2 {
      sv.accept("1.2.3.4", message(), 2, window).await.unwrap();
    }
    assert!(matches!(
      sv.accept("1.2.3.4", message(), 2, window).await,
      Err(Error::RateLimited)
    ));
    assert!(sv.accept("5.6.7.8", message(), 2, window).await.is_ok());
  }

  #[tokio::test]
  async fn test_invalid_message_does_not_count() {
    let db = test_db::setup().await;
    let sv = Contact::new(&db);
    let window = Duration::from_secs(3600);

    let bad = ContactMessage { name: "".into(), ..message() };
    assert!(matches!(
      sv.accept("1.2.3.4", bad, 1, window).await,
      Err(Error::Validation(_))
    ));
    assert!(sv.accept("1.2.3.4", message(), 1, window).await.is_ok());
  }
}
