use axum::http::StatusCode;
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Field-level rejection produced before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct FieldError {
  pub field: &'static str,
  pub reason: String,
}

impl FieldError {
  pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
    Self { field, reason: reason.into() }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Claim {
  #[error("Coupon has reached its usage limit")]
  Exhausted,
  #[error("Coupon is expired or not yet valid")]
  Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] FieldError),
  #[error("{0}")]
  InvalidArgs(String),
  #[error("{0} not found")]
  NotFound(&'static str),
  #[error("A coupon with this code already exists")]
  DuplicateCode,
  #[error("Coupon was already shared with this shopper in the last 24 hours")]
  DuplicateShare,
  #[error("Maximum uses cannot be lower than current usage ({used})")]
  InvalidCap { used: i32 },
  #[error("Listing already has an active coupon")]
  ListingTaken,
  #[error(transparent)]
  Claim(#[from] Claim),
  #[error("Monthly share limit of {limit} reached")]
  QuotaExceeded { limit: u64 },
  #[error("Too many requests, try again later")]
  RateLimited,
  #[error("Authentication required")]
  Unauthorized,
  #[error("You are not allowed to perform this action")]
  Forbidden,
  #[error("Mail delivery failed: {0}")]
  Mail(String),
  #[error("Database error: {0}")]
  Db(#[from] DbErr),
  #[error("Internal error: {0}")]
  Internal(String),
}

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::Validation(_)
      | Error::InvalidArgs(_)
      | Error::DuplicateCode
      | Error::DuplicateShare
      | Error::InvalidCap { .. }
      | Error::ListingTaken
      | Error::Claim(_) => StatusCode::BAD_REQUEST,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::QuotaExceeded { .. } | Error::RateLimited => {
        StatusCode::TOO_MANY_REQUESTS
      }
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::Forbidden => StatusCode::FORBIDDEN,
      Error::Mail(_) | Error::Db(_) | Error::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  pub fn is_internal(&self) -> bool {
    matches!(self, Error::Mail(_) | Error::Db(_) | Error::Internal(_))
  }

  /// Message safe to show to the client.
  pub fn user_message(&self) -> String {
    if self.is_internal() {
      "Internal server error".into()
    } else {
      self.to_string()
    }
  }

  /// Unique-constraint violations become `conflict`, everything else stays
  /// a database error.
  pub fn or_conflict(err: DbErr, conflict: Error) -> Error {
    match err.sql_err() {
      Some(SqlErr::UniqueConstraintViolation(_)) => conflict,
      _ => Error::Db(err),
    }
  }
}
