//! Pure checks run against a proposed coupon before any write.

use crate::{
  entity::{DiscountType, RecurrencePattern},
  prelude::*,
};

pub const CODE_MIN_LEN: usize = 3;
pub const CODE_MAX_LEN: usize = 20;

/// Proposed fields for a new coupon.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponDraft {
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: f64,
  pub max_uses: Option<i32>,
  pub start_date: DateTime,
  pub end_date: DateTime,
  pub listing_id: Option<Uuid>,
  pub is_recurring: bool,
  pub recurrence_pattern: Option<RecurrencePattern>,
}

/// Trims, uppercases and checks a coupon code.
pub fn normalize_code(code: &str) -> Result<String, FieldError> {
  let code = code.trim().to_uppercase();

  if code.is_empty() {
    return Err(FieldError::new("code", "Code is required"));
  }

  let len = code.chars().count();
  if !(CODE_MIN_LEN..=CODE_MAX_LEN).contains(&len) {
    return Err(FieldError::new(
      "code",
      format!("Code must be {CODE_MIN_LEN}-{CODE_MAX_LEN} characters"),
    ));
  }

  let allowed =
    |c: char| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-';
  if !code.chars().all(allowed) {
    return Err(FieldError::new(
      "code",
      "Code may only contain letters, digits and hyphens",
    ));
  }

  Ok(code)
}

pub fn check_discount(
  discount_type: DiscountType,
  value: f64,
) -> Result<(), FieldError> {
  // also rejects NaN
  if !(value > 0.0) || !value.is_finite() {
    return Err(FieldError::new(
      "discount_value",
      "Discount value must be a positive number",
    ));
  }

  let percentage = discount_type == DiscountType::Percentage;
  if percentage && !(1.0..=100.0).contains(&value) {
    return Err(FieldError::new(
      "discount_value",
      "Percentage discount must be between 1 and 100",
    ));
  }

  Ok(())
}

pub fn check_window(start: DateTime, end: DateTime) -> Result<(), FieldError> {
  if end <= start {
    return Err(FieldError::new("end_date", "End date must be after start date"));
  }
  Ok(())
}

pub fn check_max_uses(max_uses: Option<i32>) -> Result<(), FieldError> {
  match max_uses {
    Some(max) if max <= 0 => Err(FieldError::new(
      "max_uses",
      "Maximum uses must be a positive number",
    )),
    _ => Ok(()),
  }
}

pub fn check_recurrence(
  is_recurring: bool,
  pattern: Option<RecurrencePattern>,
) -> Result<(), FieldError> {
  if is_recurring && pattern.is_none() {
    return Err(FieldError::new(
      "recurrence_pattern",
      "Recurring coupons need a recurrence pattern",
    ));
  }
  Ok(())
}

/// Validates a draft and returns it with the code normalized.
pub fn validate(draft: CouponDraft) -> Result<CouponDraft, FieldError> {
  let code = normalize_code(&draft.code)?;
  check_discount(draft.discount_type, draft.discount_value)?;
  check_window(draft.start_date, draft.end_date)?;
  check_max_uses(draft.max_uses)?;
  check_recurrence(draft.is_recurring, draft.recurrence_pattern)?;

  Ok(CouponDraft { code, ..draft })
}
