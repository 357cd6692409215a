pub mod coupon;
pub mod listing;
pub mod rate_limit;
pub mod redemption;
pub mod share;
pub mod user;

pub use coupon::{DiscountType, RecurrencePattern};
pub use user::{UserRole, VendorStatus};
