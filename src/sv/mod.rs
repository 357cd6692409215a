pub mod contact;
pub mod coupon;
pub mod lifecycle;
pub mod listing;
pub mod notify;
pub mod rate_limit;
pub mod redemption;
pub mod sharing;
#[cfg(test)]
pub mod test_utils;
pub mod user;
pub mod validation;

pub use contact::Contact;
pub use coupon::Coupon;
pub use lifecycle::Lifecycle;
pub use listing::Listing;
pub use rate_limit::RateLimit;
pub use redemption::Redemption;
pub use sharing::Sharing;
pub use user::User;
