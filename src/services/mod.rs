pub mod access;
pub mod promo;

pub use access::{AccessDecision, AccessReason, AccessService};
pub use promo::{PromoError, PromoService, RedeemedCode};
