//! Concrete implementations of the PaymentProcessor trait.

pub mod stripe;

pub use stripe::{StripeConfig, StripeProvider};
