//! Payment processor integration
//!
//! A processor-neutral trait for creating payment intents, the Stripe
//! implementation of it, and verification of Stripe-signed webhook events.

pub mod providers;
pub mod traits;
pub mod types;
pub mod webhook;
