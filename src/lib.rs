//! Payment handlers bridging a checkout frontend, Stripe, the admin order
//! ledger and per-brand order stores.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod payments;
pub mod state;
